//! Task Control Block.

use alloc::vec::Vec;

use crate::list::{Linked, Links};
use crate::mailbox::SlotId;
use crate::{MailboxId, Tick};

/// Handle into the task arena (`slab::Slab<Tcb<H>>` in [`crate::kernel`]).
pub type TaskId = usize;

/// Per-task state. Generic over `H`, the port's own handle for the task's
/// execution context (e.g. a host thread handle) — this crate never
/// interprets `H`, it only stores and hands it back to the `Port`.
pub struct Tcb<H> {
    /// The port's execution handle for this task. `None` for the idle task
    /// on ports that special-case it (the idle task never needs dispatching
    /// to since the CPU simply executes nothing of interest while idle is
    /// elected).
    pub handle: Option<H>,
    /// Absolute tick by which the task must have completed its current
    /// blocking call (`DeadLine`).
    pub deadline: Tick,
    /// Absolute tick at which a sleeping task wakes (`nTCnt`). Meaningless
    /// outside the Timer list.
    pub wake_at: Tick,
    /// While blocked in a mailbox operation, the slot this task owns.
    pub mailbox_wait: Option<(MailboxId, SlotId)>,
    /// A payload handed to a blocked `receive_wait` caller by whichever
    /// task completed the rendezvous while it was parked. The original
    /// kernel achieves this zero-copy by pointing a queued message
    /// directly at the receiving task's own stack buffer; this crate
    /// avoids aliasing a parked task's stack and instead has the
    /// rendezvousing counterpart drop the bytes here, where the receiver
    /// picks them up on its own resume path (`crate::ipc`).
    pub(crate) delivered: Option<Vec<u8>>,
    pub(crate) links: Links,
}

impl<H> Tcb<H> {
    pub fn new(deadline: Tick) -> Self {
        Tcb {
            handle: None,
            deadline,
            wake_at: 0,
            mailbox_wait: None,
            delivered: None,
            links: Links::default(),
        }
    }
}

impl<H> Linked for Tcb<H> {
    fn links(&self) -> &Links {
        &self.links
    }
    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }
}
