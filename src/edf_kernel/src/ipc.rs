//! Mailbox IPC: `send_wait`, `receive_wait`, `send_no_wait`, `receive_no_wait`.
//!
//! The rendezvous/queue decision and the Ready/Waiting list surgery it
//! drives live here rather than in [`crate::mailbox`], since both the task
//! arena and the mailbox arena are needed at once — [`crate::mailbox`]
//! itself only ever touches its own slot arena.

use alloc::vec::Vec;
use log::{debug, warn};

use crate::error::{KernelError, KResult};
use crate::kernel::{Kernel, TaskId};
use crate::mailbox::{MailboxId, MessageSlot, SlotKind};
use crate::port::Port;

impl<P: Port> Kernel<P> {
    /// After a blocking IPC call's dispatch returns, decide the outcome:
    /// `mailbox_wait` is `None` if a counterpart already completed the
    /// rendezvous (nothing left to clean up); `Some` only survives to here
    /// if the task was instead promoted out of Waiting by a deadline-expiry
    /// tick, in which case its now-orphaned slot must be reclaimed.
    fn resume_ipc(&self, me: TaskId) -> KResult<()> {
        self.port.with_state(|state| {
            match state.tasks[me].mailbox_wait.take() {
                None => Ok(()),
                Some((mb, slot_id)) => {
                    debug_assert!(
                        state.tasks[me].deadline <= state.tick,
                        "a task only resumes with mailbox_wait still set once its deadline has passed"
                    );
                    state.mailboxes[mb].extract_slot(slot_id);
                    warn!(target: "edf_kernel::ipc", "task {me} deadline reached while blocked on mailbox {mb}");
                    Err(KernelError::DeadlineReached)
                }
            }
        })
    }

    /// Sends `src` (exactly `mb`'s configured `data_size` bytes). Rendezvous
    /// with a queued receiver if one is waiting; otherwise queues and
    /// blocks until a receiver arrives or the caller's deadline passes.
    pub fn send_wait(&self, mb: MailboxId, src: &[u8]) -> KResult<()> {
        let (me, decision) = self.port.with_state(|state| {
            let me = state
                .running
                .expect("send_wait called outside a task context");
            let data_size = state.mailboxes[mb].data_size();
            if state.mailboxes[mb].n_blocked_msg() < 0 {
                let recv_id = state.mailboxes[mb]
                    .front_id()
                    .expect("nBlockedMsg < 0 implies a queued RecvWait slot");
                let slot = state.mailboxes[mb]
                    .extract_slot(recv_id)
                    .expect("the front slot is always extractable");
                let receiver = slot
                    .blocked_task
                    .expect("a RecvWait slot always carries pBlock");
                state.tasks[receiver].delivered = Some(src[..data_size].to_vec());
                state.tasks[receiver].mailbox_wait = None;
                state.waiting.remove(&mut state.tasks, receiver);
                state
                    .ready
                    .insert_sorted(&mut state.tasks, receiver, |t| t.deadline);
                debug!(target: "edf_kernel::ipc", "send_wait: rendezvous on mailbox {mb}, woke receiver {receiver}");
            } else {
                let slot_id = state.mailboxes[mb].insert_slot(MessageSlot::new(
                    SlotKind::SendWait,
                    Some(src[..data_size].to_vec()),
                    Some(me),
                ));
                state.tasks[me].mailbox_wait = Some((mb, slot_id));
                state.ready.remove(&mut state.tasks, me);
                state
                    .waiting
                    .insert_sorted(&mut state.tasks, me, |t| t.deadline);
                debug!(target: "edf_kernel::ipc", "send_wait: queued on mailbox {mb}, task {me} blocked");
            }
            (me, state.reschedule(Some(me), true))
        });
        self.port.dispatch(decision);
        self.resume_ipc(me)
    }

    /// Receives into `dst` (exactly `mb`'s configured `data_size` bytes).
    /// Rendezvous with a queued sender (either kind) if one is waiting;
    /// otherwise queues and blocks.
    pub fn receive_wait(&self, mb: MailboxId, dst: &mut [u8]) -> KResult<()> {
        let (me, decision, data_size) = self.port.with_state(|state| {
            let me = state
                .running
                .expect("receive_wait called outside a task context");
            let data_size = state.mailboxes[mb].data_size();
            if state.mailboxes[mb].n_blocked_msg() >= 0 && state.mailboxes[mb].n_messages() > 0 {
                let send_id = state.mailboxes[mb]
                    .front_id()
                    .expect("nMessages > 0 implies a queued slot");
                let slot = state.mailboxes[mb]
                    .extract_slot(send_id)
                    .expect("the front slot is always extractable");
                let payload = slot
                    .payload
                    .expect("a send slot always carries a payload");
                dst[..data_size].copy_from_slice(&payload);
                if let Some(sender) = slot.blocked_task {
                    state.tasks[sender].mailbox_wait = None;
                    state.waiting.remove(&mut state.tasks, sender);
                    state
                        .ready
                        .insert_sorted(&mut state.tasks, sender, |t| t.deadline);
                }
                debug!(target: "edf_kernel::ipc", "receive_wait: rendezvous on mailbox {mb}");
            } else {
                let slot_id =
                    state.mailboxes[mb].insert_slot(MessageSlot::new(SlotKind::RecvWait, None, Some(me)));
                state.tasks[me].mailbox_wait = Some((mb, slot_id));
                state.ready.remove(&mut state.tasks, me);
                state
                    .waiting
                    .insert_sorted(&mut state.tasks, me, |t| t.deadline);
                debug!(target: "edf_kernel::ipc", "receive_wait: queued on mailbox {mb}, task {me} blocked");
            }
            (me, state.reschedule(Some(me), true), data_size)
        });
        self.port.dispatch(decision);
        let outcome = self.resume_ipc(me);
        if outcome.is_ok() {
            // Data delivered by a sender that rendezvoused with us while we
            // were parked arrives here rather than through the mailbox,
            // since this crate avoids aliasing a parked task's own stack
            // buffer (see `crate::tcb::Tcb::delivered`).
            if let Some(payload) = self.port.with_state(|state| state.tasks[me].delivered.take()) {
                dst[..data_size].copy_from_slice(&payload);
            }
        }
        outcome
    }

    /// Sends without blocking. Rendezvous immediately if a receiver is
    /// queued; otherwise queues a copy, evicting the oldest message first
    /// if the mailbox is full. The caller never moves to Waiting, though it
    /// may still be preempted if the rendezvous woke an earlier-deadline
    /// receiver.
    pub fn send_no_wait(&self, mb: MailboxId, src: &[u8]) -> KResult<()> {
        let decision = self.port.with_state(|state| {
            let me = state
                .running
                .expect("send_no_wait called outside a task context");
            let data_size = state.mailboxes[mb].data_size();
            if state.mailboxes[mb].n_blocked_msg() < 0 {
                let recv_id = state.mailboxes[mb]
                    .front_id()
                    .expect("nBlockedMsg < 0 implies a queued RecvWait slot");
                let slot = state.mailboxes[mb]
                    .extract_slot(recv_id)
                    .expect("the front slot is always extractable");
                let receiver = slot
                    .blocked_task
                    .expect("a RecvWait slot always carries pBlock");
                state.tasks[receiver].delivered = Some(src[..data_size].to_vec());
                state.tasks[receiver].mailbox_wait = None;
                state.waiting.remove(&mut state.tasks, receiver);
                state
                    .ready
                    .insert_sorted(&mut state.tasks, receiver, |t| t.deadline);
                debug!(target: "edf_kernel::ipc", "send_no_wait: rendezvous on mailbox {mb}, woke receiver {receiver}");
            } else {
                if state.mailboxes[mb].evict_oldest_if_full().is_some() {
                    warn!(target: "edf_kernel::ipc", "send_no_wait: mailbox {mb} full, evicted oldest message");
                }
                state.mailboxes[mb].insert_slot(MessageSlot::new(
                    SlotKind::SendNoWait,
                    Some(src[..data_size].to_vec()),
                    None,
                ));
            }
            state.reschedule(Some(me), true)
        });
        self.port.dispatch(decision);
        Ok(())
    }

    /// Receives without blocking. Accepts a queued `SendWait` or
    /// `SendNoWait` slot; a queued `RecvWait` slot (someone else already
    /// waiting to receive) never satisfies this call. `Err(Fail)` if
    /// nothing is available — the caller still re-elects either way.
    pub fn receive_no_wait(&self, mb: MailboxId, dst: &mut [u8]) -> KResult<()> {
        let (found, decision, data_size): (Option<Vec<u8>>, _, usize) = self.port.with_state(|state| {
            let me = state
                .running
                .expect("receive_no_wait called outside a task context");
            let data_size = state.mailboxes[mb].data_size();
            let accepts = matches!(
                state.mailboxes[mb].front_kind(),
                Some(SlotKind::SendWait) | Some(SlotKind::SendNoWait)
            );
            let found = if accepts {
                let id = state.mailboxes[mb]
                    .front_id()
                    .expect("front_kind returned Some");
                let slot = state.mailboxes[mb]
                    .extract_slot(id)
                    .expect("the front slot is always extractable");
                let payload = slot
                    .payload
                    .expect("a send slot always carries a payload");
                if let Some(sender) = slot.blocked_task {
                    state.tasks[sender].mailbox_wait = None;
                    state.waiting.remove(&mut state.tasks, sender);
                    state
                        .ready
                        .insert_sorted(&mut state.tasks, sender, |t| t.deadline);
                }
                Some(payload)
            } else {
                None
            };
            (found, state.reschedule(Some(me), true), data_size)
        });
        self.port.dispatch(decision);
        match found {
            Some(payload) => {
                dst[..data_size].copy_from_slice(&payload);
                Ok(())
            }
            None => {
                debug!(target: "edf_kernel::ipc", "receive_no_wait: mailbox {mb} has nothing to offer");
                Err(KernelError::Fail)
            }
        }
    }
}
