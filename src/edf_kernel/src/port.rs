//! The boundary between this crate's scheduling logic and the platform
//! primitives `spec.md` §6 treats as external collaborators: `isr_off`/
//! `isr_on`, `SaveContext`/`LoadContext`, and `timer0_start`.
//!
//! A real embedded target implements [`Port`] over its own context-switch
//! assembly and timer peripheral. The `edf_kernel_sim` crate implements it
//! over OS threads for hosted tests and demos.

use alloc::boxed::Box;

use crate::kernel::{Kernel, KernelState};
use crate::tcb::TaskId;

/// A task's entry point. Boxed rather than a bare `fn()` so a task can
/// close over state, which is the common case once a kernel has more than
/// a toy demo's worth of tasks.
pub type TaskBody = Box<dyn FnOnce() + Send + 'static>;

/// What a kernel entry point decided to do after mutating the ready/timer/
/// waiting lists, and what [`Port::dispatch`] must do about it. Built by
/// `KernelState::reschedule` while the critical section is still held, so
/// the elected task's handle is already resolved by the time the lock is
/// released.
#[derive(Debug, Clone)]
pub enum Dispatch<H> {
    /// The calling task is still the elected one; no hand-off needed.
    Continue,
    /// Control must transfer to a different task. `next_handle` is `None`
    /// when the newly elected task is the idle task (nothing to dispatch
    /// to — the CPU just executes nothing of interest). `caller_blocks` is
    /// false for `terminate` (the caller has no execution context to
    /// return to) and for the tick ISR (the "caller" isn't a task at all).
    SwitchTo {
        next: TaskId,
        next_handle: Option<H>,
        caller_blocks: bool,
    },
}

/// The platform boundary. See the module docs and `SPEC_FULL.md` §6.
pub trait Port: Sized {
    /// The port's own handle for a task's execution context (e.g. a host
    /// thread handle). Opaque to this crate.
    type TaskHandle: Clone;

    /// Run `f` with exclusive access to the kernel state, standing in for
    /// `isr_off()` ... `isr_on()` bracketing a critical section (the same
    /// shape as `cortex_m::interrupt::free`/`critical_section::with`).
    fn with_state<R>(&self, f: impl FnOnce(&mut KernelState<Self>) -> R) -> R;

    /// Allocate an execution context for a newly created task and arrange
    /// for it to run `body` once dispatched. Stands in for pointing a
    /// fresh TCB's `SP` at the top of its stack segment.
    fn spawn_task(&self, id: TaskId, body: TaskBody) -> Self::TaskHandle;

    /// Suspend the calling task's own execution context until a later
    /// `unpark` targets it. Stands in for the `SaveContext`/`LoadContext`
    /// pair: the parked OS thread *is* the saved context.
    fn park_current(&self);

    /// Resume a previously parked (or not-yet-started) task.
    fn unpark(&self, handle: &Self::TaskHandle);

    /// Start the periodic tick source that will call
    /// [`Kernel::on_tick_isr`]. Stands in for `timer0_start`. `kernel` is
    /// `'static` because a real timer ISR has no call-stack to capture it
    /// from.
    fn start_tick_source(&self, kernel: &'static Kernel<Self>);

    /// Apply a [`Dispatch`] decision: unpark the newly elected task (if
    /// one is being dispatched to) and, if the caller itself must yield
    /// the CPU, park it. The default implementation is correct for any
    /// port built directly on `park_current`/`unpark`.
    fn dispatch(&self, decision: Dispatch<Self::TaskHandle>) {
        if let Dispatch::SwitchTo {
            next_handle,
            caller_blocks,
            ..
        } = decision
        {
            if let Some(h) = next_handle {
                self.unpark(&h);
            }
            if caller_blocks {
                self.park_current();
            }
        }
    }
}
