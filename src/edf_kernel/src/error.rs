//! Kernel error codes.
//!
//! The original kernel returns a C `exception` code (`OK`/`FAIL`/
//! `DEADLINE_REACHED`/`NOT_EMPTY`) from almost every entry point. Here `OK`
//! becomes `Ok(())` (or `Ok(T)` where an entry point produces a value) and
//! the remaining three become variants of [`KernelError`].

use core::fmt;

/// Everything that can go wrong calling into the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Allocation failure or a precondition violation (`create_task`,
    /// `create_mailbox`, `init_kernel`, `send_wait`, `send_no_wait`).
    Fail,
    /// The calling task's deadline passed while it was blocked.
    DeadlineReached,
    /// `no_messages` was called on a mailbox that still has queued messages.
    NotEmpty,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Fail => write!(f, "FAIL"),
            KernelError::DeadlineReached => write!(f, "DEADLINE_REACHED"),
            KernelError::NotEmpty => write!(f, "NOT_EMPTY"),
        }
    }
}

/// The result type almost every kernel entry point returns.
pub type KResult<T = ()> = Result<T, KernelError>;
