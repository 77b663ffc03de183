//! Core of a preemptive, single-CPU, Earliest-Deadline-First micro-kernel.
//!
//! This crate implements exactly three coupled subsystems: the EDF
//! scheduler and tick engine, task lifecycle, and bounded-FIFO mailbox IPC.
//! It does not implement a context switch, a periodic timer, or interrupt
//! masking itself — those are supplied by a [`Port`](port::Port)
//! implementation (see the `edf_kernel_sim` crate for a hosted one used by
//! this crate's own test suite and by application demos).
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod ipc;
pub mod kernel;
pub mod list;
pub mod mailbox;
pub mod port;
pub mod tcb;

pub use config::KernelConfig;
pub use error::{KernelError, KResult};
pub use kernel::{init_kernel, Kernel, KernelState, TaskId};
pub use mailbox::MailboxId;
pub use port::{Dispatch, Port, TaskBody};

/// A tick is the kernel's unit of time: one period of the periodic interrupt.
pub type Tick = u32;
