//! Scheduler core, task lifecycle, and time API.
//!
//! [`KernelState`] owns every process-wide mutable structure (the task
//! arena, the three ordered lists, the tick counter, the mailbox arena).
//! [`Kernel`] is the thin handle applications hold: it wraps a [`Port`] and
//! expresses every blocking call as "mutate lists under `Port::with_state`,
//! then `Port::dispatch` outside the lock" (`SPEC_FULL.md` §4.2).

use alloc::vec::Vec;
use log::{debug, info, trace, warn};
use slab::Slab;

use crate::config::KernelConfig;
use crate::error::{KernelError, KResult};
use crate::list::DList;
use crate::mailbox::{Mailbox, MailboxId};
use crate::port::{Dispatch, Port, TaskBody};
use crate::tcb::Tcb;
use crate::Tick;

pub use crate::tcb::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Startup,
    Running,
}

/// Every piece of process-wide mutable kernel state, reached only through
/// `Port::with_state`'s critical section.
pub struct KernelState<P: Port> {
    pub(crate) tasks: Slab<Tcb<P::TaskHandle>>,
    pub(crate) mailboxes: Slab<Mailbox>,
    pub(crate) ready: DList,
    pub(crate) timer: DList,
    pub(crate) waiting: DList,
    pub(crate) tick: Tick,
    pub(crate) running: Option<TaskId>,
    pub(crate) idle: Option<TaskId>,
    pub(crate) mode: Mode,
    pub(crate) max_tasks: usize,
    pub(crate) max_mailboxes: usize,
}

impl<P: Port> KernelState<P> {
    /// A fresh, un-initialized kernel state: every list empty, no idle task
    /// yet. A `Port` constructs one of these to seed its own state storage;
    /// [`init_kernel`] then populates the idle task and enters start-up mode.
    pub fn new(config: KernelConfig) -> Self {
        KernelState {
            tasks: Slab::with_capacity(config.max_tasks),
            mailboxes: Slab::with_capacity(config.max_mailboxes),
            ready: DList::new(),
            timer: DList::new(),
            waiting: DList::new(),
            tick: 0,
            running: None,
            idle: None,
            mode: Mode::Startup,
            max_tasks: config.max_tasks,
            max_mailboxes: config.max_mailboxes,
        }
    }

    fn ready_front(&self) -> TaskId {
        self.ready
            .front()
            .expect("Ready always contains at least the idle task (invariant I4)")
    }

    /// Elect `Ready.front()` and report what the calling `Port` must do.
    ///
    /// `caller` is the task invoking this from its own execution context
    /// (`None` from the tick ISR, which has none). `caller_yields` is false
    /// for `terminate` and the tick ISR — neither has a context to park and
    /// later resume — and true for every other blocking entry point.
    pub(crate) fn reschedule(
        &mut self,
        caller: Option<TaskId>,
        caller_yields: bool,
    ) -> Dispatch<P::TaskHandle> {
        let next = self.ready_front();
        self.running = Some(next);
        if caller == Some(next) {
            trace!(target: "edf_kernel::sched", "reschedule: {next} remains elected");
            return Dispatch::Continue;
        }
        let next_handle = if Some(next) == self.idle {
            None
        } else {
            self.tasks[next].handle.clone()
        };
        trace!(target: "edf_kernel::sched", "reschedule: electing {next}");
        Dispatch::SwitchTo {
            next,
            next_handle,
            caller_blocks: caller.is_some() && caller_yields,
        }
    }

    /// The tick ISR's four steps (`SPEC_FULL.md` §4.5), minus the final
    /// `Running := Ready.head.next.task` assignment, which the caller
    /// performs via `reschedule` so both entry points share one code path.
    ///
    /// **(SUPPLEMENT)** Step 2 also promotes a sleeping task whose own
    /// deadline has passed even though its wake horizon (`wake_at`) hasn't
    /// — a literal port of the source's Timer-list check alone can never
    /// produce scenario 5 from `spec.md` §8 (`wait(100)` with a deadline of
    /// 50 must resume at tick 50, not tick 100), since the source's
    /// `TimerInt` only ever inspects `nTCnt`. See `DESIGN.md`.
    pub(crate) fn on_tick_locked(&mut self) {
        self.tick = self.tick.saturating_add(1);
        let tick = self.tick;

        let woken: Vec<TaskId> = self
            .timer
            .iter(&self.tasks)
            .filter(|&id| {
                let t = &self.tasks[id];
                t.wake_at <= tick || t.deadline <= tick
            })
            .collect();
        for id in woken {
            self.timer.remove(&mut self.tasks, id);
            self.ready.insert_sorted(&mut self.tasks, id, |t| t.deadline);
            debug!(target: "edf_kernel::sched", "tick {tick}: waking task {id}");
        }

        // Waiting is sorted by deadline ascending, so the first
        // not-yet-expired entry means nothing after it is expired either.
        let mut expired = Vec::new();
        for id in self.waiting.iter(&self.tasks) {
            if self.tasks[id].deadline <= tick {
                expired.push(id);
            } else {
                break;
            }
        }
        for id in expired {
            self.waiting.remove(&mut self.tasks, id);
            self.ready.insert_sorted(&mut self.tasks, id, |t| t.deadline);
            warn!(target: "edf_kernel::sched", "tick {tick}: task {id} deadline reached while blocked");
        }
    }
}

/// An application's single handle to the kernel: the `Port` it runs on,
/// plus every Task/Time/Mailbox API entry point as an inherent method.
pub struct Kernel<P: Port> {
    pub(crate) port: P,
}

impl<P: Port> Kernel<P> {
    pub fn port(&self) -> &P {
        &self.port
    }

    pub(crate) fn resume_deadline_check(&self, me: TaskId) -> KResult<()> {
        self.port.with_state(|state| {
            if state.tasks[me].deadline <= state.tick {
                warn!(target: "edf_kernel", "task {me} resumed with deadline reached");
                Err(KernelError::DeadlineReached)
            } else {
                Ok(())
            }
        })
    }

    /// Creates a task. In start-up mode it's simply inserted into Ready; in
    /// running mode the caller follows the block-protocol, handing off to
    /// whichever task (possibly the new one) now has the earliest deadline.
    ///
    /// Returns `OK`/`FAIL` only, per the Kernel API table (`spec.md` §6) —
    /// unlike the other blocking entries this one never reports
    /// `DEADLINE_REACHED`, even though it shares their dispatch mechanism.
    pub fn create_task(&self, body: TaskBody, deadline: Tick) -> KResult<TaskId> {
        let id = self.port.with_state(|state| {
            if state.tasks.len() >= state.max_tasks {
                return Err(KernelError::Fail);
            }
            Ok(state.tasks.insert(Tcb::new(deadline)))
        })?;

        let handle = self.port.spawn_task(id, body);

        let decision = self.port.with_state(|state| {
            state.tasks[id].handle = Some(handle);
            state.ready.insert_sorted(&mut state.tasks, id, |t| t.deadline);
            match state.mode {
                Mode::Startup => None,
                Mode::Running => {
                    let me = state
                        .running
                        .expect("running mode always has a running task");
                    Some(state.reschedule(Some(me), true))
                }
            }
        });

        if let Some(decision) = decision {
            self.port.dispatch(decision);
        }
        info!(target: "edf_kernel", "created task {id} with deadline {deadline}");
        Ok(id)
    }

    /// Starts the periodic tick source, leaves start-up mode, and elects
    /// the tightest-deadline task. Never returns, mirroring `spec.md` §4.3.
    pub fn run(&'static self) -> ! {
        let decision = self.port.with_state(|state| {
            state.mode = Mode::Running;
            state.reschedule(None, false)
        });
        self.port.start_tick_source(self);
        info!(target: "edf_kernel", "kernel entering running mode");
        self.port.dispatch(decision);
        // The calling context (not itself a task) has no work left to do.
        loop {
            self.port.park_current();
        }
    }

    /// Invoked by a `Port`'s tick source. Never called from a task's own
    /// execution context, so the caller never yields in the `reschedule`
    /// sense — the elected task is simply dispatched to.
    pub fn on_tick_isr(&self) {
        let decision = self.port.with_state(|state| {
            state.on_tick_locked();
            state.reschedule(None, false)
        });
        self.port.dispatch(decision);
    }

    /// Ticks remaining until the next Timer-list wakeup, for a tickless
    /// `Port` deciding how long it may legitimately sleep. **(SUPPLEMENT)**
    pub fn ticks_until_next_wake(&self) -> Option<Tick> {
        self.port.with_state(|state| {
            let id = state.timer.front()?;
            Some(state.tasks[id].wake_at.saturating_sub(state.tick))
        })
    }

    /// Terminates the running task. Never returns: by the time `dispatch`
    /// runs, this task's TCB no longer exists.
    pub fn terminate(&self) -> ! {
        let decision = self.port.with_state(|state| {
            let me = state
                .running
                .expect("terminate called without a running task");
            assert!(
                Some(me) != state.idle,
                "the idle task is not a real task and cannot terminate"
            );
            state.ready.remove(&mut state.tasks, me);
            state.tasks.remove(me);
            info!(target: "edf_kernel", "task {me} terminated");
            state.reschedule(None, false)
        });
        self.port.dispatch(decision);
        loop {
            self.port.park_current();
        }
    }

    /// Sets the calling task's deadline and re-elects. No return value per
    /// the Kernel API table (`spec.md` §6): unlike `wait`/IPC calls this one
    /// never reports whether the caller's own deadline already lapsed.
    pub fn set_deadline(&self, new_deadline: Tick) {
        let decision = self.port.with_state(|state| {
            let me = state
                .running
                .expect("set_deadline called outside a task context");
            state.tasks[me].deadline = new_deadline;
            state.ready.remove(&mut state.tasks, me);
            state.ready.insert_sorted(&mut state.tasks, me, |t| t.deadline);
            state.reschedule(Some(me), true)
        });
        self.port.dispatch(decision);
    }

    pub fn deadline(&self) -> Tick {
        self.port.with_state(|state| {
            let me = state
                .running
                .expect("deadline called outside a task context");
            state.tasks[me].deadline
        })
    }

    pub fn ticks(&self) -> Tick {
        self.port.with_state(|state| state.tick)
    }

    pub fn set_ticks(&self, value: Tick) {
        self.port.with_state(|state| state.tick = value);
    }

    /// Blocks the caller until `n` ticks have passed. Resumes with
    /// `DEADLINE_REACHED` if the caller's own deadline (not its sleep
    /// horizon) has already passed by then.
    pub fn wait(&self, n: Tick) -> KResult<()> {
        let me = self.port.with_state(|state| {
            let me = state
                .running
                .expect("wait called outside a task context");
            state.tasks[me].wake_at = state.tick.saturating_add(n);
            state.ready.remove(&mut state.tasks, me);
            state.timer.insert_sorted(&mut state.tasks, me, |t| t.wake_at);
            let decision = state.reschedule(Some(me), true);
            (me, decision)
        });
        self.port.dispatch(me.1);
        self.resume_deadline_check(me.0)
    }

    pub fn create_mailbox(&self, max_messages: usize, data_size: usize) -> KResult<MailboxId> {
        self.port.with_state(|state| {
            if state.mailboxes.len() >= state.max_mailboxes {
                return Err(KernelError::Fail);
            }
            let id = state.mailboxes.insert(Mailbox::new(max_messages, data_size));
            info!(target: "edf_kernel", "created mailbox {id} (cap={max_messages}, size={data_size})");
            Ok(id)
        })
    }

    pub fn no_messages(&self, mb: MailboxId) -> KResult<()> {
        self.port.with_state(|state| {
            if state.mailboxes[mb].is_empty() {
                state.mailboxes.remove(mb);
                Ok(())
            } else {
                Err(KernelError::NotEmpty)
            }
        })
    }
}

/// Initializes a kernel: creates the idle task (`DeadLine = Tick::MAX`) and
/// enters start-up mode. `port` must already exist (its own constructor
/// stands in for allocating the three lists); this call is what actually
/// populates them, matching `spec.md` §4.3's "must be made before any other
/// call" contract. See `DESIGN.md` for why configuration is layered this
/// way instead of `init_kernel` being parameterless.
pub fn init_kernel<P: Port>(port: P, config: KernelConfig) -> KResult<Kernel<P>> {
    let max_tasks = config.max_tasks;
    let max_mailboxes = config.max_mailboxes;
    port.with_state(|state| {
        *state = KernelState::new(config);
        let idle = state.tasks.insert(Tcb::new(Tick::MAX));
        state.ready.push_back(&mut state.tasks, idle);
        state.idle = Some(idle);
        state.running = Some(idle);
    });
    info!(target: "edf_kernel", "kernel initialized: max_tasks={max_tasks} max_mailboxes={max_mailboxes}");
    Ok(Kernel { port })
}
