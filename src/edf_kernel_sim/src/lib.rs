//! Host `Port` implementation for `edf_kernel`, used by its own test suite
//! and by application demos.
//!
//! Each task's execution context is a real OS thread parked on a
//! `Condvar`-guarded flag rather than raw `thread::park`/`unpark` — the raw
//! primitives are vulnerable to spurious wakeups, which here would let a
//! task proceed without actually having been elected. The kernel state
//! itself lives behind a single `std::sync::Mutex`, standing in for the
//! single-CPU critical section a real target realizes with `isr_off`/
//! `isr_on` (mirroring how the teacher crate simulates a preemptible
//! single-CPU kernel with real threads on a hosted multi-core machine).

use std::cell::RefCell;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use edf_kernel::{Kernel, KernelConfig, KernelState, Port, TaskBody, TaskId};

/// A single-slot wakeup flag. Immune to spurious wakeups (unlike a bare
/// `thread::park`/`unpark` pair) because `park` loops on the flag rather
/// than trusting that any wakeup means "you were elected".
struct Parker {
    woken: Mutex<bool>,
    cv: Condvar,
}

impl Parker {
    fn new() -> Self {
        Parker {
            woken: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn park(&self) {
        let mut woken = self.woken.lock().expect("parker mutex poisoned");
        while !*woken {
            woken = self.cv.wait(woken).expect("parker mutex poisoned");
        }
        *woken = false;
    }

    fn unpark(&self) {
        *self.woken.lock().expect("parker mutex poisoned") = true;
        self.cv.notify_one();
    }
}

thread_local! {
    /// The parker for whichever task (if any) is running on this OS
    /// thread. Populated once, right before a spawned task thread first
    /// parks itself awaiting its initial dispatch.
    static CURRENT_PARKER: RefCell<Option<Arc<Parker>>> = const { RefCell::new(None) };
}

/// A `Port` over real OS threads. `TaskHandle` is the task's own `Parker`.
pub struct SimPort {
    state: Mutex<KernelState<SimPort>>,
    /// The parker used by whichever thread calls [`Kernel::run`] — not
    /// itself a task, but it still needs somewhere to wait once dispatch
    /// hands control to the elected task.
    main_parker: Arc<Parker>,
    /// If set, [`Port::start_tick_source`] doesn't spawn a real background
    /// ticker; the owner drives time entirely through [`SimPort::inject_tick`].
    deterministic: bool,
}

impl SimPort {
    pub fn new(config: KernelConfig) -> Self {
        SimPort {
            state: Mutex::new(KernelState::new(config)),
            main_parker: Arc::new(Parker::new()),
            deterministic: false,
        }
    }

    /// A port whose clock only advances when explicitly told to, via
    /// [`SimPort::inject_tick`] — for test suites that need an exact,
    /// race-free tick count rather than a free-running background ticker.
    /// **(SUPPLEMENT, `SPEC_FULL.md` §6/§8)**
    pub fn new_deterministic(config: KernelConfig) -> Self {
        SimPort {
            deterministic: true,
            ..Self::new(config)
        }
    }

    /// Advances the simulated clock by exactly one tick and runs the tick
    /// handler synchronously. Only meaningful on a port built with
    /// [`SimPort::new_deterministic`] — otherwise the background ticker
    /// started by `run()` races with it.
    pub fn inject_tick(kernel: &Kernel<Self>) {
        kernel.on_tick_isr();
    }
}

impl Default for SimPort {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

impl Port for SimPort {
    type TaskHandle = Arc<Parker>;

    fn with_state<R>(&self, f: impl FnOnce(&mut KernelState<Self>) -> R) -> R {
        let mut guard = self.state.lock().expect("kernel state mutex poisoned");
        f(&mut guard)
    }

    fn spawn_task(&self, id: TaskId, body: TaskBody) -> Self::TaskHandle {
        let parker = Arc::new(Parker::new());
        let task_parker = Arc::clone(&parker);
        thread::Builder::new()
            .name(format!("edf-task-{id}"))
            .spawn(move || {
                CURRENT_PARKER.with(|cell| *cell.borrow_mut() = Some(Arc::clone(&task_parker)));
                // A freshly created task doesn't run until the scheduler
                // actually elects and dispatches to it.
                task_parker.park();
                body();
            })
            .expect("failed to spawn task thread");
        parker
    }

    fn park_current(&self) {
        let parker = CURRENT_PARKER
            .with(|cell| cell.borrow().clone())
            .unwrap_or_else(|| Arc::clone(&self.main_parker));
        parker.park();
    }

    fn unpark(&self, handle: &Self::TaskHandle) {
        handle.unpark();
    }

    fn start_tick_source(&self, kernel: &'static Kernel<Self>) {
        if self.deterministic {
            return;
        }
        thread::spawn(move || loop {
            thread::sleep(Duration::from_millis(1));
            kernel.on_tick_isr();
        });
    }
}
