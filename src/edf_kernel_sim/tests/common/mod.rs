use std::thread;
use std::time::Duration;

use edf_kernel::{init_kernel, Kernel, KernelConfig};
use edf_kernel_sim::SimPort;

/// Boots a kernel on a deterministic port (no free-running tick source) and
/// leaks it to get the `'static` lifetime `Kernel::run` requires — fine for
/// a test process that exits right after the assertions run.
pub fn boot(config: KernelConfig) -> &'static Kernel<SimPort> {
    let port = SimPort::new_deterministic(config);
    Box::leak(Box::new(init_kernel(port, config).expect("init_kernel failed")))
}

/// Enters running mode on a background thread (`run` never returns) and
/// gives the initially elected task a moment to reach its first blocking
/// call before the test starts driving ticks.
pub fn start(kernel: &'static Kernel<SimPort>) {
    thread::spawn(move || kernel.run());
    settle();
}

/// Injects `n` ticks back to back. Fast: nothing here waits on real time,
/// `on_tick_isr` dispatches are synchronous and only park/unpark threads
/// that are already caught up.
pub fn tick(kernel: &'static Kernel<SimPort>, n: u32) {
    for _ in 0..n {
        SimPort::inject_tick(kernel);
    }
}

/// Gives woken task threads a chance to run their kernel calls before the
/// test inspects shared state. Not a substitute for correctness, just a
/// bound on how long the test waits for another thread's next scheduling
/// point to actually execute.
pub fn settle() {
    thread::sleep(Duration::from_millis(30));
}
