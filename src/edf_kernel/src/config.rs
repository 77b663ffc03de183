//! Kernel configuration. **(ambient stack)**
//!
//! The original kernel has no configuration step beyond `init_kernel`
//! itself — task and mailbox counts are bounded only by the host's heap.
//! This crate bounds its arenas explicitly (so a bad `create_task`/
//! `create_mailbox` call fails fast with [`crate::KernelError::Fail`]
//! instead of growing without limit), which is why a small runtime
//! builder sits in front of `init_kernel`, in the spirit of `r3_kernel`'s
//! `cfg::CfgBuilder` (a compile-time configuration builder there; a
//! run-time one here, since this kernel's resources are fallibly
//! heap-allocated rather than const-evaluated — see `DESIGN.md`).
#[derive(Debug, Clone, Copy)]
pub struct KernelConfig {
    pub(crate) max_tasks: usize,
    pub(crate) max_mailboxes: usize,
}

impl KernelConfig {
    pub fn builder() -> KernelConfigBuilder {
        KernelConfigBuilder::default()
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        KernelConfig {
            max_tasks: 16,
            max_mailboxes: 8,
        }
    }
}

/// Builds a [`KernelConfig`]. Every setting has a sensible default so
/// `KernelConfig::builder().build()` is a valid, if small, configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelConfigBuilder {
    cfg: KernelConfig,
}

impl KernelConfigBuilder {
    /// Maximum number of simultaneously live tasks, including idle.
    pub fn max_tasks(mut self, n: usize) -> Self {
        self.cfg.max_tasks = n;
        self
    }

    /// Maximum number of simultaneously live mailboxes.
    pub fn max_mailboxes(mut self, n: usize) -> Self {
        self.cfg.max_mailboxes = n;
        self
    }

    pub fn build(self) -> KernelConfig {
        self.cfg
    }
}
