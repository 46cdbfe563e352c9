//! Run configuration, built once and handed to the pump by value.

use std::time::Duration;

/// Workers spawned per available CPU when no concurrency is given.
pub const WORKERS_PER_CPU: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PumpConfig {
    /// Worker count; `None` means [`WORKERS_PER_CPU`] × CPUs.
    pub concurrency: Option<usize>,

    /// Acknowledge (delete) each fully handled batch.
    pub delete: bool,

    /// Stop after this many messages; forces a single worker.
    pub limit: Option<u64>,

    /// Absolute deadline for the whole run.
    pub timeout: Option<Duration>,
}

impl PumpConfig {
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency
            .unwrap_or_else(|| WORKERS_PER_CPU * num_cpus::get())
    }

    pub fn is_bounded(&self) -> bool {
        self.limit.is_some()
    }
}
