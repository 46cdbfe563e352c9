//! Receive-mode worker loop.

use tracing::{debug, info};

use super::batch::BatchProcessor;
use crate::domain::{BatchSize, RemainingLimit, WorkerOutcome};
use crate::error::PumpError;
use crate::lifetime::Lifetime;

/// Drives the [`BatchProcessor`] until cancelled, failed, or (bounded) the
/// limit is used up.
#[derive(Clone)]
pub struct Poller {
    processor: BatchProcessor,
}

impl Poller {
    pub fn new(processor: BatchProcessor) -> Self {
        Self { processor }
    }

    /// Polls full batches until the lifetime is cancelled or a cycle fails.
    pub async fn run(&self, worker_id: usize, lifetime: &Lifetime) -> WorkerOutcome {
        debug!(worker_id, "poller started");
        let result = self.poll(lifetime).await;
        let outcome = WorkerOutcome::from_result(result, lifetime.is_cancelled());
        debug!(worker_id, ?outcome, "poller stopped");
        outcome
    }

    /// Polls until `limit` reaches zero, requesting `min(remaining, 10)` each cycle.
    ///
    /// `limit` is decremented by every cycle's received count before that
    /// cycle's error (if any) is surfaced.
    pub async fn run_with_limit(
        &self,
        lifetime: &Lifetime,
        limit: &mut RemainingLimit,
    ) -> WorkerOutcome {
        info!(limit = limit.get(), "bounded poll started");
        let result = self.poll_with_limit(lifetime, limit).await;
        let outcome = WorkerOutcome::from_result(result, lifetime.is_cancelled());
        info!(remaining = limit.get(), ?outcome, "bounded poll stopped");
        outcome
    }

    async fn poll(&self, lifetime: &Lifetime) -> Result<(), PumpError> {
        while !lifetime.is_cancelled() {
            self.processor
                .run_cycle(lifetime, BatchSize::MAX)
                .await
                .result?;
        }
        Ok(())
    }

    async fn poll_with_limit(
        &self,
        lifetime: &Lifetime,
        limit: &mut RemainingLimit,
    ) -> Result<(), PumpError> {
        while let Some(size) = limit.next_batch_size() {
            if lifetime.is_cancelled() {
                break;
            }
            let cycle = self.processor.run_cycle(lifetime, size).await;
            limit.consume(cycle.received);
            cycle.result?;
        }
        Ok(())
    }
}
