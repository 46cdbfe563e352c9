//! WorkerPool - N 本のワーカーと 1 つの Lifetime
//!
//! # 学習ポイント
//! - 最初の失敗で子 Lifetime をキャンセルし、残りは自然に止める
//! - 全ワーカーの終了を待ってから最初のエラーを返す
//! - panic は `JoinError` から `WorkerPanicked` に変換

use std::future::Future;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tracing::{info, warn};

use crate::domain::WorkerOutcome;
use crate::error::PumpError;
use crate::lifetime::Lifetime;

/// Outcomes of every worker of one pool run, in completion order.
#[derive(Debug, Default)]
pub struct PoolReport {
    outcomes: Vec<(usize, WorkerOutcome)>,
    first_failure: Option<usize>,
}

impl PoolReport {
    fn record(&mut self, worker_id: usize, outcome: WorkerOutcome) {
        if outcome.is_failed() && self.first_failure.is_none() {
            self.first_failure = Some(self.outcomes.len());
        }
        self.outcomes.push((worker_id, outcome));
    }

    pub fn outcomes(&self) -> &[(usize, WorkerOutcome)] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, WorkerOutcome::Completed))
    }

    pub fn cancelled(&self) -> usize {
        self.count(WorkerOutcome::is_cancelled)
    }

    pub fn failed(&self) -> usize {
        self.count(WorkerOutcome::is_failed)
    }

    fn count(&self, pred: impl Fn(&WorkerOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }

    /// The first failure reported by any worker, or `Ok` if none failed.
    pub fn into_result(mut self) -> Result<(), PumpError> {
        match self.first_failure {
            Some(index) => self.outcomes.swap_remove(index).1.into_result(),
            None => Ok(()),
        }
    }
}

/// Spawns a fixed number of workers and waits for all of them.
///
/// - Workers get a child of the caller's lifetime, so an external cancel
///   reaches all of them.
/// - The first failing worker cancels that child lifetime; peers wind down
///   and the pool still waits for every one of them before returning.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Runs `size` workers built by `spawn_worker(worker_id, lifetime)`.
    pub async fn run<F, Fut>(&self, parent: &Lifetime, spawn_worker: F) -> PoolReport
    where
        F: Fn(usize, Lifetime) -> Fut,
        Fut: Future<Output = WorkerOutcome> + Send + 'static,
    {
        let lifetime = parent.child();
        info!(workers = self.size, "starting worker pool");

        let mut running: FuturesUnordered<_> = (0..self.size)
            .map(|worker_id| {
                let handle = tokio::spawn(spawn_worker(worker_id, lifetime.clone()));
                async move { (worker_id, handle.await) }
            })
            .collect();

        let mut report = PoolReport::default();
        while let Some((worker_id, joined)) = running.next().await {
            let outcome = joined.unwrap_or_else(|e| {
                WorkerOutcome::Failed(PumpError::WorkerPanicked {
                    worker_id,
                    message: e.to_string(),
                })
            });

            if let WorkerOutcome::Failed(err) = &outcome {
                if report.first_failure.is_none() {
                    warn!(worker_id, error = %err, "worker failed, cancelling peers");
                    lifetime.cancel();
                } else {
                    warn!(worker_id, error = %err, "worker failed");
                }
            }
            report.record(worker_id, outcome);
        }

        info!(
            completed = report.completed(),
            cancelled = report.cancelled(),
            failed = report.failed(),
            "worker pool stopped"
        );
        report
    }
}
