//! PumpBuilder - キュー / 設定 / ワーカーループのワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンと起動時検証（0 は BuildError）
//! - 無制限の実行は [`WorkerPool`]、limit ありは単一ワーカーで同期実行
//!   （limit の計算を正確に保つため）

use std::sync::Arc;

use tracing::{debug, info};

use super::batch::BatchProcessor;
use super::config::PumpConfig;
use super::dispatcher::Dispatcher;
use super::poller::Poller;
use super::pool::WorkerPool;
use crate::domain::RemainingLimit;
use crate::error::PumpError;
use crate::lifetime::Lifetime;
use crate::ports::{QueueClient, Sink, Source};

/// BuildError は Pump 構築時のエラー
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("concurrency must be greater than 0")]
    ZeroConcurrency,

    #[error("message limit must be greater than 0")]
    ZeroLimit,
}

/// Builds a [`Pump`].
///
/// ```ignore
/// let pump = PumpBuilder::new(client)
///     .concurrency(4)
///     .delete(true)
///     .build()?;
/// pump.receive(sink, &lifetime).await?;
/// ```
pub struct PumpBuilder {
    client: Arc<dyn QueueClient>,
    concurrency: Option<usize>,
    delete: bool,
    limit: Option<u64>,
}

impl PumpBuilder {
    pub fn new(client: Arc<dyn QueueClient>) -> Self {
        Self {
            client,
            concurrency: None,
            delete: false,
            limit: None,
        }
    }

    pub fn from_config(client: Arc<dyn QueueClient>, config: &PumpConfig) -> Self {
        Self {
            client,
            concurrency: config.concurrency,
            delete: config.delete,
            limit: config.limit,
        }
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = Some(n);
        self
    }

    pub fn delete(mut self, delete: bool) -> Self {
        self.delete = delete;
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn build(self) -> Result<Pump, BuildError> {
        if self.concurrency == Some(0) {
            return Err(BuildError::ZeroConcurrency);
        }
        if self.limit == Some(0) {
            return Err(BuildError::ZeroLimit);
        }

        let config = PumpConfig {
            concurrency: self.concurrency,
            delete: self.delete,
            limit: self.limit,
            timeout: None,
        };
        if config.is_bounded() && self.concurrency.is_some_and(|n| n > 1) {
            debug!("message limit set, concurrency ignored");
        }

        Ok(Pump {
            client: self.client,
            workers: config.effective_concurrency(),
            delete: config.delete,
            limit: config.limit,
        })
    }
}

/// Moves messages between a queue and a sink or source.
pub struct Pump {
    client: Arc<dyn QueueClient>,
    workers: usize,
    delete: bool,
    limit: Option<u64>,
}

impl Pump {
    /// Worker count used for unbounded runs.
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Receive mode: drains the queue into `sink`.
    ///
    /// Returns `Ok` on clean completion or cancellation, and the first
    /// worker failure otherwise.
    pub async fn receive(&self, sink: Arc<dyn Sink>, lifetime: &Lifetime) -> Result<(), PumpError> {
        let processor = BatchProcessor::new(Arc::clone(&self.client), sink, self.delete);
        let poller = Poller::new(processor);

        if let Some(limit) = self.limit {
            let mut limit = RemainingLimit::new(limit);
            return poller.run_with_limit(lifetime, &mut limit).await.into_result();
        }

        info!(workers = self.workers, delete = self.delete, "receiving");
        WorkerPool::new(self.workers)
            .run(lifetime, |worker_id, lifetime| {
                let poller = poller.clone();
                async move { poller.run(worker_id, &lifetime).await }
            })
            .await
            .into_result()
    }

    /// Send mode: publishes every record of `source`.
    pub async fn send(&self, source: Arc<dyn Source>, lifetime: &Lifetime) -> Result<(), PumpError> {
        let dispatcher = Dispatcher::new(Arc::clone(&self.client), source);

        if let Some(limit) = self.limit {
            let mut limit = RemainingLimit::new(limit);
            return dispatcher
                .run_with_limit(lifetime, &mut limit)
                .await
                .into_result();
        }

        info!(workers = self.workers, "sending");
        WorkerPool::new(self.workers)
            .run(lifetime, |worker_id, lifetime| {
                let dispatcher = dispatcher.clone();
                async move { dispatcher.run(worker_id, &lifetime).await }
            })
            .await
            .into_result()
    }
}
