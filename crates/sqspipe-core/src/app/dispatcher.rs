//! Send-mode worker loop.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{RemainingLimit, WorkerOutcome};
use crate::error::{PumpError, QueueError};
use crate::lifetime::Lifetime;
use crate::ports::{QueueClient, Source};

/// What a single read-and-publish step ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Sent,
    EndOfInput,
    Cancelled,
}

/// Pulls records from a [`Source`] and publishes each one.
#[derive(Clone)]
pub struct Dispatcher {
    client: Arc<dyn QueueClient>,
    source: Arc<dyn Source>,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn QueueClient>, source: Arc<dyn Source>) -> Self {
        Self { client, source }
    }

    /// Publishes until the input ends, the lifetime is cancelled, or a send fails.
    pub async fn run(&self, worker_id: usize, lifetime: &Lifetime) -> WorkerOutcome {
        debug!(worker_id, "dispatcher started");
        let result = self.dispatch(lifetime, None).await;
        let outcome = WorkerOutcome::from_result(result, lifetime.is_cancelled());
        debug!(worker_id, ?outcome, "dispatcher stopped");
        outcome
    }

    /// Like [`Dispatcher::run`], but also stops once `limit` records were sent.
    pub async fn run_with_limit(
        &self,
        lifetime: &Lifetime,
        limit: &mut RemainingLimit,
    ) -> WorkerOutcome {
        info!(limit = limit.get(), "bounded dispatch started");
        let result = self.dispatch(lifetime, Some(&mut *limit)).await;
        let outcome = WorkerOutcome::from_result(result, lifetime.is_cancelled());
        info!(remaining = limit.get(), ?outcome, "bounded dispatch stopped");
        outcome
    }

    async fn dispatch(
        &self,
        lifetime: &Lifetime,
        mut limit: Option<&mut RemainingLimit>,
    ) -> Result<(), PumpError> {
        loop {
            if lifetime.is_cancelled() {
                return Ok(());
            }
            if limit.as_ref().is_some_and(|l| l.is_exhausted()) {
                return Ok(());
            }

            match self.step(lifetime).await? {
                Step::Sent => {
                    if let Some(limit) = limit.as_mut() {
                        limit.consume(1);
                    }
                }
                Step::EndOfInput => {
                    debug!("end of input");
                    return Ok(());
                }
                Step::Cancelled => return Ok(()),
            }
        }
    }

    async fn step(&self, lifetime: &Lifetime) -> Result<Step, PumpError> {
        let next = match lifetime.run_until_cancelled(self.source.next()).await {
            None => return Ok(Step::Cancelled),
            Some(next) => next,
        };

        let body = match next {
            Ok(Some(body)) => body,
            Ok(None) => return Ok(Step::EndOfInput),
            Err(_) if lifetime.is_cancelled() => return Ok(Step::Cancelled),
            Err(e) => return Err(PumpError::Source(e)),
        };

        match self.client.send(lifetime, &body).await {
            Ok(()) => Ok(Step::Sent),
            Err(QueueError::Cancelled) => Ok(Step::Cancelled),
            Err(_) if lifetime.is_cancelled() => Ok(Step::Cancelled),
            Err(e) => Err(PumpError::Send(e)),
        }
    }
}
