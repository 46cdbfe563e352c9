//! BatchProcessor - 1 回の receive → 書き出し → ack サイクル
//!
//! # 学習ポイント
//! - 受信数は失敗時も返す（上位の limit 計算を正確に保つ）
//! - ack は「全件書けたときだけ」、部分成功では削除しない
//! - キャンセル後の ack は猶予つき（[`ACK_GRACE`]）で待つ

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::{Batch, BatchSize};
use crate::error::{PumpError, QueueError};
use crate::lifetime::Lifetime;
use crate::ports::{QueueClient, Sink};

/// How long an acknowledgment already in flight may run once the lifetime is cancelled.
pub const ACK_GRACE: Duration = Duration::from_secs(1);

/// Result of one cycle.
///
/// `received` is reported even when `result` is an error, so limit
/// bookkeeping stays exact.
#[derive(Debug)]
pub struct Cycle {
    pub received: usize,
    pub result: Result<(), PumpError>,
}

impl Cycle {
    fn idle() -> Self {
        Self {
            received: 0,
            result: Ok(()),
        }
    }
}

/// Receives a batch, writes every body to the sink in order, then
/// optionally deletes the whole batch.
#[derive(Clone)]
pub struct BatchProcessor {
    client: Arc<dyn QueueClient>,
    sink: Arc<dyn Sink>,
    delete: bool,
}

impl BatchProcessor {
    pub fn new(client: Arc<dyn QueueClient>, sink: Arc<dyn Sink>, delete: bool) -> Self {
        Self {
            client,
            sink,
            delete,
        }
    }

    /// Runs one cycle requesting up to `size` messages.
    ///
    /// - Cancellation (before or during the receive) yields an idle cycle.
    /// - A sink failure stops the batch at that message; nothing is deleted.
    /// - Deletion happens only after every message was written.
    pub async fn run_cycle(&self, lifetime: &Lifetime, size: BatchSize) -> Cycle {
        if lifetime.is_cancelled() {
            return Cycle::idle();
        }

        let batch = match self.client.receive_batch(lifetime, size).await {
            Ok(batch) => batch,
            Err(QueueError::Cancelled) => return Cycle::idle(),
            // Cancellation outranks whatever the interrupted call reported.
            Err(_) if lifetime.is_cancelled() => return Cycle::idle(),
            Err(e) => {
                return Cycle {
                    received: 0,
                    result: Err(PumpError::Receive(e)),
                };
            }
        };

        let received = batch.len();
        debug!(requested = %size, received, "batch received");

        for (index, message) in batch.iter().enumerate() {
            if let Err(source) = self.sink.write(message.body()).await {
                return Cycle {
                    received,
                    result: Err(PumpError::Sink {
                        position: index + 1,
                        source,
                    }),
                };
            }
        }

        if self.delete && !batch.is_empty() {
            if let Err(e) = self.acknowledge(lifetime, &batch).await {
                return Cycle {
                    received,
                    result: Err(PumpError::Delete(e)),
                };
            }
            debug!(deleted = received, "batch acknowledged");
        }

        Cycle {
            received,
            result: Ok(()),
        }
    }

    /// Deletes a batch that is already on the sink.
    ///
    /// Cancellation does not interrupt the delete right away (that would only
    /// guarantee a redelivery); it gets [`ACK_GRACE`] to finish, then is
    /// abandoned as [`QueueError::Cancelled`].
    async fn acknowledge(&self, lifetime: &Lifetime, batch: &Batch) -> Result<(), QueueError> {
        let ack = Lifetime::detached();
        let expired = async {
            lifetime.cancelled().await;
            tokio::time::sleep(ACK_GRACE).await;
        };

        tokio::select! {
            result = self.client.delete_batch(&ack, batch) => result,
            () = expired => {
                warn!(messages = batch.len(), grace = ?ACK_GRACE, "acknowledgment abandoned after cancellation");
                Err(QueueError::Cancelled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkerOutcome;
    use crate::impls::{InMemoryQueueClient, MemorySink};

    fn processor(
        client: &Arc<InMemoryQueueClient>,
        sink: &Arc<MemorySink>,
        delete: bool,
    ) -> BatchProcessor {
        BatchProcessor::new(client.clone(), sink.clone(), delete)
    }

    #[tokio::test]
    async fn writes_in_order_and_deletes_full_batch() {
        let client = Arc::new(InMemoryQueueClient::with_messages(["a", "b", "c"]));
        let sink = Arc::new(MemorySink::new());

        let cycle = processor(&client, &sink, true)
            .run_cycle(&Lifetime::new(), BatchSize::MAX)
            .await;

        assert_eq!(cycle.received, 3);
        assert!(cycle.result.is_ok());
        assert_eq!(sink.written().await, vec!["a", "b", "c"]);
        assert_eq!(client.delete_calls().await, vec![3]);
        assert_eq!(client.in_flight().await, 0);
    }

    #[tokio::test]
    async fn without_delete_messages_stay_in_flight() {
        let client = Arc::new(InMemoryQueueClient::with_messages(["a", "b"]));
        let sink = Arc::new(MemorySink::new());

        let cycle = processor(&client, &sink, false)
            .run_cycle(&Lifetime::new(), BatchSize::MAX)
            .await;

        assert_eq!(cycle.received, 2);
        assert!(client.delete_calls().await.is_empty());
        assert_eq!(client.in_flight().await, 2);
    }

    #[tokio::test]
    async fn handler_failure_skips_rest_and_acknowledgment() {
        let client = Arc::new(InMemoryQueueClient::with_messages(["m1", "m2", "m3"]));
        let sink = Arc::new(MemorySink::failing_on_call(2));

        let cycle = processor(&client, &sink, true)
            .run_cycle(&Lifetime::new(), BatchSize::MAX)
            .await;

        assert_eq!(cycle.received, 3);
        match cycle.result {
            Err(PumpError::Sink { position, .. }) => assert_eq!(position, 2),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(sink.calls().await, 2);
        assert_eq!(sink.written().await, vec!["m1"]);
        assert!(client.delete_calls().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_batch_is_never_deleted() {
        let client = Arc::new(InMemoryQueueClient::new().wait_time(std::time::Duration::from_secs(1)));
        let sink = Arc::new(MemorySink::new());

        let cycle = processor(&client, &sink, true)
            .run_cycle(&Lifetime::new(), BatchSize::MAX)
            .await;

        assert_eq!(cycle.received, 0);
        assert!(cycle.result.is_ok());
        assert!(client.delete_calls().await.is_empty());
    }

    #[tokio::test]
    async fn cancelled_lifetime_skips_receive() {
        let client = Arc::new(InMemoryQueueClient::with_messages(["a"]));
        let sink = Arc::new(MemorySink::new());
        let lifetime = Lifetime::new();
        lifetime.cancel();

        let cycle = processor(&client, &sink, true)
            .run_cycle(&lifetime, BatchSize::MAX)
            .await;

        assert_eq!(cycle.received, 0);
        assert!(cycle.result.is_ok());
        assert!(client.receive_requests().await.is_empty());
    }

    #[tokio::test]
    async fn receive_error_is_annotated() {
        let client = Arc::new(InMemoryQueueClient::with_messages(["a"]));
        client.fail_next_receive(QueueError::provider("throttled")).await;
        let sink = Arc::new(MemorySink::new());

        let cycle = processor(&client, &sink, true)
            .run_cycle(&Lifetime::new(), BatchSize::MAX)
            .await;

        let err = cycle.result.unwrap_err();
        assert!(matches!(err, PumpError::Receive(_)));
        assert_eq!(err.to_string(), "ReceiveBatch() failed: throttled");
    }

    #[tokio::test]
    async fn delete_failure_still_reports_received_count() {
        let client = Arc::new(InMemoryQueueClient::with_messages(["a", "b"]));
        client.reject_delete_of("b").await;
        let sink = Arc::new(MemorySink::new());

        let cycle = processor(&client, &sink, true)
            .run_cycle(&Lifetime::new(), BatchSize::MAX)
            .await;

        assert_eq!(cycle.received, 2);
        assert!(matches!(
            cycle.result,
            Err(PumpError::Delete(QueueError::PartialDelete { .. }))
        ));
        assert_eq!(sink.written().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn whole_delete_failure_fails_the_worker() {
        let client = Arc::new(InMemoryQueueClient::with_messages(["a", "b"]));
        client.fail_next_delete(QueueError::provider("access denied")).await;
        let sink = Arc::new(MemorySink::new());
        let lifetime = Lifetime::new();

        let cycle = processor(&client, &sink, true)
            .run_cycle(&lifetime, BatchSize::MAX)
            .await;

        assert_eq!(cycle.received, 2);
        assert_eq!(client.delete_calls().await, vec![2]);
        assert_eq!(client.in_flight().await, 2);
        let err = cycle.result.unwrap_err();
        assert!(matches!(err, PumpError::Delete(QueueError::Provider(_))));
        assert_eq!(err.to_string(), "DeleteBatch() failed: access denied");
        assert!(WorkerOutcome::from_result(Err(err), lifetime.is_cancelled()).is_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_in_flight_at_cancellation_may_finish_within_grace() {
        let client = Arc::new(
            InMemoryQueueClient::with_messages(["a"]).delete_latency(ACK_GRACE / 2),
        );
        let sink = Arc::new(MemorySink::new());
        let lifetime = Lifetime::new();
        let _deadline = lifetime.cancel_after(ACK_GRACE / 4);

        let cycle = processor(&client, &sink, true)
            .run_cycle(&lifetime, BatchSize::MAX)
            .await;

        assert!(lifetime.is_cancelled());
        assert!(cycle.result.is_ok());
        assert_eq!(client.delete_calls().await, vec![1]);
        assert_eq!(client.in_flight().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_delete_is_abandoned_after_grace() {
        let client = Arc::new(
            InMemoryQueueClient::with_messages(["a"]).delete_latency(Duration::from_secs(3600)),
        );
        let sink = Arc::new(MemorySink::new());
        let lifetime = Lifetime::new();
        let _deadline = lifetime.cancel_after(Duration::from_millis(50));

        let started = tokio::time::Instant::now();
        let cycle = processor(&client, &sink, true)
            .run_cycle(&lifetime, BatchSize::MAX)
            .await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(cycle.received, 1);
        let err = cycle.result.unwrap_err();
        assert!(err.is_cancelled());
        assert!(WorkerOutcome::from_result(Err(err), true).is_cancelled());
        assert_eq!(sink.written().await, vec!["a"]);
        assert_eq!(client.in_flight().await, 1);
    }
}
