//! sqspipe-sqs
//!
//! Amazon SQS implementation of [`QueueClient`].
//!
//! ```no_run
//! use sqspipe_core::Lifetime;
//! use sqspipe_sqs::SqsQueueClient;
//!
//! # async fn example() -> Result<(), sqspipe_sqs::ConnectError> {
//! let lifetime = Lifetime::new();
//! let client = SqsQueueClient::connect(&lifetime, "my-queue").await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_sqs::Client;
use aws_sdk_sqs::types::{BatchResultErrorEntry, DeleteMessageBatchRequestEntry};
use sqspipe_core::domain::{AckToken, Batch, BatchSize, Message};
use sqspipe_core::ports::QueueClient;
use sqspipe_core::{Lifetime, QueueError};
use tracing::{debug, info};

/// Long-poll window of every receive.
pub const WAIT_TIME: Duration = Duration::from_secs(20);

/// Failure to resolve the target queue.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("cancelled while resolving queue {0}")]
    Cancelled(String),

    #[error("GetQueueUrl({queue_name}) failed: {source}")]
    QueueUrl {
        queue_name: String,
        #[source]
        source: aws_sdk_sqs::Error,
    },

    #[error("GetQueueUrl({0}) returned no URL")]
    MissingUrl(String),
}

impl ConnectError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// [`QueueClient`] backed by one SQS queue.
///
/// The SDK client is internally reference counted and safe to share, so one
/// instance serves every worker without locking.
#[derive(Debug, Clone)]
pub struct SqsQueueClient {
    client: Client,
    queue_url: String,
    wait_time: Duration,
}

impl SqsQueueClient {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            wait_time: WAIT_TIME,
        }
    }

    /// Loads the default AWS configuration and resolves `queue_name` to its URL.
    pub async fn connect(lifetime: &Lifetime, queue_name: &str) -> Result<Self, ConnectError> {
        let resolve = async {
            let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let client = Client::new(&config);
            let output = client
                .get_queue_url()
                .queue_name(queue_name)
                .send()
                .await
                .map_err(|e| ConnectError::QueueUrl {
                    queue_name: queue_name.to_string(),
                    source: e.into(),
                })?;
            let queue_url = output
                .queue_url()
                .ok_or_else(|| ConnectError::MissingUrl(queue_name.to_string()))?
                .to_string();
            Ok(Self::new(client, queue_url))
        };

        let client = lifetime
            .run_until_cancelled(resolve)
            .await
            .ok_or_else(|| ConnectError::Cancelled(queue_name.to_string()))??;
        info!(queue_url = %client.queue_url, "queue resolved");
        Ok(client)
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

fn provider(err: impl Into<aws_sdk_sqs::Error>) -> QueueError {
    QueueError::provider(err.into())
}

fn to_batch(messages: &[aws_sdk_sqs::types::Message]) -> Result<Batch, QueueError> {
    let messages = messages
        .iter()
        .map(|m| {
            let mut message = Message::new(
                m.body().unwrap_or_default(),
                AckToken::new(m.receipt_handle().unwrap_or_default()),
            );
            if let Some(id) = m.message_id() {
                message = message.with_id(id);
            }
            message
        })
        .collect::<Vec<_>>();
    Batch::try_from(messages)
}

/// Names each rejected entry by its message id, falling back to the entry id
/// (the message's index in the batch), followed by the provider's reason.
fn failed_names(batch: &Batch, failed: &[BatchResultErrorEntry]) -> Vec<String> {
    failed
        .iter()
        .map(|entry| {
            let name = entry
                .id()
                .parse::<usize>()
                .ok()
                .and_then(|i| batch.messages().get(i))
                .and_then(Message::id)
                .unwrap_or(entry.id());
            match entry.message() {
                Some(reason) => format!("{name} ({reason})"),
                None => format!("{name} ({})", entry.code()),
            }
        })
        .collect()
}

#[async_trait]
impl QueueClient for SqsQueueClient {
    async fn receive_batch(&self, lifetime: &Lifetime, max: BatchSize) -> Result<Batch, QueueError> {
        let request = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max.get() as i32)
            .wait_time_seconds(self.wait_time.as_secs() as i32)
            .send();

        let output = lifetime
            .run_until_cancelled(request)
            .await
            .ok_or(QueueError::Cancelled)?
            .map_err(provider)?;

        to_batch(output.messages())
    }

    async fn delete_batch(&self, _lifetime: &Lifetime, batch: &Batch) -> Result<(), QueueError> {
        if batch.is_empty() {
            return Ok(());
        }

        let entries = batch
            .iter()
            .enumerate()
            .map(|(i, m)| {
                DeleteMessageBatchRequestEntry::builder()
                    .id(i.to_string())
                    .receipt_handle(m.ack_token().as_str())
                    .build()
                    .map_err(QueueError::provider)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .delete_message_batch()
            .queue_url(&self.queue_url)
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(provider)?;

        let failed = failed_names(batch, output.failed());

        if failed.is_empty() {
            debug!(deleted = batch.len(), "batch deleted");
            Ok(())
        } else {
            Err(QueueError::PartialDelete { failed })
        }
    }

    async fn send(&self, lifetime: &Lifetime, body: &str) -> Result<(), QueueError> {
        let request = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send();

        lifetime
            .run_until_cancelled(request)
            .await
            .ok_or(QueueError::Cancelled)?
            .map_err(provider)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> SqsQueueClient {
        let config = aws_sdk_sqs::Config::builder()
            .behavior_version(aws_sdk_sqs::config::BehaviorVersion::latest())
            .region(aws_sdk_sqs::config::Region::new("us-east-1"))
            .build();
        SqsQueueClient::new(Client::from_conf(config), "https://sqs.invalid/000000000000/q")
    }

    #[tokio::test]
    async fn empty_delete_makes_no_request() {
        let client = offline_client();
        client
            .delete_batch(&Lifetime::new(), &Batch::empty())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_receive_returns_immediately() {
        let client = offline_client();
        let lifetime = Lifetime::new();
        lifetime.cancel();

        let err = client
            .receive_batch(&lifetime, BatchSize::MAX)
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Cancelled));
    }

    #[tokio::test]
    async fn cancelled_send_returns_immediately() {
        let client = offline_client();
        let lifetime = Lifetime::new();
        lifetime.cancel();

        let err = client.send(&lifetime, "body").await.unwrap_err();
        assert!(matches!(err, QueueError::Cancelled));
    }

    fn sqs_message(id: &str, body: &str) -> aws_sdk_sqs::types::Message {
        aws_sdk_sqs::types::Message::builder()
            .message_id(id)
            .receipt_handle(format!("rh-{id}"))
            .body(body)
            .build()
    }

    #[test]
    fn received_messages_keep_order_and_ack_tokens() {
        let batch = to_batch(&[sqs_message("a", "first"), sqs_message("b", "second")]).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.messages()[0].body(), "first");
        assert_eq!(batch.messages()[0].ack_token().as_str(), "rh-a");
        assert_eq!(batch.messages()[1].id(), Some("b"));
    }

    #[test]
    fn oversized_receive_is_rejected() {
        let messages: Vec<_> = (0..11).map(|i| sqs_message(&i.to_string(), "x")).collect();
        assert!(matches!(to_batch(&messages), Err(QueueError::OversizedBatch(11))));
    }

    #[test]
    fn failed_entries_are_named_by_message_id() {
        let batch = to_batch(&[sqs_message("m-0", "a"), sqs_message("m-1", "b")]).unwrap();
        let failed = [
            BatchResultErrorEntry::builder()
                .id("1")
                .code("ReceiptHandleIsInvalid")
                .sender_fault(true)
                .message("handle expired")
                .build()
                .unwrap(),
            BatchResultErrorEntry::builder()
                .id("bogus")
                .code("InternalError")
                .sender_fault(false)
                .build()
                .unwrap(),
        ];

        assert_eq!(
            failed_names(&batch, &failed),
            vec!["m-1 (handle expired)", "bogus (InternalError)"]
        );
    }

    #[test]
    fn default_wait_is_twenty_seconds() {
        assert_eq!(offline_client().wait_time, Duration::from_secs(20));
        assert_eq!(offline_client().queue_url(), "https://sqs.invalid/000000000000/q");
    }
}
