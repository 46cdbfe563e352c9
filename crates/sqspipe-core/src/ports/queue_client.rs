use async_trait::async_trait;

use crate::domain::{Batch, BatchSize};
use crate::error::QueueError;
use crate::lifetime::Lifetime;

/// Remote queue capability set.
///
/// Implementations must be safe to call concurrently from many workers
/// through one shared instance; the engine never locks around them.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Requests up to `max` messages, long-polling until some arrive or the
    /// provider's wait window elapses (an empty batch, not an error).
    ///
    /// Must return [`QueueError::Cancelled`] promptly once `lifetime` is
    /// cancelled instead of waiting out the window.
    async fn receive_batch(&self, lifetime: &Lifetime, max: BatchSize) -> Result<Batch, QueueError>;

    /// Acknowledges `batch` as one provider-side operation.
    ///
    /// Any rejected entry fails the whole call with
    /// [`QueueError::PartialDelete`] naming every failed message. The engine
    /// never calls this with an empty batch.
    async fn delete_batch(&self, lifetime: &Lifetime, batch: &Batch) -> Result<(), QueueError>;

    /// Publishes one message body, returning once the provider confirmed it.
    async fn send(&self, lifetime: &Lifetime, body: &str) -> Result<(), QueueError>;
}
