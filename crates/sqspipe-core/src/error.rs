use std::io;

use thiserror::Error;

/// Boxed provider error, so adapters can surface whatever their SDK returns.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors reported by a [`QueueClient`](crate::ports::QueueClient) implementation.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The lifetime token was cancelled while the call was in flight.
    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Provider(#[source] BoxError),

    /// Some entries of a batch delete were rejected by the provider.
    #[error("failed to delete {} message(s): {}", .failed.len(), .failed.join(", "))]
    PartialDelete { failed: Vec<String> },

    #[error("provider returned {0} messages, above the batch ceiling of 10")]
    OversizedBatch(usize),
}

impl QueueError {
    pub fn provider<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Provider(err.into())
    }
}

/// Errors surfaced by the pump engine.
///
/// Each variant names the operation that produced it; the underlying cause is
/// kept as the error source.
#[derive(Debug, Error)]
pub enum PumpError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("ReceiveBatch() failed: {0}")]
    Receive(#[source] QueueError),

    #[error("DeleteBatch() failed: {0}")]
    Delete(#[source] QueueError),

    #[error("Send() failed: {0}")]
    Send(#[source] QueueError),

    /// The output sink rejected the message at `position` (1-based) of its batch.
    #[error("sink write failed at message {position}: {source}")]
    Sink {
        position: usize,
        #[source]
        source: io::Error,
    },

    #[error("input source failed: {0}")]
    Source(#[source] io::Error),

    #[error("worker-{worker_id} panicked: {message}")]
    WorkerPanicked { worker_id: usize, message: String },
}

impl PumpError {
    /// True when this error only records that the lifetime was cancelled.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Receive(e) | Self::Delete(e) | Self::Send(e) => {
                matches!(e, QueueError::Cancelled)
            }
            _ => false,
        }
    }
}
