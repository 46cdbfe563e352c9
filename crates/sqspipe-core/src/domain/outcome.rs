//! Terminal result of a single worker.

use crate::error::PumpError;

/// How a worker finished.
///
/// Cancellation is never a failure: a worker whose error only says "cancelled"
/// reports [`WorkerOutcome::Cancelled`].
#[derive(Debug)]
pub enum WorkerOutcome {
    /// Ran to its natural end (limit reached, input exhausted).
    Completed,
    Cancelled,
    Failed(PumpError),
}

impl WorkerOutcome {
    /// Classifies the result of a worker loop.
    ///
    /// `cancelled` is whether the lifetime was cancelled at exit; a clean
    /// return observed after cancellation counts as [`WorkerOutcome::Cancelled`].
    pub fn from_result(result: Result<(), PumpError>, cancelled: bool) -> Self {
        match result {
            Ok(()) if cancelled => Self::Cancelled,
            Ok(()) => Self::Completed,
            Err(e) if e.is_cancelled() => Self::Cancelled,
            Err(e) => Self::Failed(e),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Collapses the outcome into the process-level result: only failures are errors.
    pub fn into_result(self) -> Result<(), PumpError> {
        match self {
            Self::Failed(e) => Err(e),
            Self::Completed | Self::Cancelled => Ok(()),
        }
    }
}
