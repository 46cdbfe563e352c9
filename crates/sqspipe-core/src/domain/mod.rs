//! Domain model (messages, batches, limits, outcomes).

pub mod limit;
pub mod message;
pub mod outcome;

pub use limit::RemainingLimit;
pub use message::{AckToken, Batch, BatchSize, Message};
pub use outcome::WorkerOutcome;
