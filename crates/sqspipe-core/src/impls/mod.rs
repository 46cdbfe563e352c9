//! Impls - in-process implementations of the ports.
//!
//! - **InMemoryQueueClient**: long-polling queue for tests
//! - **LineSink / LineSource**: newline-delimited stdout / stdin adapters
//! - **MemorySink / MemorySource**: fakes with failure injection
//!
//! The production queue client lives in its own crate (`sqspipe-sqs`).

pub mod inmem_queue;
pub mod line;
pub mod memory;

pub use self::inmem_queue::InMemoryQueueClient;
pub use self::line::{LineSink, LineSource};
pub use self::memory::{MemorySink, MemorySource};
