//! sqspipe-core
//!
//! Concurrency and termination engine that pumps records between a queue
//! and a process's standard streams.
//!
//! # Modules
//! - **domain**: messages, batches, limits, worker outcomes
//! - **ports**: capability traits (`QueueClient`, `Sink`, `Source`)
//! - **lifetime**: shared cancellation / deadline token
//! - **app**: batch processor, poller, dispatcher, worker pool, pump
//! - **impls**: in-memory queue, line-oriented stdio adapters, test fakes
//! - **error**: `QueueError` and `PumpError`

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod lifetime;
pub mod ports;

pub use app::{BuildError, Pump, PumpBuilder, PumpConfig};
pub use error::{BoxError, PumpError, QueueError};
pub use lifetime::Lifetime;
