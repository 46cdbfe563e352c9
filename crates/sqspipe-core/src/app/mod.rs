//! App - the pump engine.
//!
//! # Components
//! - **BatchProcessor**: one receive → handle → acknowledge cycle
//! - **Poller**: receive-mode worker loop (unbounded or limited)
//! - **Dispatcher**: send-mode worker loop (unbounded or limited)
//! - **WorkerPool**: N workers sharing one cancellable lifetime
//! - **PumpBuilder / Pump**: configuration and mode selection

pub mod batch;
pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod poller;
pub mod pool;

pub use self::batch::{BatchProcessor, Cycle};
pub use self::builder::{BuildError, Pump, PumpBuilder};
pub use self::config::{PumpConfig, WORKERS_PER_CPU};
pub use self::dispatcher::Dispatcher;
pub use self::poller::Poller;
pub use self::pool::{PoolReport, WorkerPool};
