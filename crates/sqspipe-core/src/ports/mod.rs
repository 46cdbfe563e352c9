//! Ports - capabilities the pump drives.
//!
//! Each trait is the seam between the engine and the outside world (the
//! remote queue, the output stream, the input stream). Implementations live
//! in `impls` (in-memory, line-oriented) or in separate crates (`sqspipe-sqs`).

pub mod queue_client;
pub mod sink;
pub mod source;

pub use self::queue_client::QueueClient;
pub use self::sink::Sink;
pub use self::source::Source;
