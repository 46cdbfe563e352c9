use std::io;

use async_trait::async_trait;

/// Output side of receive mode.
///
/// When one sink is shared by several workers, a single `write` call is one
/// full record: implementations must never interleave two records.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn write(&self, body: &str) -> io::Result<()>;
}
