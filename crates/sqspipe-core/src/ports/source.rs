use std::io;

use async_trait::async_trait;

/// Input side of send mode.
#[async_trait]
pub trait Source: Send + Sync {
    /// Next record, or `Ok(None)` once the input is exhausted.
    ///
    /// End of input is a clean stop, not a failure. Implementations shared by
    /// several dispatchers hand each record to exactly one caller, and must be
    /// cancel-safe: dropping a pending call must not lose a record.
    async fn next(&self) -> io::Result<Option<String>>;
}
