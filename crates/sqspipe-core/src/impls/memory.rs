//! In-memory sink and source, for tests and embedding.

use std::collections::VecDeque;
use std::io;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ports::{Sink, Source};

/// Records every body it is handed.
#[derive(Default)]
pub struct MemorySink {
    state: Mutex<SinkState>,
}

#[derive(Default)]
struct SinkState {
    written: Vec<String>,
    calls: usize,
    fail_on_call: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `call`-th write (1-based, counted across all writers) fails and
    /// records nothing.
    pub fn failing_on_call(call: usize) -> Self {
        Self {
            state: Mutex::new(SinkState {
                fail_on_call: Some(call),
                ..SinkState::default()
            }),
        }
    }

    pub async fn written(&self) -> Vec<String> {
        self.state.lock().await.written.clone()
    }

    /// Number of write attempts, failed ones included.
    pub async fn calls(&self) -> usize {
        self.state.lock().await.calls
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn write(&self, body: &str) -> io::Result<()> {
        let mut state = self.state.lock().await;
        state.calls += 1;
        if state.fail_on_call == Some(state.calls) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
        }
        state.written.push(body.to_string());
        Ok(())
    }
}

/// Yields a fixed list of records, then end of input.
pub struct MemorySource {
    state: Mutex<SourceState>,
}

struct SourceState {
    records: VecDeque<String>,
    /// Yield an error instead of end of input once the records run out.
    error_at_end: Option<io::Error>,
}

impl MemorySource {
    pub fn new<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: Mutex::new(SourceState {
                records: records.into_iter().map(Into::into).collect(),
                error_at_end: None,
            }),
        }
    }

    /// After the records are exhausted, fails with `err` once instead of
    /// reporting end of input.
    pub fn then_error(self, err: io::Error) -> Self {
        let mut state = self.state.into_inner();
        state.error_at_end = Some(err);
        Self {
            state: Mutex::new(state),
        }
    }

    pub async fn remaining(&self) -> usize {
        self.state.lock().await.records.len()
    }
}

#[async_trait]
impl Source for MemorySource {
    async fn next(&self) -> io::Result<Option<String>> {
        let mut state = self.state.lock().await;
        if let Some(record) = state.records.pop_front() {
            return Ok(Some(record));
        }
        match state.error_at_end.take() {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }
}
