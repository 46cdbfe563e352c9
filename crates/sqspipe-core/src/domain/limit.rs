//! Countdown for bounded runs.

use super::message::BatchSize;

/// Messages still to be received or sent before a bounded run stops.
///
/// Decremented by what a cycle actually returned or sent, never by what was
/// requested. Saturates at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainingLimit(u64);

impl RemainingLimit {
    pub fn new(limit: u64) -> Self {
        Self(limit)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    pub fn is_exhausted(&self) -> bool {
        self.0 == 0
    }

    /// `min(remaining, 10)`, or `None` once exhausted.
    pub fn next_batch_size(&self) -> Option<BatchSize> {
        let n = self.0.min(BatchSize::MAX.get() as u64) as usize;
        BatchSize::new(n)
    }

    pub fn consume(&mut self, n: usize) {
        self.0 = self.0.saturating_sub(n as u64);
    }
}
