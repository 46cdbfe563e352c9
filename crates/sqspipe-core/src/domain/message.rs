//! Messages and batches as they travel between the queue and the pump.

use std::fmt;

use crate::error::QueueError;

/// Opaque value returned with a received message; only ever handed back to
/// the queue to acknowledge it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AckToken(String);

impl AckToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AckToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A received queue message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    body: String,
    ack_token: AckToken,
    /// Provider-assigned identity, used only to name failures.
    id: Option<String>,
}

impl Message {
    pub fn new(body: impl Into<String>, ack_token: AckToken) -> Self {
        Self {
            body: body.into(),
            ack_token,
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn ack_token(&self) -> &AckToken {
        &self.ack_token
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Number of messages requested from a single receive call.
///
/// Always within `1..=10`; 10 is the provider's hard ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatchSize(u8);

impl BatchSize {
    pub const MAX: BatchSize = BatchSize(10);

    /// Returns `None` for zero or anything above the ceiling.
    pub fn new(n: usize) -> Option<Self> {
        if (1..=Self::MAX.get()).contains(&n) {
            Some(Self(n as u8))
        } else {
            None
        }
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BatchSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered group of at most ten messages received in one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    messages: Vec<Message>,
}

impl Batch {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }
}

impl TryFrom<Vec<Message>> for Batch {
    type Error = QueueError;

    fn try_from(messages: Vec<Message>) -> Result<Self, Self::Error> {
        if messages.len() > BatchSize::MAX.get() {
            return Err(QueueError::OversizedBatch(messages.len()));
        }
        Ok(Self { messages })
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
