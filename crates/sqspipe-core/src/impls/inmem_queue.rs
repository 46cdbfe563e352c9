//! In-memory queue implementation (テスト用).
//!
//! long-poll するプロバイダのように振る舞う:
//! - 受信したメッセージは delete されるまで in-flight に移る
//! - 空のキューへの receive は send / 待ち時間切れ / キャンセルまで待つ
//! - 呼び出し履歴はすべて記録する（上限なし、テスト専用）

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use ulid::Ulid;

use crate::domain::{AckToken, Batch, BatchSize, Message};
use crate::error::QueueError;
use crate::lifetime::Lifetime;
use crate::ports::QueueClient;

/// Long-poll window used when none is configured.
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    body: String,
}

#[derive(Default)]
struct QueueState {
    /// Messages available for receipt, oldest first.
    visible: VecDeque<StoredMessage>,

    /// Received but not yet acknowledged.
    in_flight: HashMap<AckToken, StoredMessage>,

    next_id: u64,

    /// Bodies whose delete entries are rejected.
    rejected_deletes: HashSet<String>,

    receive_failures: VecDeque<QueueError>,
    delete_failures: VecDeque<QueueError>,
    send_failures: VecDeque<QueueError>,

    receive_requests: Vec<usize>,
    delete_calls: Vec<usize>,
    sent: Vec<String>,
}

impl QueueState {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("msg-{}", self.next_id)
    }

    fn push(&mut self, body: String) {
        let id = self.allocate_id();
        self.visible.push_back(StoredMessage { id, body });
    }

    fn take(&mut self, n: usize) -> Vec<Message> {
        let n = n.min(self.visible.len());
        let mut messages = Vec::with_capacity(n);
        for stored in self.visible.drain(..n) {
            let token = AckToken::new(Ulid::new().to_string());
            messages.push(Message::new(stored.body.clone(), token.clone()).with_id(stored.id.clone()));
            self.in_flight.insert(token, stored);
        }
        messages
    }
}

/// In-process [`QueueClient`] for tests.
///
/// Every call is recorded without bound, so it is not meant for long runs.
pub struct InMemoryQueueClient {
    state: Mutex<QueueState>,
    notify: Notify,
    wait_time: Duration,
    max_per_receive: usize,
    send_latency: Duration,
    delete_latency: Duration,
}

impl InMemoryQueueClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            wait_time: DEFAULT_WAIT_TIME,
            max_per_receive: BatchSize::MAX.get(),
            send_latency: Duration::ZERO,
            delete_latency: Duration::ZERO,
        }
    }

    /// Queue pre-filled with `bodies`, in order.
    pub fn with_messages<I, S>(bodies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut client = Self::new();
        {
            let state = client.state.get_mut();
            for body in bodies {
                state.push(body.into());
            }
        }
        client
    }

    /// Long-poll window of an empty receive.
    pub fn wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    /// Caps how many messages one receive hands out, like a provider that
    /// returns short batches.
    pub fn max_per_receive(mut self, n: usize) -> Self {
        self.max_per_receive = n;
        self
    }

    /// Simulated round-trip of each send.
    pub fn send_latency(mut self, latency: Duration) -> Self {
        self.send_latency = latency;
        self
    }

    /// Simulated round-trip of each delete; it honours the lifetime passed to
    /// `delete_batch`.
    pub fn delete_latency(mut self, latency: Duration) -> Self {
        self.delete_latency = latency;
        self
    }

    pub async fn push(&self, body: impl Into<String>) {
        self.state.lock().await.push(body.into());
        self.notify.notify_waiters();
    }

    pub async fn fail_next_receive(&self, err: QueueError) {
        self.state.lock().await.receive_failures.push_back(err);
    }

    pub async fn fail_next_delete(&self, err: QueueError) {
        self.state.lock().await.delete_failures.push_back(err);
    }

    pub async fn fail_next_send(&self, err: QueueError) {
        self.state.lock().await.send_failures.push_back(err);
    }

    /// Delete entries for messages with this body will be reported as failed.
    pub async fn reject_delete_of(&self, body: impl Into<String>) {
        self.state.lock().await.rejected_deletes.insert(body.into());
    }

    /// Returns every unacknowledged message to the visible set, as a
    /// provider does once the visibility timeout expires.
    pub async fn expire_in_flight(&self) {
        {
            let mut state = self.state.lock().await;
            let expired: Vec<_> = state.in_flight.drain().map(|(_, m)| m).collect();
            state.visible.extend(expired);
        }
        self.notify.notify_waiters();
    }

    /// Messages waiting to be received.
    pub async fn visible(&self) -> usize {
        self.state.lock().await.visible.len()
    }

    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    /// Batch size requested by every receive call, in call order.
    pub async fn receive_requests(&self) -> Vec<usize> {
        self.state.lock().await.receive_requests.clone()
    }

    /// Size of every batch passed to `delete_batch`, in call order.
    pub async fn delete_calls(&self) -> Vec<usize> {
        self.state.lock().await.delete_calls.clone()
    }

    /// Bodies accepted by `send`, in call order.
    pub async fn sent(&self) -> Vec<String> {
        self.state.lock().await.sent.clone()
    }
}

impl Default for InMemoryQueueClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueClient for InMemoryQueueClient {
    async fn receive_batch(&self, lifetime: &Lifetime, max: BatchSize) -> Result<Batch, QueueError> {
        self.state.lock().await.receive_requests.push(max.get());
        let deadline = Instant::now() + self.wait_time;

        loop {
            if lifetime.is_cancelled() {
                return Err(QueueError::Cancelled);
            }

            // Register interest before looking at the state so a push between
            // the check and the wait is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                if let Some(err) = state.receive_failures.pop_front() {
                    return Err(err);
                }
                if !state.visible.is_empty() {
                    let messages = state.take(max.get().min(self.max_per_receive));
                    return Batch::try_from(messages);
                }
            }

            tokio::select! {
                biased;
                _ = lifetime.cancelled() => return Err(QueueError::Cancelled),
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(deadline) => return Ok(Batch::empty()),
            }
        }
    }

    async fn delete_batch(&self, lifetime: &Lifetime, batch: &Batch) -> Result<(), QueueError> {
        if !self.delete_latency.is_zero() {
            lifetime
                .run_until_cancelled(tokio::time::sleep(self.delete_latency))
                .await
                .ok_or(QueueError::Cancelled)?;
        }

        let mut state = self.state.lock().await;
        state.delete_calls.push(batch.len());
        if let Some(err) = state.delete_failures.pop_front() {
            return Err(err);
        }

        let mut failed = Vec::new();
        for (index, message) in batch.iter().enumerate() {
            let accepted = !state.rejected_deletes.contains(message.body())
                && state.in_flight.remove(message.ack_token()).is_some();
            if !accepted {
                failed.push(
                    message
                        .id()
                        .map(str::to_string)
                        .unwrap_or_else(|| index.to_string()),
                );
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(QueueError::PartialDelete { failed })
        }
    }

    async fn send(&self, lifetime: &Lifetime, body: &str) -> Result<(), QueueError> {
        if !self.send_latency.is_zero() {
            lifetime
                .run_until_cancelled(tokio::time::sleep(self.send_latency))
                .await
                .ok_or(QueueError::Cancelled)?;
        }

        {
            let mut state = self.state.lock().await;
            if let Some(err) = state.send_failures.pop_front() {
                return Err(err);
            }
            state.sent.push(body.to_string());
            state.push(body.to_string());
        }
        self.notify.notify_waiters();
        Ok(())
    }
}
