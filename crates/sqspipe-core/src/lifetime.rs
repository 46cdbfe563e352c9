//! Lifetime - pump 実行全体で共有するキャンセル / デッドライン
//!
//! # 学習ポイント
//! - キャンセルは「値」として渡す（プロセス全体の状態にしない）
//! - ブロックする呼び出しはすべて `&Lifetime` と競争させる
//! - `child()` で子だけを止められる（プールの fail-fast 用）

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct Lifetime {
    token: CancellationToken,
}

impl Lifetime {
    pub fn new() -> Self {
        Self::default()
    }

    /// A lifetime nobody else holds, so it is never cancelled.
    pub fn detached() -> Self {
        Self::default()
    }

    /// A lifetime cancelled together with `self`, which can also be
    /// cancelled on its own without touching the parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Drives `fut` until it completes or the lifetime is cancelled.
    ///
    /// Returns `None` on cancellation. If both are ready at once, cancellation wins.
    pub async fn run_until_cancelled<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            out = fut => Some(out),
        }
    }

    /// Arms an absolute deadline: the lifetime is cancelled once `after` elapses.
    ///
    /// The timer task exits early if the lifetime is cancelled first.
    pub fn cancel_after(&self, after: Duration) -> JoinHandle<()> {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(after) => {
                    info!(?after, "run deadline reached");
                    token.cancel();
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn child_follows_parent_but_not_the_reverse() {
        let parent = Lifetime::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let other = parent.child();
        parent.cancel();
        assert!(other.is_cancelled());
    }

    #[tokio::test]
    async fn run_until_cancelled_prefers_cancellation() {
        let lifetime = Lifetime::new();
        lifetime.cancel();
        let out = lifetime.run_until_cancelled(async { 42 }).await;
        assert_eq!(out, None);
    }

    #[tokio::test]
    async fn run_until_cancelled_returns_output() {
        let lifetime = Lifetime::new();
        let out = lifetime.run_until_cancelled(async { 42 }).await;
        assert_eq!(out, Some(42));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels_the_lifetime() {
        let lifetime = Lifetime::new();
        let timer = lifetime.cancel_after(Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!lifetime.is_cancelled());

        tokio::time::sleep(Duration::from_secs(2)).await;
        timer.await.unwrap();
        assert!(lifetime.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_wakes_waiters() {
        let lifetime = Lifetime::new();
        let waiter = {
            let lifetime = lifetime.clone();
            tokio::spawn(async move { lifetime.cancelled().await })
        };
        lifetime.cancel();
        tokio::time::timeout(Duration::from_millis(100), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
