//! CompletionTracker - 未完了タスク数のカウンタ（wait group）
//!
//! # 学習ポイント
//! - `watch` チャネルで「カウンタ + 0 になるまで待つ」を表現
//! - Drop ガードによる「必ず 1 回だけ done する」保証
//! - 負数になる add はプログラミングエラーとして即座に panic

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::TrackerError;

/// Counts dispatched-but-not-yet-completed tasks.
///
/// Clones share the same counter. Only `add` / `done` / `enter` / `wait`
/// are exposed; the count itself cannot be set directly.
#[derive(Clone)]
pub struct CompletionTracker {
    count: Arc<watch::Sender<usize>>,
}

impl CompletionTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            count: Arc::new(tx),
        }
    }

    /// Adjust the outstanding count by `delta`.
    ///
    /// # Panics
    /// If the count would go negative. That means a completion was signalled
    /// without a matching dispatch.
    pub fn add(&self, delta: isize) {
        if let Err(err) = self.try_add(delta) {
            tracing::error!(error = %err, "completion tracker misuse");
            panic!("{err}");
        }
    }

    /// Like `add`, but reports a negative count instead of panicking.
    /// The counter is left untouched on error.
    pub fn try_add(&self, delta: isize) -> Result<usize, TrackerError> {
        let mut result = Ok(0);
        self.count.send_if_modified(|count| match count.checked_add_signed(delta) {
            Some(next) => {
                *count = next;
                result = Ok(next);
                delta != 0
            }
            None => {
                result = Err(TrackerError::NegativeCount {
                    current: *count,
                    delta,
                });
                false
            }
        });
        result
    }

    /// `add(-1)`.
    pub fn done(&self) {
        self.add(-1);
    }

    /// Increment by one and return a guard that calls `done` when dropped.
    pub fn enter(&self) -> CompletionGuard {
        self.add(1);
        CompletionGuard {
            tracker: self.clone(),
        }
    }

    /// Current outstanding count.
    pub fn outstanding(&self) -> usize {
        *self.count.borrow()
    }

    /// Wait until the outstanding count reaches zero.
    ///
    /// Returns immediately if it already is zero. `add` calls that should be
    /// covered by this wait must happen before it is called.
    pub async fn wait(&self) {
        let mut rx = self.count.subscribe();
        // sender は self が持っているので wait_for が Err になることはない
        let _ = rx.wait_for(|count| *count == 0).await;
    }

    /// Bounded `wait`. Returns `true` if zero was reached within `limit`.
    pub async fn wait_timeout(&self, limit: Duration) -> bool {
        tokio::time::timeout(limit, self.wait()).await.is_ok()
    }
}

impl Default for CompletionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CompletionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionTracker")
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

/// Scoped completion signal for one dispatched task.
///
/// Dropping the guard signals completion exactly once, on every exit path
/// (normal return, error, panic, or the task being dropped unprocessed).
#[must_use = "dropping the guard immediately signals completion"]
#[derive(Debug)]
pub struct CompletionGuard {
    tracker: CompletionTracker,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Err(err) = self.tracker.try_add(-1) {
            tracing::error!(error = %err, "completion tracker misuse");
            // unwind 中に panic すると abort になるのでログだけ残す
            if !std::thread::panicking() {
                panic!("{err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_returns_immediately_at_zero() {
        let tracker = CompletionTracker::new();
        assert!(tracker.wait_timeout(Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn wait_blocks_until_all_done() {
        let tracker = CompletionTracker::new();
        tracker.add(3);

        let waiter = tokio::spawn({
            let tracker = tracker.clone();
            async move { tracker.wait().await }
        });

        tracker.done();
        tracker.done();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        assert_eq!(tracker.outstanding(), 1);

        tracker.done();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tracker.outstanding(), 0);
    }

    #[test]
    fn try_add_rejects_negative_count() {
        let tracker = CompletionTracker::new();
        tracker.add(1);

        let err = tracker.try_add(-2).unwrap_err();
        assert_eq!(
            err,
            TrackerError::NegativeCount {
                current: 1,
                delta: -2
            }
        );
        // 失敗した add はカウンタを変えない
        assert_eq!(tracker.outstanding(), 1);
    }

    #[test]
    #[should_panic(expected = "would go negative")]
    fn done_without_dispatch_panics() {
        let tracker = CompletionTracker::new();
        tracker.done();
    }

    #[test]
    fn guard_signals_once_on_drop() {
        let tracker = CompletionTracker::new();
        let g1 = tracker.enter();
        let g2 = tracker.enter();
        assert_eq!(tracker.outstanding(), 2);

        drop(g1);
        assert_eq!(tracker.outstanding(), 1);
        drop(g2);
        assert_eq!(tracker.outstanding(), 0);
    }

    #[test]
    fn guard_signals_during_unwind() {
        let tracker = CompletionTracker::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = tracker.enter();
            panic!("task blew up");
        }));
        assert!(result.is_err());
        assert_eq!(tracker.outstanding(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_add_and_done_balance_out() {
        let tracker = CompletionTracker::new();
        let mut joins = Vec::new();
        for _ in 0..8 {
            let tracker = tracker.clone();
            joins.push(tokio::spawn(async move {
                for _ in 0..500 {
                    let guard = tracker.enter();
                    tokio::task::yield_now().await;
                    drop(guard);
                }
            }));
        }
        for j in joins {
            j.await.unwrap();
        }
        assert_eq!(tracker.outstanding(), 0);
        assert!(tracker.wait_timeout(Duration::from_millis(50)).await);
    }
}
