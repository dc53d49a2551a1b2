//! Bounded-time invocation - 関数呼び出しに待ち時間の上限をつける
//!
//! # 学習ポイント
//! - 結果は容量 1 の oneshot で受け取る（send は決してブロックしない）
//!   → 呼び出し側が先に諦めても、実行中の関数は送信で詰まらずに終了できる
//! - timeout と結果受信を競わせ、先に決まった方を返す
//!
//! # 制限
//! タイムアウトしても実行中の関数は **キャンセルしない**。
//! バックグラウンドで最後まで走り、結果は捨てられる。
//! キャンセルが必要なら、関数側でキャンセル信号をポーリングすること。

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::InvokeError;

/// Outcome of a bounded-time invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation<R> {
    /// The function returned within the limit.
    Completed(R),
    /// The limit elapsed first. The function may still be running.
    TimedOut,
    /// The function ended without producing a result (it panicked).
    Aborted,
}

impl<R> Invocation<R> {
    pub fn timed_out(&self) -> bool {
        matches!(self, Invocation::TimedOut)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Invocation::Completed(_))
    }

    pub fn completed(self) -> Option<R> {
        match self {
            Invocation::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<R, InvokeError> {
        match self {
            Invocation::Completed(value) => Ok(value),
            Invocation::TimedOut => Err(InvokeError::TimedOut),
            Invocation::Aborted => Err(InvokeError::Aborted),
        }
    }
}

/// Call `f` and run the future it returns as its own task, waiting at most
/// `limit` for the output.
///
/// `f` itself is called inside that task, so synchronous work it does before
/// returning its future also counts against `limit`.
///
/// On timeout the task is left running; its output is discarded when it
/// finishes.
pub async fn invoke_with_timeout<F, Fut, R>(f: F, limit: Duration) -> Invocation<R>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        // 受信側がもういなければ結果は捨てる
        let _ = tx.send(f().await);
    });
    race(rx, limit).await
}

/// `invoke_with_timeout` for a synchronous function, run on the blocking
/// thread pool.
pub async fn invoke_blocking_with_timeout<F, R>(f: F, limit: Duration) -> Invocation<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::task::spawn_blocking(move || {
        let _ = tx.send(f());
    });
    race(rx, limit).await
}

async fn race<R>(rx: oneshot::Receiver<R>, limit: Duration) -> Invocation<R> {
    match tokio::time::timeout(limit, rx).await {
        Ok(Ok(value)) => Invocation::Completed(value),
        // sender が送らずに drop された = 関数が panic した
        Ok(Err(_)) => Invocation::Aborted,
        Err(_) => {
            tracing::debug!(limit = ?limit, "invocation timed out");
            Invocation::TimedOut
        }
    }
}
