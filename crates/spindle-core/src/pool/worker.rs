//! Worker - キューから 1 件ずつ取り出して処理するループ
//!
//! # フロー
//! 1. `WorkQueue::pop()` でジョブを取得（close かつ空なら終了）
//! 2. Processor を別タスクで実行（panic をワーカーから隔離）
//! 3. 結果をカウンタに記録
//! 4. CompletionGuard を drop して完了を通知
//!
//! 処理が返ってこない場合、そのワーカーはずっと塞がったまま（タイムアウトはない）。

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::{Job, Shared};
use crate::processor::TaskProcessor;
use crate::tracker::CompletionGuard;

/// Spawn `n` workers on `handle`. They run until the queue is closed and drained.
pub(crate) fn spawn_workers<T, P>(
    n: usize,
    shared: &Arc<Shared<T>>,
    processor: Arc<P>,
    handle: &Handle,
) -> Vec<JoinHandle<()>>
where
    T: Send + 'static,
    P: TaskProcessor<T>,
{
    let mut joins = Vec::with_capacity(n);
    for worker_id in 0..n {
        let shared = Arc::clone(shared);
        let processor = Arc::clone(&processor);
        // spawn 前に数えておく（shutdown が spawn 直後に来ても取りこぼさない）
        let alive = shared.live_workers.enter();
        joins.push(handle.spawn(worker_loop(worker_id, shared, processor, alive)));
    }
    joins
}

async fn worker_loop<T, P>(
    worker_id: usize,
    shared: Arc<Shared<T>>,
    processor: Arc<P>,
    _alive: CompletionGuard,
) where
    T: Send + 'static,
    P: TaskProcessor<T>,
{
    tracing::debug!(pool = %shared.name, worker = worker_id, "worker started");

    while let Some(Job { item, done }) = shared.queue.pop().await {
        let processor = Arc::clone(&processor);
        let outcome = tokio::spawn(async move { processor.process(item).await }).await;

        match outcome {
            Ok(Ok(())) => shared.counters.succeeded(),
            Ok(Err(err)) => {
                // エラーは呼び出し側の関心事。リトライも握りつぶしもしない
                shared.counters.failed();
                tracing::warn!(pool = %shared.name, worker = worker_id, error = %err, "task failed");
            }
            Err(join_err) if join_err.is_panic() => {
                shared.counters.panicked();
                tracing::error!(pool = %shared.name, worker = worker_id, "task panicked");
            }
            Err(join_err) => {
                shared.counters.failed();
                tracing::warn!(pool = %shared.name, worker = worker_id, error = %join_err, "task cancelled");
            }
        }

        // カウンタを更新してから完了を通知する（shutdown 後の counts を一貫させる）
        drop(done);
    }

    tracing::debug!(pool = %shared.name, worker = worker_id, "worker exiting");
}
