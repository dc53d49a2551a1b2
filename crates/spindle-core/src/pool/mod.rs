//! Pool - 固定数ワーカーによる並行タスクプール
//!
//! # 主要コンポーネント
//! - **Pool**: submit / shutdown を提供するファサード
//! - **PoolBuilder**: 設定の検証とワイヤリング（Fail-fast）
//! - **worker**: キューを drain するワーカーループ
//!
//! # 不変条件
//! - submit は「tracker を増やしてから」キューに入れる
//!   （ワーカーが拾う前に wait が 0 を見て早期 return しないため）
//! - 各アイテムの完了通知は成功・失敗・panic に関わらずちょうど 1 回

pub mod builder;
mod worker;

pub use self::builder::PoolBuilder;

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;

use crate::error::PoolError;
use crate::observability::{Counters, PoolCounts};
use crate::processor::{TaskProcessor, processor_fn};
use crate::queue::WorkQueue;
use crate::tracker::{CompletionGuard, CompletionTracker};

/// A queued item together with its completion signal.
pub(crate) struct Job<T> {
    pub(crate) item: T,
    pub(crate) done: CompletionGuard,
}

/// State shared by the pool handle and its workers.
pub(crate) struct Shared<T> {
    pub(crate) name: String,
    pub(crate) queue: WorkQueue<Job<T>>,
    pub(crate) tracker: CompletionTracker,
    /// 生きているワーカー数
    pub(crate) live_workers: CompletionTracker,
    pub(crate) counters: Counters,
}

/// Fixed-size pool of workers draining a shared FIFO queue.
///
/// - At most `concurrency` processor calls run at once.
/// - `shutdown` closes the queue, waits for every accepted item, then joins
///   the workers.
/// - Dropping the pool without `shutdown` closes the queue; workers drain
///   what is buffered and exit on their own.
pub struct Pool<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// 「pool shut down」を一度だけログするためのフラグ
    shut_down: AtomicBool,
    concurrency: usize,
}

impl<T: Send + 'static> Pool<T> {
    /// Build and start a pool with an unbounded queue.
    ///
    /// # Panics
    /// If `concurrency` is zero or no tokio runtime is running. Use
    /// `PoolBuilder` to get these back as `BuildError`s.
    pub fn new<P: TaskProcessor<T>>(concurrency: usize, processor: P) -> Self {
        match PoolBuilder::new().concurrency(concurrency).build(processor) {
            Ok(pool) => pool,
            Err(err) => panic!("{err}"),
        }
    }

    /// `Pool::new` with a closure as the processor.
    ///
    /// # Panics
    /// Same as `Pool::new`.
    pub fn from_fn<F, Fut, E>(concurrency: usize, f: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        Self::new(concurrency, processor_fn(f))
    }

    pub(crate) fn start<P: TaskProcessor<T>>(
        name: String,
        concurrency: usize,
        queue_capacity: Option<usize>,
        processor: P,
        handle: &tokio::runtime::Handle,
    ) -> Self {
        let shared = Arc::new(Shared {
            name,
            queue: WorkQueue::new(queue_capacity),
            tracker: CompletionTracker::new(),
            live_workers: CompletionTracker::new(),
            counters: Counters::default(),
        });
        let workers = worker::spawn_workers(concurrency, &shared, Arc::new(processor), handle);

        tracing::info!(
            pool = %shared.name,
            concurrency,
            queue_capacity = ?queue_capacity,
            "pool started"
        );

        Self {
            shared,
            workers: Mutex::new(workers),
            shut_down: AtomicBool::new(false),
            concurrency,
        }
    }

    /// Dispatch one item, waiting for queue space if the queue is bounded and full.
    ///
    /// Fails with `PoolError::Closed` once `shutdown` has been called,
    /// including while this call is waiting for space. The item is dropped
    /// in that case.
    pub async fn submit(&self, item: T) -> Result<(), PoolError> {
        if self.shared.queue.is_closed() {
            return Err(PoolError::Closed);
        }

        // enqueue より先に tracker を増やす
        let job = Job {
            item,
            done: self.shared.tracker.enter(),
        };
        self.shared.counters.submitted();

        if let Err(err) = self.shared.queue.push(job).await {
            // 失敗した job は drop 済みなので tracker は戻っている
            self.shared.counters.retract_submitted();
            return Err(err);
        }
        Ok(())
    }

    /// Dispatch one item without waiting.
    ///
    /// Fails with `PoolError::QueueFull` when a bounded queue has no space,
    /// or `PoolError::Closed` after `shutdown`.
    pub fn try_submit(&self, item: T) -> Result<(), PoolError> {
        if self.shared.queue.is_closed() {
            return Err(PoolError::Closed);
        }

        let job = Job {
            item,
            done: self.shared.tracker.enter(),
        };
        self.shared.counters.submitted();

        if let Err(err) = self.shared.queue.try_push(job) {
            self.shared.counters.retract_submitted();
            return Err(err.into());
        }
        Ok(())
    }

    /// Close the queue, wait for every accepted item to be processed, then
    /// wait for every worker to exit.
    ///
    /// Safe to call more than once, concurrently, or again after a cancelled
    /// call: every call waits until the pool is fully drained. Once one call
    /// has completed, later calls return immediately.
    pub async fn shutdown(&self) {
        if self.shared.queue.close() {
            tracing::debug!(pool = %self.shared.name, "pool shutting down");
        }
        self.shared.tracker.wait().await;
        // 各ワーカーは終了時に live_workers を 1 減らす（panic しても Drop で減る）
        self.shared.live_workers.wait().await;

        // ワーカーは全て終了済みなので、ここでの await はすぐに返る
        let workers = std::mem::take(
            &mut *self
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for join in workers {
            if let Err(err) = join.await {
                tracing::error!(pool = %self.shared.name, error = %err, "worker ended abnormally");
            }
        }

        if !self.shut_down.swap(true, Ordering::AcqRel) {
            let counts = self.counts();
            tracing::info!(
                pool = %self.shared.name,
                submitted = counts.submitted,
                succeeded = counts.succeeded,
                failed = counts.failed,
                panicked = counts.panicked,
                "pool shut down"
            );
        }
    }

    /// Wait until every item accepted so far has been processed.
    /// The pool stays open.
    pub async fn wait_idle(&self) {
        self.shared.tracker.wait().await;
    }

    /// `true` once `shutdown` has been called (or the queue otherwise closed).
    pub fn is_closed(&self) -> bool {
        self.shared.queue.is_closed()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn queue_capacity(&self) -> Option<usize> {
        self.shared.queue.capacity()
    }

    pub fn counts(&self) -> PoolCounts {
        self.shared
            .counters
            .snapshot(self.shared.tracker.outstanding(), self.shared.queue.len())
    }
}

impl<T: Send + 'static> Drop for Pool<T> {
    fn drop(&mut self) {
        // shutdown されずに drop された場合でもワーカーが永遠に待たないように
        if self.shared.queue.close() {
            tracing::debug!(pool = %self.shared.name, "pool dropped without shutdown; workers will drain and exit");
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.shared.name)
            .field("concurrency", &self.concurrency)
            .field("counts", &self.counts())
            .finish()
    }
}
