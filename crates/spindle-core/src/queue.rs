//! WorkQueue - ワーカー間で共有する FIFO キュー
//!
//! # 学習ポイント
//! - Mutex<VecDeque> + Notify による async な blocking pop
//! - Semaphore で容量を表現（満杯なら push が待つ = backpressure）
//! - close 後もバッファ内の要素は drain できる
//!
//! Mutex は std のものを使う（ロックを跨いで await しない）。

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::{Notify, Semaphore, TryAcquireError};

use crate::error::PoolError;

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// FIFO queue with optional bounded capacity and close/drain semantics.
///
/// - Every pushed item is popped by exactly one consumer.
/// - After `close`, pushes fail but buffered items can still be popped.
/// - `pop` returns `None` only when the queue is closed *and* empty.
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    /// push / close 時の通知用
    available: Notify,
    /// 空きスロット（bounded の場合のみ）
    slots: Option<Semaphore>,
    capacity: Option<usize>,
}

/// Returned by `WorkQueue::try_push`; hands the item back.
#[derive(Debug, PartialEq, Eq)]
pub enum TryPushError<T> {
    Full(T),
    Closed(T),
}

impl<T> TryPushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            TryPushError::Full(item) | TryPushError::Closed(item) => item,
        }
    }
}

impl<T> From<TryPushError<T>> for PoolError {
    fn from(err: TryPushError<T>) -> Self {
        match err {
            TryPushError::Full(_) => PoolError::QueueFull,
            TryPushError::Closed(_) => PoolError::Closed,
        }
    }
}

impl<T> WorkQueue<T> {
    /// `None` means unbounded.
    ///
    /// # Panics
    /// If `capacity` is `Some(0)`: such a queue could never accept an item.
    /// `PoolConfig::validate` reports the same case as `BuildError::ZeroCapacity`.
    pub fn new(capacity: Option<usize>) -> Self {
        assert!(capacity != Some(0), "bounded queue capacity must be at least 1");
        let capacity = capacity.map(|c| c.min(Semaphore::MAX_PERMITS));
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Notify::new(),
            slots: capacity.map(Semaphore::new),
            capacity,
        }
    }

    /// # Panics
    /// If `capacity` is zero.
    pub fn bounded(capacity: usize) -> Self {
        Self::new(Some(capacity))
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item, waiting for a free slot if the queue is full.
    ///
    /// Fails with `PoolError::Closed` if the queue is closed before or while
    /// waiting. Cancel-safe: dropping the future before it resolves leaves
    /// the queue unchanged.
    pub async fn push(&self, item: T) -> Result<(), PoolError> {
        if let Some(slots) = &self.slots {
            let permit = slots.acquire().await.map_err(|_| PoolError::Closed)?;
            permit.forget();
        }
        self.enqueue(item).map_err(|_| PoolError::Closed)
    }

    /// Append an item without waiting.
    pub fn try_push(&self, item: T) -> Result<(), TryPushError<T>> {
        if let Some(slots) = &self.slots {
            match slots.try_acquire() {
                Ok(permit) => permit.forget(),
                Err(TryAcquireError::Closed) => return Err(TryPushError::Closed(item)),
                Err(TryAcquireError::NoPermits) => return Err(TryPushError::Full(item)),
            }
        }
        self.enqueue(item).map_err(TryPushError::Closed)
    }

    /// Caller already holds a slot (bounded case).
    fn enqueue(&self, item: T) -> Result<(), T> {
        let mut state = self.lock();
        if state.closed {
            drop(state);
            self.release_slot();
            return Err(item);
        }
        state.items.push_back(item);
        drop(state);

        // 待機中のワーカーを 1 つ起こす
        self.available.notify_one();
        Ok(())
    }

    fn release_slot(&self) {
        if let Some(slots) = &self.slots {
            slots.add_permits(1);
        }
    }

    /// Take the oldest item, waiting while the queue is empty and open.
    /// Returns `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            // 状態を見る前に登録しておかないと、close の notify_waiters を取りこぼす
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    let more = !state.items.is_empty();
                    drop(state);

                    self.release_slot();
                    if more {
                        self.available.notify_one();
                    }
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Close the queue. Returns `true` only for the call that closed it.
    ///
    /// Wakes every waiting consumer and fails every waiting producer.
    pub fn close(&self) -> bool {
        {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
        }
        if let Some(slots) = &self.slots {
            slots.close();
        }
        self.available.notify_waiters();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// `None` for an unbounded queue.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn pops_in_fifo_order() {
        let queue = WorkQueue::unbounded();
        for i in 0..5 {
            queue.push(i).await.unwrap();
        }
        for i in 0..5 {
            assert_eq!(queue.pop().await, Some(i));
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn close_still_drains_buffered_items() {
        let queue = WorkQueue::unbounded();
        queue.push("a").await.unwrap();
        queue.push("b").await.unwrap();

        assert!(queue.close());
        assert!(!queue.close());
        assert_eq!(queue.push("c").await, Err(PoolError::Closed));

        assert_eq!(queue.pop().await, Some("a"));
        assert_eq!(queue.pop().await, Some("b"));
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn close_wakes_waiting_consumers() {
        let queue = Arc::new(WorkQueue::<u32>::unbounded());
        let mut poppers = Vec::new();
        for _ in 0..3 {
            let queue = Arc::clone(&queue);
            poppers.push(tokio::spawn(async move { queue.pop().await }));
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        for p in poppers {
            let popped = tokio::time::timeout(Duration::from_secs(1), p)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(popped, None);
        }
    }

    #[tokio::test]
    async fn push_wakes_pop() {
        let queue = Arc::new(WorkQueue::unbounded());
        let pop = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move { queue.pop().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(7u32).await.unwrap();

        let popped = tokio::time::timeout(Duration::from_secs(1), pop)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(popped, Some(7));
    }

    #[tokio::test]
    async fn bounded_push_waits_for_space() {
        let queue = Arc::new(WorkQueue::bounded(2));
        queue.push(1).await.unwrap();
        queue.push(2).await.unwrap();

        let pusher = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move { queue.push(3).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pusher.is_finished());
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.pop().await, Some(1));
        tokio::time::timeout(Duration::from_secs(1), pusher)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn waiting_push_fails_when_closed() {
        let queue = Arc::new(WorkQueue::bounded(1));
        queue.push(1).await.unwrap();

        let pusher = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move { queue.push(2).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        let result = tokio::time::timeout(Duration::from_secs(1), pusher)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(PoolError::Closed));
        assert_eq!(queue.pop().await, Some(1));
        assert_eq!(queue.pop().await, None);
    }

    #[test]
    #[should_panic(expected = "capacity must be at least 1")]
    fn zero_capacity_is_rejected() {
        let _ = WorkQueue::<u32>::bounded(0);
    }

    #[test]
    fn try_push_reports_full_and_closed() {
        let queue = WorkQueue::bounded(1);
        assert!(queue.try_push("a").is_ok());
        assert_eq!(queue.try_push("b"), Err(TryPushError::Full("b")));

        queue.close();
        assert_eq!(queue.try_push("c"), Err(TryPushError::Closed("c")));
        assert_eq!(PoolError::from(TryPushError::Full(())), PoolError::QueueFull);
        assert_eq!(TryPushError::Closed(5).into_inner(), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn each_item_popped_exactly_once() {
        let queue = Arc::new(WorkQueue::bounded(16));
        let mut consumers = Vec::new();
        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            consumers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(item) = queue.pop().await {
                    seen.push(item);
                }
                seen
            }));
        }

        for i in 0..1000u32 {
            queue.push(i).await.unwrap();
        }
        queue.close();

        let mut all = Vec::new();
        for c in consumers {
            all.extend(c.await.unwrap());
        }
        assert_eq!(all.len(), 1000);
        let unique: HashSet<_> = all.into_iter().collect();
        assert_eq!(unique.len(), 1000);
    }
}
