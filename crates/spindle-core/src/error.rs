use thiserror::Error;

/// Errors returned to a producer by `Pool::submit` / `Pool::try_submit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("pool closed")]
    Closed,

    #[error("queue full")]
    QueueFull,
}

/// BuildError は Pool 構築時のエラー（Fail-fast）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("bounded queue capacity must be at least 1 (use an unbounded queue instead)")]
    ZeroCapacity,

    #[error("pool must be built inside a tokio runtime")]
    NoRuntime,

    #[error("invalid pool config: {0}")]
    InvalidConfig(String),
}

/// Misuse of a `CompletionTracker`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("completion tracker count would go negative (current={current}, delta={delta})")]
    NegativeCount { current: usize, delta: isize },
}

/// Returned by `Invocation::into_result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("invocation timed out")]
    TimedOut,

    #[error("invocation ended without producing a result")]
    Aborted,
}
