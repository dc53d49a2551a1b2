//! PoolBuilder - プールの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - build() 時に設定を検証し、不正なら BuildError を返す
//! - tokio ランタイムの外で build した場合も BuildError::NoRuntime

use tokio::runtime::Handle;

use super::Pool;
use crate::config::PoolConfig;
use crate::error::BuildError;
use crate::processor::TaskProcessor;

/// # 使用例
/// ```ignore
/// let pool = PoolBuilder::new()
///     .name("thumbnails")
///     .concurrency(4)
///     .queue_capacity(128)
///     .build(ResizeProcessor)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct PoolBuilder {
    config: PoolConfig,
}

impl PoolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing config (e.g. loaded from JSON).
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Bound the queue; `submit` waits while it is full.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = Some(capacity);
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.config.queue_capacity = None;
        self
    }

    /// Validate the config and start the workers on the current tokio runtime.
    pub fn build<T, P>(self, processor: P) -> Result<Pool<T>, BuildError>
    where
        T: Send + 'static,
        P: TaskProcessor<T>,
    {
        self.config.validate()?;
        let handle = Handle::try_current().map_err(|_| BuildError::NoRuntime)?;

        let PoolConfig {
            name,
            concurrency,
            queue_capacity,
        } = self.config;
        Ok(Pool::start(name, concurrency, queue_capacity, processor, &handle))
    }
}
