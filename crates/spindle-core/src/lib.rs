//! spindle-core
//!
//! Bounded concurrent task pool with graceful shutdown.
//!
//! # モジュール構成
//! - **tracker**: CompletionTracker（未完了数 + wait）と CompletionGuard
//! - **queue**: WorkQueue（bounded / unbounded, close 後も drain 可能）
//! - **processor**: TaskProcessor trait（呼び出し側の処理を差し込む seam）
//! - **pool**: Pool ファサード, PoolBuilder, ワーカーループ
//! - **config**: PoolConfig（serde で読み込み可能な設定）
//! - **timeout**: 上限時間つきの関数呼び出し
//! - **observability**: PoolCounts
//! - **error**: エラー型
//!
//! # 使用例
//! ```ignore
//! let pool = Pool::from_fn(4, |url: String| async move { fetch(&url).await });
//! for url in urls {
//!     pool.submit(url).await?;
//! }
//! pool.shutdown().await;
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod pool;
pub mod processor;
pub mod queue;
pub mod timeout;
pub mod tracker;

pub use self::config::PoolConfig;
pub use self::error::{BuildError, InvokeError, PoolError, TrackerError};
pub use self::observability::PoolCounts;
pub use self::pool::{Pool, PoolBuilder};
pub use self::processor::{FnProcessor, TaskProcessor, processor_fn};
pub use self::queue::{TryPushError, WorkQueue};
pub use self::timeout::{Invocation, invoke_blocking_with_timeout, invoke_with_timeout};
pub use self::tracker::{CompletionGuard, CompletionTracker};
