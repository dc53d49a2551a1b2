//! PoolConfig - プールの設定
//!
//! JSON などから読み込めるように serde で (de)serialize する。
//! 欠けているフィールドはデフォルト値で埋める。

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::error::BuildError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Used as the `pool` field in log events.
    pub name: String,

    /// Number of workers (upper bound on simultaneous processor calls).
    pub concurrency: usize,

    /// `None` means unbounded.
    pub queue_capacity: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "pool".to_string(),
            concurrency: default_concurrency(),
            queue_capacity: None,
        }
    }
}

/// One worker per available core, falling back to 1.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

impl PoolConfig {
    pub fn from_json_str(json: &str) -> Result<Self, BuildError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| BuildError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BuildError> {
        if self.concurrency == 0 {
            return Err(BuildError::ZeroConcurrency);
        }
        if self.queue_capacity == Some(0) {
            return Err(BuildError::ZeroCapacity);
        }
        Ok(())
    }
}
