use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::{Duration, sleep};
use tracing_subscriber::EnvFilter;

use spindle_core::{PoolBuilder, PoolConfig, TaskProcessor, invoke_with_timeout};

#[derive(Debug, Deserialize)]
struct HelloPayload {
    name: String,
}

/// 最初の n 件はわざと失敗する
struct HelloProcessor {
    remaining_failures: AtomicU32,
}

impl HelloProcessor {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl TaskProcessor<Vec<u8>> for HelloProcessor {
    type Error = String;

    async fn process(&self, payload: Vec<u8>) -> Result<(), String> {
        let p: HelloPayload =
            serde_json::from_slice(&payload).map_err(|e| format!("json decode: {e}"))?;

        let left = self
            .remaining_failures
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        if let Ok(left) = left {
            return Err(format!("intentional failure (left={left})"));
        }

        let jitter = rand::thread_rng().gen_range(1..20);
        sleep(Duration::from_millis(jitter)).await;
        tracing::info!(name = %p.name, "hello");
        Ok(())
    }
}

fn load_config() -> Result<PoolConfig, Box<dyn std::error::Error>> {
    // 引数で JSON ファイルを渡せば、それを設定として使う
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)?;
            Ok(PoolConfig::from_json_str(&json)?)
        }
        None => Ok(PoolConfig {
            name: "hello".to_string(),
            concurrency: 4,
            queue_capacity: Some(8),
        }),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // (A) 設定を読み込んでプールを起動
    let config = load_config()?;
    let pool = PoolBuilder::new()
        .config(config)
        .build(HelloProcessor::new(2))?;

    // (B) タスク投入（満杯なら submit が待つ）
    for i in 0..20 {
        let payload = serde_json::to_vec(&serde_json::json!({ "name": format!("weft-{i}") }))?;
        pool.submit(payload).await?;
    }
    pool.submit(b"not json".to_vec()).await?;

    // (C) graceful shutdown: 投入済みのタスクを全て処理してから戻る
    pool.shutdown().await;
    println!("counts: {}", serde_json::to_string(&pool.counts())?);

    // shutdown 後の submit は Closed
    if let Err(err) = pool.submit(Vec::new()).await {
        println!("submit after shutdown: {err}");
    }

    // (D) 上限時間つき呼び出し
    let fast = invoke_with_timeout(
        || async {
            sleep(Duration::from_millis(10)).await;
            "fast answer"
        },
        Duration::from_millis(50),
    )
    .await;
    println!("fast: {fast:?}");

    let slow = invoke_with_timeout(
        || async {
            sleep(Duration::from_millis(50)).await;
            "slow answer"
        },
        Duration::from_millis(10),
    )
    .await;
    println!("slow: {slow:?} (timed_out={})", slow.timed_out());

    Ok(())
}
