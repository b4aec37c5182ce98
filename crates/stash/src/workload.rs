//! Synthetic load driven against a cache

use rand::Rng;
use stash_core::{Cache, CacheError, Ttl};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WorkloadConfig;

/// Operation counters shared by all workload tasks
#[derive(Debug, Default)]
pub struct WorkloadStats {
    pub sets: AtomicU64,
    pub adds: AtomicU64,
    pub add_conflicts: AtomicU64,
    pub replaces: AtomicU64,
    pub replace_misses: AtomicU64,
    pub deletes: AtomicU64,
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
}

impl WorkloadStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Log a one-line summary of the counters
    pub fn log_summary(&self) {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        info!(
            "Workload totals: {} sets, {} adds ({} conflicts), {} replaces ({} misses), {} deletes, {} hits, {} misses, {} evictions",
            load(&self.sets),
            load(&self.adds),
            load(&self.add_conflicts),
            load(&self.replaces),
            load(&self.replace_misses),
            load(&self.deletes),
            load(&self.hits),
            load(&self.misses),
            load(&self.evictions),
        );
    }
}

enum WriteOp {
    Set,
    Add,
    Replace,
    Delete,
}

fn random_key(key_space: usize) -> String {
    format!("key-{}", rand::thread_rng().gen_range(0..key_space))
}

fn random_write(key_space: usize) -> (String, WriteOp) {
    let mut rng = rand::thread_rng();
    let op = match rng.gen_range(0..100) {
        0..60 => WriteOp::Set,
        60..75 => WriteOp::Add,
        75..90 => WriteOp::Replace,
        _ => WriteOp::Delete,
    };
    (format!("key-{}", rng.gen_range(0..key_space)), op)
}

async fn writer(
    id: usize,
    cache: Arc<Cache<String>>,
    stats: Arc<WorkloadStats>,
    config: WorkloadConfig,
    token: CancellationToken,
) {
    let delay = Duration::from_millis(config.op_delay_ms);
    let mut seq = 0u64;

    while !token.is_cancelled() {
        let (key, op) = random_write(config.key_space);
        let value = format!("writer-{}:{}", id, seq);
        seq += 1;

        match op {
            WriteOp::Set => {
                cache.set_default(key, value);
                WorkloadStats::bump(&stats.sets);
            }
            WriteOp::Add => match cache.add(key, value, Ttl::Default) {
                Ok(()) => WorkloadStats::bump(&stats.adds),
                Err(CacheError::KeyExists(_)) => WorkloadStats::bump(&stats.add_conflicts),
                Err(e) => debug!("Unexpected add failure: {}", e),
            },
            WriteOp::Replace => match cache.replace(key, value, Ttl::Default) {
                Ok(()) => WorkloadStats::bump(&stats.replaces),
                Err(CacheError::KeyNotFound(_)) => WorkloadStats::bump(&stats.replace_misses),
                Err(e) => debug!("Unexpected replace failure: {}", e),
            },
            WriteOp::Delete => {
                if cache.delete(&key) {
                    WorkloadStats::bump(&stats.deletes);
                }
            }
        }

        pause(delay, &token).await;
    }

    debug!("Writer {} stopped after {} operations", id, seq);
}

async fn reader(
    cache: Arc<Cache<String>>,
    stats: Arc<WorkloadStats>,
    config: WorkloadConfig,
    token: CancellationToken,
) {
    let delay = Duration::from_millis(config.op_delay_ms);

    while !token.is_cancelled() {
        let key = random_key(config.key_space);
        match cache.get(&key) {
            Some(_) => WorkloadStats::bump(&stats.hits),
            None => WorkloadStats::bump(&stats.misses),
        }

        pause(delay, &token).await;
    }
}

async fn reporter(cache: Arc<Cache<String>>, every: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                info!(
                    "Cache holds {} items ({} live)",
                    cache.item_count(),
                    cache.objects().len()
                );
            }
        }
    }
}

async fn pause(delay: Duration, token: &CancellationToken) {
    if delay.is_zero() {
        tokio::task::yield_now().await;
        return;
    }
    tokio::select! {
        _ = token.cancelled() => {}
        _ = tokio::time::sleep(delay) => {}
    }
}

/// Run the workload until `token` is cancelled
pub async fn run(
    cache: Arc<Cache<String>>,
    stats: Arc<WorkloadStats>,
    config: &WorkloadConfig,
    token: CancellationToken,
) {
    info!(
        "Starting workload ({} writers, {} readers, {} keys)",
        config.writers, config.readers, config.key_space
    );

    let mut tasks = JoinSet::new();

    for id in 0..config.writers {
        tasks.spawn(writer(id, cache.clone(), stats.clone(), config.clone(), token.clone()));
    }
    for _ in 0..config.readers {
        tasks.spawn(reader(cache.clone(), stats.clone(), config.clone(), token.clone()));
    }
    tasks.spawn(reporter(
        cache.clone(),
        Duration::from_secs(config.report_interval_secs),
        token.clone(),
    ));

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            warn!("Workload task failed: {}", e);
        }
    }

    info!("Workload finished");
}
