//! Stash - soak driver for the in-process expiring cache

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod workload;

use config::Config;
use stash_core::Cache;
use workload::WorkloadStats;

/// Stash - drive a synthetic workload against an expiring in-memory cache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Seconds to run before shutting down (0 = until Ctrl+C)
    #[arg(short, long, env = "STASH_DURATION_SECS")]
    duration_secs: Option<u64>,

    /// Log level, overrides the configuration file
    #[arg(long, env = "STASH_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(&args.config)?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Some(secs) = args.duration_secs {
        config.workload.duration_secs = secs;
    }

    // Initialize logging
    init_logging(&config.logging.level, &config.logging.format);

    info!("Starting Stash v{}", env!("CARGO_PKG_VERSION"));

    // Record cache metrics in-process
    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")?;

    // Initialize cache
    let cache: Arc<Cache<String>> =
        Arc::new(Cache::from_config(&config.cache).context("Failed to create cache")?);

    let stats = Arc::new(WorkloadStats::default());
    {
        let stats = stats.clone();
        cache.on_evicted(move |key, value| {
            debug!("Evicted {} ({})", key, value);
            stats.evictions.fetch_add(1, Ordering::Relaxed);
        });
    }

    // Stop on Ctrl+C or once the configured duration has elapsed
    let token = CancellationToken::new();
    tokio::spawn(shutdown_signal(
        token.clone(),
        config.workload.duration_secs,
    ));

    workload::run(cache.clone(), stats.clone(), &config.workload, token).await;

    // Stop the cleanup task before reporting
    cache.close().await;
    let swept = cache.delete_expired();
    info!(
        "Final sweep removed {} items, {} remain",
        swept,
        cache.item_count()
    );

    stats.log_summary();
    info!("Metrics snapshot:\n{}", metrics.render());

    info!("Stash stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for Ctrl+C or the run deadline, then cancel the workload
async fn shutdown_signal(token: CancellationToken, duration_secs: u64) {
    let deadline = async {
        if duration_secs == 0 {
            std::future::pending::<()>().await;
        } else {
            tokio::time::sleep(Duration::from_secs(duration_secs)).await;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.expect("Failed to install CTRL+C handler");
            info!("Shutdown signal received");
        }
        _ = deadline => info!("Run duration elapsed"),
    }

    token.cancel();
}
