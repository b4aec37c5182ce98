//! Cache construction parameters
//!
//! Kept in the core crate so hosts can embed it in their own configuration
//! files and hand it straight to [`Cache::from_config`](crate::Cache::from_config).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::Ttl;

/// Configuration for a cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL applied by writes that don't specify one ("never", "30s", "5m", ...)
    #[serde(default = "default_ttl")]
    pub default_ttl: Ttl,
    /// Interval between background cleanups in milliseconds (0 = disabled)
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: default_ttl(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default TTL
    pub fn with_default_ttl(mut self, ttl: impl Into<Ttl>) -> Self {
        self.default_ttl = ttl.into();
        self
    }

    /// Sets the cleanup interval; `Duration::ZERO` disables the cleanup task
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval_ms = interval.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

fn default_ttl() -> Ttl {
    Ttl::from_secs(300) // 5 minutes
}

fn default_cleanup_interval_ms() -> u64 {
    60_000 // 1 minute
}
