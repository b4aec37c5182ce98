//! Expiring key/value store

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::item::Item;
use super::reaper::Reaper;
use super::ttl::Ttl;
use crate::config::CacheConfig;
use crate::error::CacheError;

type EvictionCallback<V> = Arc<dyn Fn(&str, V) + Send + Sync>;

/// Everything guarded by the cache lock
struct State<V> {
    items: HashMap<String, Item<V>>,
    on_evicted: Option<EvictionCallback<V>>,
}

impl<V> State<V> {
    fn live(&self, key: &str, now: DateTime<Utc>) -> Option<&Item<V>> {
        self.items.get(key).filter(|item| !item.is_expired_at(now))
    }
}

/// State shared between a cache handle and its cleanup task
pub(crate) struct Shared<V> {
    default_ttl: Ttl,
    state: RwLock<State<V>>,
}

impl<V> Shared<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(default_ttl: Ttl, items: HashMap<String, Item<V>>) -> Self {
        Self {
            default_ttl,
            state: RwLock::new(State {
                items,
                on_evicted: None,
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn insert(&self, key: &str, item: Item<V>) {
        self.state.write().items.insert(key.to_string(), item);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.state.read().items.len()
    }

    /// Remove every expired item, then notify the eviction callback for
    /// each of them once the lock has been released.
    pub(crate) fn delete_expired(&self) -> usize {
        let now = Utc::now();

        let (evicted, callback, remaining) = {
            let mut state = self.state.write();

            let expired: Vec<String> = state
                .items
                .iter()
                .filter(|(_, item)| item.is_expired_at(now))
                .map(|(key, _)| key.clone())
                .collect();

            let mut evicted = Vec::with_capacity(expired.len());
            for key in expired {
                if let Some(item) = state.items.remove(&key) {
                    evicted.push((key, item.value));
                }
            }

            (evicted, state.on_evicted.clone(), state.items.len())
        };

        let removed = evicted.len();
        metrics::gauge!("stash_cache_items").set(remaining as f64);

        if removed == 0 {
            return 0;
        }

        debug!("Removed {} expired cache items ({} remaining)", removed, remaining);
        metrics::counter!("stash_cache_expired_total").increment(removed as u64);

        if let Some(callback) = callback {
            for (key, value) in evicted {
                callback(&key, value);
            }
        }

        removed
    }
}

/// Thread-safe in-memory key/value cache with per-item expiration
///
/// Lookups take the shared side of a single reader/writer lock, every
/// mutation takes the exclusive side. The eviction callback always runs
/// after the lock is released, so it may freely call back into the cache.
///
/// When created with a non-zero cleanup interval a background task
/// periodically calls [`Cache::delete_expired`]. Call [`Cache::close`] to
/// stop it; dropping the cache only signals it.
pub struct Cache<V> {
    shared: Arc<Shared<V>>,
    reaper: Mutex<Option<Reaper>>,
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty cache
    ///
    /// A zero `cleanup_interval` disables the background cleanup task;
    /// expired items then stay in memory until deleted, flushed or swept
    /// by an explicit [`Cache::delete_expired`].
    ///
    /// # Errors
    ///
    /// Returns `CacheError::NoRuntime` if a cleanup task is requested
    /// outside of a tokio runtime.
    pub fn new(default_ttl: impl Into<Ttl>, cleanup_interval: Duration) -> Result<Self, CacheError> {
        Self::with_items(default_ttl, cleanup_interval, HashMap::new())
    }

    /// Create an empty cache from a configuration
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        Self::new(config.default_ttl, config.cleanup_interval())
    }

    /// Create a cache pre-populated with `items`
    ///
    /// Expired items are accepted and treated like any other expired item.
    pub fn with_items(
        default_ttl: impl Into<Ttl>,
        cleanup_interval: Duration,
        items: HashMap<String, Item<V>>,
    ) -> Result<Self, CacheError> {
        // A default of "use the default" has nothing to fall back on
        let default_ttl = match default_ttl.into() {
            Ttl::Default => Ttl::Never,
            ttl => ttl,
        };

        info!(
            "Initializing cache (default ttl: {}, cleanup interval: {:?}, items: {})",
            default_ttl,
            cleanup_interval,
            items.len()
        );

        let shared = Arc::new(Shared::new(default_ttl, items));

        let reaper = if cleanup_interval.is_zero() {
            None
        } else {
            Some(Reaper::spawn(Arc::downgrade(&shared), cleanup_interval)?)
        };

        Ok(Self {
            shared,
            reaper: Mutex::new(reaper),
        })
    }

    /// The TTL applied by writes that use `Ttl::Default`
    pub fn default_ttl(&self) -> Ttl {
        self.shared.default_ttl
    }

    /// Interval of the background cleanup task, if one is running
    pub fn cleanup_interval(&self) -> Option<Duration> {
        self.reaper.lock().as_ref().map(Reaper::interval)
    }

    fn make_item(&self, value: V, ttl: Ttl) -> Item<V> {
        Item::expiring(value, ttl.resolve(self.shared.default_ttl), Utc::now())
    }

    /// Store a value, replacing any existing item
    pub fn set(&self, key: impl Into<String>, value: V, ttl: impl Into<Ttl>) {
        let key = key.into();
        let item = self.make_item(value, ttl.into());
        debug!("Setting cache item: {} (expires: {:?})", key, item.expires_at);

        self.shared.state.write().items.insert(key, item);
    }

    /// Store a value with the cache's default TTL
    pub fn set_default(&self, key: impl Into<String>, value: V) {
        self.set(key, value, Ttl::Default);
    }

    /// Store a value only if no live item exists for the key
    pub fn add(&self, key: impl Into<String>, value: V, ttl: impl Into<Ttl>) -> Result<(), CacheError> {
        let key = key.into();
        let item = self.make_item(value, ttl.into());

        let mut state = self.shared.state.write();
        if state.live(&key, Utc::now()).is_some() {
            return Err(CacheError::KeyExists(key));
        }

        debug!("Adding cache item: {}", key);
        state.items.insert(key, item);
        Ok(())
    }

    /// Store a value only if a live item already exists for the key
    pub fn replace(&self, key: impl Into<String>, value: V, ttl: impl Into<Ttl>) -> Result<(), CacheError> {
        let key = key.into();
        let item = self.make_item(value, ttl.into());

        let mut state = self.shared.state.write();
        if state.live(&key, Utc::now()).is_none() {
            return Err(CacheError::KeyNotFound(key));
        }

        debug!("Replacing cache item: {}", key);
        state.items.insert(key, item);
        Ok(())
    }

    /// Get a live value
    pub fn get(&self, key: &str) -> Option<V> {
        let value = self
            .shared
            .state
            .read()
            .live(key, Utc::now())
            .map(|item| item.value.clone());

        record_lookup(value.is_some());
        value
    }

    /// Get a live value together with its deadline (`None` for items that never expire)
    pub fn get_with_expiration(&self, key: &str) -> Option<(V, Option<DateTime<Utc>>)> {
        let found = self
            .shared
            .state
            .read()
            .live(key, Utc::now())
            .map(|item| (item.value.clone(), item.expires_at));

        record_lookup(found.is_some());
        found
    }

    /// Remove an item, live or expired
    ///
    /// Returns `true` if the key was present. The eviction callback, if any,
    /// has run by the time this returns.
    pub fn delete(&self, key: &str) -> bool {
        let (removed, callback) = {
            let mut state = self.shared.state.write();
            (state.items.remove(key), state.on_evicted.clone())
        };

        let Some(item) = removed else {
            return false;
        };

        debug!("Deleted cache item: {}", key);
        metrics::counter!("stash_cache_evictions_total").increment(1);

        if let Some(callback) = callback {
            callback(key, item.value);
        }
        true
    }

    /// Remove all expired items, returning how many were removed
    pub fn delete_expired(&self) -> usize {
        self.shared.delete_expired()
    }

    /// Remove all items without notifying the eviction callback
    pub fn flush(&self) {
        let mut state = self.shared.state.write();
        let count = state.items.len();
        state.items = HashMap::new();
        debug!("Flushed {} cache items", count);
    }

    /// Number of stored items, including expired ones not yet removed
    pub fn item_count(&self) -> usize {
        self.shared.state.read().items.len()
    }

    /// Snapshot of all live items
    pub fn items(&self) -> HashMap<String, Item<V>> {
        let now = Utc::now();
        let state = self.shared.state.read();
        state
            .items
            .iter()
            .filter(|(_, item)| !item.is_expired_at(now))
            .map(|(key, item)| (key.clone(), item.clone()))
            .collect()
    }

    /// Snapshot of all live values
    pub fn objects(&self) -> HashMap<String, V> {
        let now = Utc::now();
        let state = self.shared.state.read();
        state
            .items
            .iter()
            .filter(|(_, item)| !item.is_expired_at(now))
            .map(|(key, item)| (key.clone(), item.value.clone()))
            .collect()
    }

    /// Install the function called with every item removed by `delete` or
    /// `delete_expired`. Replaces any previous callback.
    pub fn on_evicted<F>(&self, callback: F)
    where
        F: Fn(&str, V) + Send + Sync + 'static,
    {
        self.shared.state.write().on_evicted = Some(Arc::new(callback));
    }

    /// Stop the background cleanup task and wait for it to exit.
    ///
    /// Safe to call more than once. Without it the task is only signaled
    /// when the cache is dropped.
    pub async fn close(&self) {
        let reaper = self.reaper.lock().take();
        if let Some(reaper) = reaper {
            reaper.shutdown().await;
        }
    }
}

impl<V> Drop for Cache<V> {
    fn drop(&mut self) {
        if let Some(reaper) = self.reaper.get_mut().take() {
            reaper.stop();
        }
    }
}

fn record_lookup(hit: bool) {
    if hit {
        metrics::counter!("stash_cache_hits_total").increment(1);
    } else {
        metrics::counter!("stash_cache_misses_total").increment(1);
    }
}
