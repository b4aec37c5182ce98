//! Stash Core
//!
//! An in-process key/value cache where every item may carry its own
//! time-to-live. Expired items are hidden from reads immediately and
//! reclaimed either on demand or by an optional background task.

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{Cache, Item, ParseTtlError, Ttl};
pub use config::CacheConfig;
pub use error::CacheError;
