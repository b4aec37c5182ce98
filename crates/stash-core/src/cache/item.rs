//! Cache items and their expiration deadline

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A stored value with its expiration deadline
///
/// `expires_at == None` means the item never expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item<V> {
    pub value: V,
    pub expires_at: Option<DateTime<Utc>>,
}

impl<V> Item<V> {
    pub fn new(value: V, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { value, expires_at }
    }

    /// Build an item that lives for `ttl` starting at `now`.
    ///
    /// Lifetimes too large to represent are treated as never expiring.
    pub(crate) fn expiring(value: V, ttl: Option<Duration>, now: DateTime<Utc>) -> Self {
        let expires_at = ttl
            .and_then(|d| TimeDelta::from_std(d).ok())
            .and_then(|d| now.checked_add_signed(d));
        Self { value, expires_at }
    }

    /// An item is live up to and including its deadline
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(deadline) if now > deadline)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
