//! Time-to-live settings for cache writes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Error type for parsing a TTL
#[derive(Debug, Clone)]
pub struct ParseTtlError(String);

impl fmt::Display for ParseTtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid TTL: {}", self.0)
    }
}

impl std::error::Error for ParseTtlError {}

/// Lifetime of a cache item
///
/// Parsed from strings such as `"never"`, `"default"`, `"500us"`, `"250ms"`,
/// `"30s"`, `"5m"` or `"1h"`. A bare number is read as seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Ttl {
    /// Expire once the duration has elapsed. A zero duration never expires.
    After(Duration),
    /// Never expire; only removed by `delete` or `flush`
    Never,
    /// Use whatever default the cache was created with
    #[default]
    Default,
}

impl Ttl {
    pub const fn from_secs(secs: u64) -> Self {
        Ttl::After(Duration::from_secs(secs))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Ttl::After(Duration::from_millis(millis))
    }

    /// Resolve against a cache default. `None` means the item never expires.
    pub(crate) fn resolve(self, default: Ttl) -> Option<Duration> {
        let ttl = match self {
            Ttl::Default => default,
            other => other,
        };

        match ttl {
            Ttl::After(d) if !d.is_zero() => Some(d),
            _ => None,
        }
    }
}

impl From<Duration> for Ttl {
    fn from(d: Duration) -> Self {
        Ttl::After(d)
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ttl::Never => f.write_str("never"),
            Ttl::Default => f.write_str("default"),
            Ttl::After(d) if d.subsec_nanos() == 0 => write!(f, "{}s", d.as_secs()),
            Ttl::After(d) if d.subsec_nanos() % 1_000_000 == 0 => write!(f, "{}ms", d.as_millis()),
            Ttl::After(d) if d.subsec_nanos() % 1_000 == 0 => write!(f, "{}us", d.as_micros()),
            Ttl::After(d) => write!(f, "{}ns", d.as_nanos()),
        }
    }
}

impl FromStr for Ttl {
    type Err = ParseTtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "never" => return Ok(Ttl::Never),
            "default" => return Ok(Ttl::Default),
            _ => {}
        }

        // Two-letter suffixes end in 's', so they are checked first
        let (digits, unit_nanos): (&str, u128) = if let Some(n) = s.strip_suffix("ns") {
            (n, 1)
        } else if let Some(n) = s.strip_suffix("us").or_else(|| s.strip_suffix("µs")) {
            (n, 1_000)
        } else if let Some(n) = s.strip_suffix("ms") {
            (n, 1_000_000)
        } else if let Some(n) = s.strip_suffix('h') {
            (n, 3_600 * NANOS_PER_SEC)
        } else if let Some(n) = s.strip_suffix('m') {
            (n, 60 * NANOS_PER_SEC)
        } else if let Some(n) = s.strip_suffix('s') {
            (n, NANOS_PER_SEC)
        } else {
            (s.as_str(), NANOS_PER_SEC)
        };

        let amount: u128 = digits
            .trim()
            .parse()
            .map_err(|_| ParseTtlError(s.clone()))?;
        let nanos = amount
            .checked_mul(unit_nanos)
            .ok_or_else(|| ParseTtlError(s.clone()))?;
        let secs = u64::try_from(nanos / NANOS_PER_SEC).map_err(|_| ParseTtlError(s.clone()))?;

        Ok(Ttl::After(Duration::new(secs, (nanos % NANOS_PER_SEC) as u32)))
    }
}

impl TryFrom<String> for Ttl {
    type Error = ParseTtlError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ttl> for String {
    fn from(ttl: Ttl) -> Self {
        ttl.to_string()
    }
}
