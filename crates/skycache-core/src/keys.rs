//! Store key naming.
//!
//! | Key | Template |
//! |-----|----------|
//! | canonical | `{prefix}:last` |
//! | snapshot | `{prefix}:snapshot:{%Y%m%dT%H%M%SZ}` |
//! | daily index | `{prefix}:index:{%Y-%m-%d}` |
//! | version | `{prefix}:version` |
//! | query cache | `{prefix}:q:{airline}:{airport}:{version}:{fingerprint}` |
//!
//! Absent filter values appear as `_` in query keys. All timestamps are UTC.

use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};

use crate::filter::FlightFilter;

pub const DEFAULT_PREFIX: &str = "flights";

/// Version used when no version marker has been published yet.
pub const VERSION_SENTINEL: &str = "0";

/// Stands in for an absent filter value.
pub const PLACEHOLDER: &str = "_";

const FINGERPRINT_LEN: usize = 16;

/// Key builder for one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn canonical(&self) -> String {
        format!("{}:last", self.prefix)
    }

    pub fn version(&self) -> String {
        format!("{}:version", self.prefix)
    }

    pub fn snapshot(&self, at: DateTime<Utc>) -> String {
        format!("{}:snapshot:{}", self.prefix, at.format("%Y%m%dT%H%M%SZ"))
    }

    pub fn index(&self, date: NaiveDate) -> String {
        format!("{}:index:{}", self.prefix, date.format("%Y-%m-%d"))
    }

    pub fn index_at(&self, at: DateTime<Utc>) -> String {
        self.index(at.date_naive())
    }

    pub fn query(&self, filter: &FlightFilter, version: &str) -> String {
        format!(
            "{}:q:{}:{}:{}:{}",
            self.prefix,
            filter.airline().unwrap_or(PLACEHOLDER),
            filter.airport().unwrap_or(PLACEHOLDER),
            version,
            fingerprint(filter)
        )
    }

    /// Glob matching every query cache key under this prefix.
    pub fn query_pattern(&self) -> String {
        format!("{}:q:*", self.prefix)
    }

    /// Extract the version segment of a query cache key.
    ///
    /// Filter codes may themselves contain `:`, so the version and
    /// fingerprint are taken from the right.
    pub fn query_key_version<'a>(&self, key: &'a str) -> Option<&'a str> {
        let rest = key.strip_prefix(&self.prefix)?.strip_prefix(":q:")?;
        let mut tail = rest.rsplitn(3, ':');
        let fp = tail.next()?;
        let version = tail.next()?;
        let codes = tail.next()?;
        if fp.len() != FINGERPRINT_LEN || version.is_empty() || !codes.contains(':') {
            return None;
        }
        Some(version)
    }
}

/// Version token for a publish at `at`: UNIX seconds.
pub fn version_token(at: DateTime<Utc>) -> String {
    at.timestamp().to_string()
}

/// Fixed-length digest of the canonicalized filter pair.
pub fn fingerprint(filter: &FlightFilter) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"airline=");
    hasher.update(filter.airline().unwrap_or(PLACEHOLDER).as_bytes());
    hasher.update(b"|airport=");
    hasher.update(filter.airport().unwrap_or(PLACEHOLDER).as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..FINGERPRINT_LEN].to_string()
}
