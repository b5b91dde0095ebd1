//! Key-value document store abstraction.
//!
//! The [`DocumentStore`] trait is the only external dependency of the
//! publish/resolve pipeline. It models a networked key-value server with
//! JSON documents, plain strings, append-only lists, per-key expiry and
//! glob key enumeration, enabling pluggable backends (SQLite, in-memory).
//!
//! Every single-key write is atomic; no operation spans more than one key.
//! Implementations must be `Send + Sync` and safe to share across tasks.

pub mod memory;

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::path::JsonPath;

/// Abstract document store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`json_get`](DocumentStore::json_get) | Read a whole JSON document |
/// | [`json_get_path`](DocumentStore::json_get_path) | Server-side filtered read |
/// | [`json_set`](DocumentStore::json_set) | Overwrite a JSON document |
/// | [`get_string`](DocumentStore::get_string) | Read a string value |
/// | [`set_string`](DocumentStore::set_string) | Overwrite a string value |
/// | [`list_push`](DocumentStore::list_push) | Append to a list |
/// | [`list_range`](DocumentStore::list_range) | Read a whole list |
/// | [`expire`](DocumentStore::expire) | Set a time-to-live on a key |
/// | [`keys`](DocumentStore::keys) | Enumerate keys by glob pattern |
/// | [`delete`](DocumentStore::delete) | Remove a key |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Serialized JSON document at `key`, or `None` if absent or expired.
    async fn json_get(&self, key: &str) -> Result<Option<String>>;

    /// Structured read of the document at `key` filtered by `path`.
    ///
    /// The returned JSON is in the backend's native result shape and may be
    /// a singly-wrapped array. `None` means the document (or the path's
    /// array) does not exist. Backends without structured reads return an
    /// error; callers are expected to fall back to [`json_get`](DocumentStore::json_get).
    async fn json_get_path(&self, key: &str, path: &JsonPath) -> Result<Option<String>> {
        let _ = (key, path);
        anyhow::bail!("structured path reads are not supported by this store")
    }

    /// Store serialized JSON at `key`, replacing any value and clearing expiry.
    async fn json_set(&self, key: &str, json: &str) -> Result<()>;

    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store a string at `key`, replacing any value and clearing expiry.
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Append `item` to the list at `key`; returns the new length.
    async fn list_push(&self, key: &str, item: &str) -> Result<u64>;

    /// All list items in insertion order; empty if the key is absent.
    async fn list_range(&self, key: &str) -> Result<Vec<String>>;

    /// Expire `key` after `ttl`. Returns `false` if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Live keys matching a glob pattern (`*`, `?`, `[...]`), sorted.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Remove `key`. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// Compile a store glob pattern.
///
/// `*` crosses the `:` separator, as in common key-value servers.
pub fn compile_pattern(pattern: &str) -> Result<globset::GlobMatcher> {
    let glob = globset::GlobBuilder::new(pattern)
        .literal_separator(false)
        .backslash_escape(true)
        .build()
        .with_context(|| format!("invalid key pattern '{}'", pattern))?;
    Ok(glob.compile_matcher())
}
