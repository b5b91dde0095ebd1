//! Configuration parsing and validation.
//!
//! skycache is configured with a TOML file (default `config/skycache.toml`).
//! Every section is optional and falls back to the defaults below.
//!
//! ```toml
//! [store]
//! backend = "sqlite"              # "sqlite" | "memory"
//! path = "./data/skycache.sqlite"
//! max_connections = 5
//! busy_timeout_ms = 5000          # wait on a locked database before failing
//!
//! [keys]
//! prefix = "flights"
//!
//! [ttl]
//! canonical_secs = 3600           # 60 minutes
//! snapshot_secs = 172800          # 2 days
//! index_secs = 172800             # 2 days
//! query_secs = 1800               # 30 minutes
//!
//! [ingest]
//! interval_secs = 3000            # 50 minutes
//! endpoint = "http://api.aviationstack.com/v1/flights"
//! access_key = ""                 # or SKYCACHE_ACCESS_KEY
//! limit = 100
//! timeout_secs = 30
//!
//! [sink]
//! enabled = true
//!
//! [server]
//! bind = "127.0.0.1:8080"
//! api_key = ""                    # or SKYCACHE_API_KEY; empty disables the gate
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ACCESS_KEY_ENV: &str = "SKYCACHE_ACCESS_KEY";
pub const API_KEY_ENV: &str = "SKYCACHE_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub ttl: TtlConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./data/skycache.sqlite")
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct KeysConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

fn default_prefix() -> String {
    skycache_core::keys::DEFAULT_PREFIX.to_string()
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct TtlConfig {
    #[serde(default = "default_canonical_secs")]
    pub canonical_secs: u64,
    #[serde(default = "default_retention_secs")]
    pub snapshot_secs: u64,
    #[serde(default = "default_retention_secs")]
    pub index_secs: u64,
    #[serde(default = "default_query_secs")]
    pub query_secs: u64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            canonical_secs: default_canonical_secs(),
            snapshot_secs: default_retention_secs(),
            index_secs: default_retention_secs(),
            query_secs: default_query_secs(),
        }
    }
}

fn default_canonical_secs() -> u64 {
    60 * 60
}
fn default_retention_secs() -> u64 {
    2 * 24 * 60 * 60
}
fn default_query_secs() -> u64 {
    30 * 60
}

impl TtlConfig {
    pub fn canonical(&self) -> Duration {
        Duration::from_secs(self.canonical_secs)
    }

    pub fn snapshot(&self) -> Duration {
        Duration::from_secs(self.snapshot_secs)
    }

    pub fn index(&self) -> Duration {
        Duration::from_secs(self.index_secs)
    }

    pub fn query(&self) -> Duration {
        Duration::from_secs(self.query_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            endpoint: default_endpoint(),
            access_key: None,
            limit: default_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    50 * 60
}
fn default_endpoint() -> String {
    "http://api.aviationstack.com/v1/flights".to_string()
}
fn default_limit() -> u32 {
    100
}
fn default_timeout_secs() -> u64 {
    30
}

impl IngestConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Access key from the environment, falling back to the file.
    pub fn resolved_access_key(&self) -> Option<String> {
        std::env::var(ACCESS_KEY_ENV)
            .ok()
            .or_else(|| self.access_key.clone())
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SinkConfig {
    #[serde(default = "default_sink_enabled")]
    pub enabled: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            enabled: default_sink_enabled(),
        }
    }
}

fn default_sink_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_key: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl ServerConfig {
    /// API key from the environment, falling back to the file. `None` disables the gate.
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .or_else(|| self.api_key.clone())
            .filter(|k| !k.trim().is_empty())
    }
}

/// Parse configuration from TOML text and validate it.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.store.max_connections == 0 {
        bail!("store.max_connections must be > 0");
    }

    let prefix = &config.keys.prefix;
    if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
        bail!("keys.prefix must be non-empty and contain no whitespace");
    }

    let ttl = &config.ttl;
    for (name, secs) in [
        ("ttl.canonical_secs", ttl.canonical_secs),
        ("ttl.snapshot_secs", ttl.snapshot_secs),
        ("ttl.index_secs", ttl.index_secs),
        ("ttl.query_secs", ttl.query_secs),
    ] {
        if secs == 0 {
            bail!("{} must be > 0", name);
        }
    }
    if ttl.query_secs >= ttl.canonical_secs || ttl.query_secs >= ttl.snapshot_secs {
        bail!("ttl.query_secs must be shorter than ttl.canonical_secs and ttl.snapshot_secs");
    }

    if config.ingest.interval_secs == 0 {
        bail!("ingest.interval_secs must be > 0");
    }
    if config.ingest.timeout_secs == 0 {
        bail!("ingest.timeout_secs must be > 0");
    }

    Ok(())
}
