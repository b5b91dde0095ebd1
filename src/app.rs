//! Explicit wiring of the store, publisher, resolver and their collaborators.
//!
//! Every command and the HTTP server work from one [`App`] built from the
//! loaded [`Config`]. Nothing here is global; tests build an `App` around
//! an in-memory store with [`App::with_store`].

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::debug;

use skycache_core::filter::FlightFilter;
use skycache_core::keys::KeySpace;
use skycache_core::store::memory::InMemoryStore;
use skycache_core::store::DocumentStore;

use crate::config::{Config, StoreBackend};
use crate::db;
use crate::history::SnapshotHistory;
use crate::inspect::KeyAccess;
use crate::migrate;
use crate::publisher::{PublishTtls, SnapshotPublisher};
use crate::resolver::{QueryResolver, Resolution};
use crate::sink::{NullSink, PayloadSink, SinkWriter, SqliteSink};
use crate::sqlite_store::SqliteStore;
use crate::upstream::{AviationStackSource, FlightSource, StaticSource};

pub struct App {
    pub config: Arc<Config>,
    pub store: Arc<dyn DocumentStore>,
    pub publisher: Arc<SnapshotPublisher>,
    pub resolver: Arc<QueryResolver>,
    pub access: KeyAccess,
    pub history: SnapshotHistory,
    pub sink: Arc<SinkWriter>,
    pool: Option<SqlitePool>,
}

impl App {
    /// Open the configured backend (migrating SQLite on the way) and wire everything to it.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let needs_pool = config.store.backend == StoreBackend::Sqlite || config.sink.enabled;
        let pool = if needs_pool {
            let pool = db::connect(config).await?;
            migrate::migrate_pool(&pool).await?;
            Some(pool)
        } else {
            None
        };

        let store: Arc<dyn DocumentStore> = match (config.store.backend, &pool) {
            (StoreBackend::Sqlite, Some(pool)) => Arc::new(SqliteStore::new(pool.clone())),
            _ => Arc::new(InMemoryStore::new()),
        };
        let sink: Arc<dyn PayloadSink> = match (&pool, config.sink.enabled) {
            (Some(pool), true) => Arc::new(SqliteSink::new(pool.clone())),
            _ => Arc::new(NullSink),
        };
        debug!(backend = ?config.store.backend, sink = config.sink.enabled, "store opened");

        let mut app = Self::with_store(config.clone(), store, sink);
        app.pool = pool;
        Ok(app)
    }

    /// Wire an `App` around an already-open store.
    pub fn with_store(
        config: Config,
        store: Arc<dyn DocumentStore>,
        sink: Arc<dyn PayloadSink>,
    ) -> Self {
        let keys = KeySpace::new(config.keys.prefix.clone());
        let publisher = SnapshotPublisher::new(
            store.clone(),
            keys.clone(),
            PublishTtls::from(&config.ttl),
        );
        let resolver = QueryResolver::new(store.clone(), keys.clone(), config.ttl.query());
        Self {
            access: KeyAccess::new(store.clone()),
            history: SnapshotHistory::new(store.clone(), keys),
            publisher: Arc::new(publisher),
            resolver: Arc::new(resolver),
            store,
            sink: Arc::new(SinkWriter::new(sink)),
            config: Arc::new(config),
            pool: None,
        }
    }

    /// The upstream source: a dataset file when `from` is given, otherwise the configured API.
    pub fn source(&self, from: Option<&Path>) -> Result<Arc<dyn FlightSource>> {
        Ok(match from {
            Some(path) => Arc::new(StaticSource::from_file(path)?),
            None => Arc::new(AviationStackSource::new(&self.config.ingest)?),
        })
    }

    pub async fn query(&self, airline: Option<&str>, airport: Option<&str>) -> Resolution {
        self.resolver
            .resolve(&FlightFilter::new(airline, airport))
            .await
    }

    /// Wait for pending sink writes, then close the SQLite pool if one is open.
    pub async fn close(&self) {
        self.sink.drain().await;
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
