//! # skycache
//!
//! Periodic flight data ingestion with versioned snapshots and
//! version-scoped caching of filtered queries.
//!
//! Each ingestion cycle publishes the fetched dataset as the canonical
//! document, an immutable timestamped snapshot, and an entry in a daily
//! index, then bumps a version token. Filtered queries are cached under
//! keys that embed the version token, so a new publish retires every
//! earlier cached result without explicit invalidation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌──────────────────┐
//! │ Flights API  │──▶│  Publisher  │──▶│  Document store   │
//! │  (reqwest)   │   │ last/snap/  │   │ SQLite or memory  │
//! └──────┬───────┘   │ index/ver   │   └────────┬─────────┘
//!        │           └─────────────┘            │
//!        ▼                                      ▼
//! ┌──────────────┐                       ┌──────────────┐
//! │ raw_payloads │                       │   Resolver   │──▶ CLI / HTTP
//! │    (sink)    │                       │ cache→path→doc│
//! └──────────────┘                       └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! skycache init                          # create database
//! skycache ingest --from ./flights.json  # publish one snapshot from a file
//! skycache query --airline MU            # filtered read, cached per version
//! skycache serve                         # scheduler + HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite-backed document store |
//! | [`publisher`] | Snapshot publishing |
//! | [`resolver`] | Filtered query resolution and caching |
//! | [`inspect`] | Raw key access |
//! | [`history`] | Snapshot index reads |
//! | [`upstream`] | Flight data sources |
//! | [`sink`] | Raw payload archive |
//! | [`ingest`] | Ingestion cycle and scheduler |
//! | [`app`] | Component wiring |
//! | [`server`] | HTTP API |

pub mod app;
pub mod config;
pub mod db;
pub mod history;
pub mod ingest;
pub mod inspect;
pub mod migrate;
pub mod publisher;
pub mod resolver;
pub mod server;
pub mod sink;
pub mod sqlite_store;
pub mod upstream;

pub use skycache_core::{filter, keys, models, normalize, path, store};
