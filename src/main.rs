//! # skycache CLI
//!
//! ## Usage
//!
//! ```bash
//! skycache --config ./config/skycache.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `skycache init` | Create the SQLite database and run schema migrations |
//! | `skycache ingest` | Run one fetch-and-publish cycle |
//! | `skycache serve` | Run the ingestion scheduler and the HTTP API |
//! | `skycache query` | Resolve a filtered query against the current snapshot |
//! | `skycache get <key>` | Print the raw value at a key |
//! | `skycache set <key> <json>` | Store a JSON document at a key |
//! | `skycache keys [pattern]` | List keys matching a glob pattern |
//! | `skycache snapshots` | List snapshot keys indexed for a date |
//! | `skycache sweep` | Delete cached query results from older versions |
//!
//! Logging is controlled with `RUST_LOG` (default `skycache=info`) and
//! written to stderr, so command output on stdout stays pipeable.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use skycache::app::App;
use skycache::config::{self, Config};
use skycache::ingest;
use skycache::migrate;
use skycache::resolver::Resolution;
use skycache::server;

/// Versioned flight snapshots with version-scoped query caching.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/skycache.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "skycache", version)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "./config/skycache.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Run a single ingestion cycle and publish the result.
    Ingest {
        /// Read the dataset from a JSON file instead of the flights API.
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Run the ingestion scheduler and HTTP server until Ctrl-C.
    Serve {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,

        /// Serve HTTP only, without the ingestion scheduler.
        #[arg(long)]
        no_ingest: bool,
    },

    /// Resolve a filtered query and print the matching records.
    ///
    /// Filters are OR-combined: a record matches if its airline matches or
    /// either endpoint airport matches.
    Query {
        /// Airline IATA code.
        #[arg(long)]
        airline: Option<String>,

        /// Airport IATA code (departure or arrival).
        #[arg(long)]
        airport: Option<String>,
    },

    /// Print the raw value stored at a key.
    Get { key: String },

    /// Store a JSON document at a key.
    Set { key: String, json: String },

    /// List keys matching a glob pattern.
    Keys {
        #[arg(default_value = "*")]
        pattern: String,
    },

    /// List snapshot keys published on a UTC date.
    Snapshots {
        /// Date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<String>,
    },

    /// Delete cached query results that belong to an older version.
    Sweep,
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("skycache=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load(path: &std::path::Path) -> Result<Config> {
    if path.exists() {
        return config::load_config(path);
    }
    let cfg = Config::default();
    config::validate(&cfg)?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let cfg = load(&cli.config)?;

    if let Commands::Init = cli.command {
        migrate::run_migrations(&cfg).await?;
        println!("Database initialized at {}", cfg.store.path.display());
        return Ok(());
    }

    let app = Arc::new(App::from_config(&cfg).await?);
    let outcome = run(&app, cli.command).await;
    app.close().await;
    outcome
}

async fn run(app: &Arc<App>, command: Commands) -> Result<()> {
    match command {
        Commands::Init => unreachable!("handled before the store is opened"),
        Commands::Ingest { from } => {
            let source = app.source(from.as_deref())?;
            let result = ingest::run_cycle(source.as_ref(), &app.publisher, &app.sink).await;
            println!("published {}", result.snapshot_key);
            println!("  records: {}", result.records);
            println!("  version: {}", result.version);
            for failure in &result.failures {
                println!("  failed: {} on {}: {}", failure.step, failure.key, failure.message);
            }
        }
        Commands::Serve { bind, no_ingest } => {
            serve(app.clone(), bind, no_ingest).await?;
        }
        Commands::Query { airline, airport } => {
            match app.query(airline.as_deref(), airport.as_deref()).await {
                Resolution::Found(records) => {
                    println!("{}", serde_json::to_string_pretty(&records)?)
                }
                Resolution::NotFound => anyhow::bail!("no flight dataset available"),
            }
        }
        Commands::Get { key } => match app.access.get(&key).await? {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => anyhow::bail!("key not found: {}", key),
        },
        Commands::Set { key, json } => {
            let value: serde_json::Value =
                serde_json::from_str(&json).context("value must be valid JSON")?;
            app.access.set(&key, &value).await?;
            println!("OK");
        }
        Commands::Keys { pattern } => {
            for key in app.access.list_keys(&pattern).await? {
                println!("{}", key);
            }
        }
        Commands::Snapshots { date } => {
            let date = match date {
                Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .with_context(|| format!("invalid date '{}', expected YYYY-MM-DD", s))?,
                None => Utc::now().date_naive(),
            };
            for key in app.history.list(date).await? {
                println!("{}", key);
            }
        }
        Commands::Sweep => {
            let removed = app.resolver.sweep_stale_queries().await?;
            println!("removed {} stale query entries", removed);
        }
    }
    Ok(())
}

async fn serve(app: Arc<App>, bind: Option<String>, no_ingest: bool) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = if no_ingest {
        None
    } else {
        let source = app.source(None)?;
        Some(tokio::spawn(ingest::run_scheduler(
            source,
            app.publisher.clone(),
            app.sink.clone(),
            app.config.ingest.interval(),
            shutdown_rx.clone(),
        )))
    };

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            return;
        }
        info!("shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    let bind = bind.unwrap_or_else(|| app.config.server.bind.clone());
    server::serve(app, &bind, shutdown_rx).await?;

    if let Some(handle) = scheduler {
        handle.await?;
    }
    Ok(())
}
