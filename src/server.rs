//! HTTP surface over the query resolver and raw key access.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/flights?airline=&airport=` | Filtered flights from the current snapshot |
//! | `GET`  | `/raw/{key}` | Raw value at a key |
//! | `PUT`  | `/raw/{key}` | Store a JSON body at a key |
//! | `GET`  | `/keys?pattern=` | Keys matching a glob pattern |
//! | `GET`  | `/snapshots?date=` | Snapshot keys indexed for a UTC date |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no flight dataset available" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `internal` (500).
//!
//! # Authentication
//!
//! When an API key is configured, every route except `/health` requires it
//! in the `x-api-key` header.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use skycache_core::store::compile_pattern;

use crate::app::App;
use crate::resolver::Resolution;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
struct AppState {
    app: Arc<App>,
    api_key: Option<Arc<str>>,
}

/// Build the router. Exposed separately from [`serve`] so tests can bind
/// an ephemeral listener.
pub fn router(app: Arc<App>) -> Router {
    let state = AppState {
        api_key: app.config.server.resolved_api_key().map(Arc::from),
        app,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/flights", get(handle_flights))
        .route("/raw/{key}", get(handle_raw_get).put(handle_raw_put))
        .route("/keys", get(handle_keys))
        .route("/snapshots", get(handle_snapshots))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(handle_health))
        .merge(protected)
        .layer(cors)
        .with_state(state)
}

/// Bind `bind` and serve until `shutdown` flips to `true`.
pub async fn serve(
    app: Arc<App>,
    bind: &str,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    serve_listener(app, listener, shutdown).await
}

pub async fn serve_listener(
    app: Arc<App>,
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "HTTP server listening");
    axum::serve(listener, router(app))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn unauthorized() -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized",
        message: format!("missing or invalid {} header", API_KEY_HEADER),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

/// Store failures are logged in full; the client only sees the message.
fn internal(err: anyhow::Error) -> AppError {
    warn!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: err.to_string(),
    }
}

async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(expected) = &state.api_key {
        let supplied = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if supplied != Some(expected.as_ref()) {
            return Err(unauthorized());
        }
    }
    Ok(next.run(req).await)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /flights ============

#[derive(Deserialize)]
struct FlightsParams {
    airline: Option<String>,
    airport: Option<String>,
}

/// Returns the matching records as a JSON array, or 404 when no canonical
/// dataset exists. An empty array means a dataset exists with no match.
async fn handle_flights(
    State(state): State<AppState>,
    Query(params): Query<FlightsParams>,
) -> Result<Json<Value>, AppError> {
    match state
        .app
        .query(params.airline.as_deref(), params.airport.as_deref())
        .await
    {
        Resolution::Found(records) => Ok(Json(records)),
        Resolution::NotFound => Err(not_found("no flight dataset available")),
    }
}

// ============ /raw/{key} ============

async fn handle_raw_get(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, AppError> {
    state
        .app
        .access
        .get(&key)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(|| not_found(format!("key not found: {}", key)))
}

async fn handle_raw_put(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(value): Json<Value>,
) -> Result<StatusCode, AppError> {
    if key.trim().is_empty() {
        return Err(bad_request("key must not be empty"));
    }
    state.app.access.set(&key, &value).await.map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ GET /keys ============

#[derive(Deserialize)]
struct KeysParams {
    pattern: Option<String>,
}

#[derive(Serialize)]
struct KeysResponse {
    keys: Vec<String>,
}

async fn handle_keys(
    State(state): State<AppState>,
    Query(params): Query<KeysParams>,
) -> Result<Json<KeysResponse>, AppError> {
    let pattern = params.pattern.unwrap_or_else(|| "*".to_string());
    compile_pattern(&pattern).map_err(|e| bad_request(format!("{:#}", e)))?;
    let keys = state
        .app
        .access
        .list_keys(&pattern)
        .await
        .map_err(internal)?;
    Ok(Json(KeysResponse { keys }))
}

// ============ GET /snapshots ============

#[derive(Deserialize)]
struct SnapshotsParams {
    date: Option<String>,
}

#[derive(Serialize)]
struct SnapshotsResponse {
    date: String,
    snapshots: Vec<String>,
}

async fn handle_snapshots(
    State(state): State<AppState>,
    Query(params): Query<SnapshotsParams>,
) -> Result<Json<SnapshotsResponse>, AppError> {
    let date = match params.date.as_deref() {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| bad_request(format!("date must be YYYY-MM-DD, got '{}'", s)))?,
        None => Utc::now().date_naive(),
    };
    let snapshots = state.app.history.list(date).await.map_err(internal)?;
    Ok(Json(SnapshotsResponse {
        date: date.format("%Y-%m-%d").to_string(),
        snapshots,
    }))
}
