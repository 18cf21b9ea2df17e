//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/resolve?q=` | Resolve a free-text reference |
//! | `GET`  | `/api/{title}/{page}` | One page with its commentary |
//! | `GET`  | `/api/{title}/{start}/to/{end}` | A range of pages |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "upstream_fetch", "message": "...", "internal_code": 1 } }
//! ```
//!
//! Resolution and page errors (`unknown_title`, `invalid_query`,
//! `page_does_not_exist`) are 404. Upstream failures (`upstream_fetch`,
//! `length_mismatch`) are 500. Anything else is `internal` (500) and its
//! message carries an id that is also written to the log.
//!
//! # Caching
//!
//! Rendered pages are kept in a bounded in-memory cache. Concurrent requests
//! for the same uncached page share one upstream fan-out. After a single page
//! is served, its neighbours are rendered in the background.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info};

use talmud_page_core::{Aggregator, Error, PageDocument, PageId, PageSpan};

use crate::config::{Config, ServerConfig};
use crate::page_cmd::{build_aggregator, parse_page};
use crate::resolve_cmd::{resolve_query, Resolution};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PageKey {
    title: String,
    start: PageId,
    end: Option<PageId>,
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    aggregator: Arc<Aggregator>,
    pages: Cache<PageKey, Arc<PageDocument>>,
    prefetch: bool,
}

/// Starts the HTTP server on `[server].bind`. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let aggregator = Arc::new(build_aggregator(config)?);
    let app = router(aggregator, &config.server);

    let bind_addr = &config.server.bind;
    println!("tp listening on http://{}", bind_addr);
    info!(bind = %bind_addr, "server started");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Builds the API router around an existing aggregator.
pub fn router(aggregator: Arc<Aggregator>, server: &ServerConfig) -> Router {
    let state = AppState {
        aggregator,
        pages: Cache::builder().max_capacity(server.cache_capacity).build(),
        prefetch: server.prefetch,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/resolve", get(handle_resolve))
        .route("/api/{title}/{page}", get(handle_page))
        .route("/api/{title}/{start}/to/{end}", get(handle_range))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
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
    #[serde(skip_serializing_if = "Option::is_none")]
    internal_code: Option<u32>,
}

#[derive(Debug, Clone)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    internal_code: Option<u32>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                internal_code: self.internal_code,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let status = if err.is_client_error() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
            internal_code: err.internal_code(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
        internal_code: None,
    }
}

/// An unexpected failure. The details stay in the log under a fresh id.
fn internal(err: impl std::fmt::Display) -> AppError {
    let id = uuid::Uuid::new_v4();
    error!(%id, error = %err, "internal error");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: format!("Internal error (id {})", id),
        internal_code: None,
    }
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

// ============ GET /api/resolve ============

#[derive(Deserialize)]
struct ResolveParams {
    #[serde(default)]
    q: String,
}

async fn handle_resolve(
    State(state): State<AppState>,
    Query(params): Query<ResolveParams>,
) -> Result<Json<Resolution>, AppError> {
    if params.q.trim().is_empty() {
        return Err(bad_request("q must not be empty"));
    }
    Ok(Json(resolve_query(state.aggregator.index(), &params.q)?))
}

// ============ GET /api/{title}/... ============

async fn handle_page(
    State(state): State<AppState>,
    Path((title, page)): Path<(String, String)>,
) -> Result<Json<PageDocument>, AppError> {
    let key = page_key(&state, &title, &page, None)?;
    let document = cached_page(&state, key.clone()).await?;

    if state.prefetch {
        prefetch_neighbours(&state, &key);
    }
    Ok(Json(PageDocument::clone(&document)))
}

async fn handle_range(
    State(state): State<AppState>,
    Path((title, start, end)): Path<(String, String, String)>,
) -> Result<Json<PageDocument>, AppError> {
    let key = page_key(&state, &title, &start, Some(&end))?;
    let document = cached_page(&state, key).await?;
    Ok(Json(PageDocument::clone(&document)))
}

/// Canonicalizes the title and orders the endpoints so equivalent requests
/// share a cache entry.
fn page_key(
    state: &AppState,
    title: &str,
    start: &str,
    end: Option<&str>,
) -> Result<PageKey, AppError> {
    let record = state.aggregator.index().title(title)?;
    let mut start = parse_page(start)?;
    let mut end = end.map(parse_page).transpose()?;
    if let Some(e) = end.as_mut() {
        if *e < start {
            std::mem::swap(e, &mut start);
        }
    }
    if end == Some(start) {
        end = None;
    }
    Ok(PageKey {
        title: record.canonical_name.clone(),
        start,
        end,
    })
}

async fn cached_page(state: &AppState, key: PageKey) -> Result<Arc<PageDocument>, AppError> {
    let aggregator = state.aggregator.clone();
    let init_key = key.clone();
    state
        .pages
        .try_get_with(key, async move {
            // Rendering runs in its own task so a client hanging up does not
            // cancel a fan-out other requests are waiting on.
            let rendered = tokio::spawn(async move {
                aggregator
                    .aggregate(
                        &init_key.title,
                        PageSpan {
                            start: init_key.start,
                            end: init_key.end,
                        },
                    )
                    .await
            })
            .await;
            match rendered {
                Ok(Ok(document)) => Ok(Arc::new(document)),
                Ok(Err(e)) => Err(AppError::from(e)),
                Err(join_error) => Err(internal(join_error)),
            }
        })
        .await
        .map_err(|e: Arc<AppError>| AppError::clone(&e))
}

fn prefetch_neighbours(state: &AppState, key: &PageKey) {
    let index = state.aggregator.index();
    let neighbours = [key.start.previous(), key.start.next()];

    for page in neighbours.into_iter().flatten() {
        if !index.page_exists(&key.title, &page) {
            continue;
        }
        let neighbour = PageKey {
            title: key.title.clone(),
            start: page,
            end: None,
        };
        if state.pages.contains_key(&neighbour) {
            continue;
        }

        let state = state.clone();
        tokio::spawn(async move {
            match cached_page(&state, neighbour.clone()).await {
                Ok(_) => debug!(title = %neighbour.title, page = %neighbour.start, "prefetched"),
                Err(e) => debug!(
                    title = %neighbour.title,
                    page = %neighbour.start,
                    error = %e.message,
                    "prefetch failed"
                ),
            }
        });
    }
}
