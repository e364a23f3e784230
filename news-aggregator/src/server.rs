//! HTTP surface
//!
//! Provides /health, /api/sources and /api/news.

use crate::cache::{CacheStats, NewsCache};
use crate::types::{NewsItemRecord, NewsQuery, SortField, SortOrder, SourceInfo};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

/// Shared state for the HTTP server
pub struct ServerState {
    pub cache: NewsCache,
    pub default_limit: usize,
    /// Used when a request names no registered source
    pub fallback_source: String,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(cache: NewsCache, default_limit: usize, fallback_source: impl Into<String>) -> Self {
        Self {
            cache,
            default_limit,
            fallback_source: fallback_source.into().trim().to_lowercase(),
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
}

#[derive(Serialize)]
pub struct SourcesResponse {
    pub sources: Vec<SourceInfo>,
    pub default: String,
}

/// Raw query string of /api/news. Everything is parsed by hand so bad values
/// can be normalized or rejected with a JSON body.
#[derive(Debug, Default, Deserialize)]
pub struct NewsParams {
    pub sources: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub keyword: Option<String>,
}

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sources", get(get_sources))
        .route("/api/news", get(get_news))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server<F>(
    state: SharedState,
    addr: SocketAddr,
    shutdown: F,
) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown).await
}

async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache: state.cache.stats().await,
    })
}

async fn get_sources(State(state): State<SharedState>) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        sources: state.cache.aggregator().registry().list_sources(),
        default: "all".to_string(),
    })
}

async fn get_news(State(state): State<SharedState>, Query(params): Query<NewsParams>) -> Response {
    let query = match build_query(&state, params) {
        Ok(query) => query,
        Err(message) => {
            let body = Json(ErrorResponse { error: message });
            return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
        }
    };

    let news = state.cache.get_news(query).await;
    let records: Vec<NewsItemRecord> = news.items.iter().map(NewsItemRecord::from).collect();

    ([("x-cache", news.status.as_str())], Json(records)).into_response()
}

/// Turn raw parameters into a validated query.
///
/// Out-of-range limits are rejected. Unknown sort values fall back to the
/// defaults. A registered mode id (e.g. `rss`) selects that mode alone, with
/// modes taking precedence in registration order. Otherwise `all` or an
/// empty selection means every source, unknown ids are dropped, and a
/// selection with nothing left falls back to the configured source.
pub fn build_query(state: &ServerState, params: NewsParams) -> Result<NewsQuery, String> {
    let max_limit = state.cache.config().max_limit;
    let limit = match params.limit.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => state.default_limit,
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) if n >= 1 && n as u64 <= max_limit as u64 => n as usize,
            _ => return Err(format!("limit must be an integer between 1 and {}", max_limit)),
        },
    };

    let sort_by = params
        .sort_by
        .as_deref()
        .and_then(|s| s.parse::<SortField>().ok())
        .unwrap_or_default();
    let sort_order = params
        .sort_order
        .as_deref()
        .and_then(|s| s.parse::<SortOrder>().ok())
        .unwrap_or_default();

    let requested: Vec<String> = params
        .sources
        .as_deref()
        .unwrap_or("all")
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let mut query = NewsQuery::new(limit).sorted_by(sort_by, sort_order);
    query.sources = select_sources(state, &requested);
    query.keyword = params.keyword.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
    Ok(query)
}

fn select_sources(state: &ServerState, requested: &[String]) -> Option<Vec<String>> {
    let registry = state.cache.aggregator().registry();

    if let Some(mode) = registry.modes().into_iter().find(|m| requested.contains(m)) {
        debug!("Request selects mode {}", mode);
        return Some(vec![mode]);
    }
    if requested.is_empty() || requested.iter().any(|s| s == "all") {
        return None;
    }

    let resolved = registry.resolve(requested);
    if !resolved.is_empty() {
        return Some(resolved);
    }
    if registry.contains(&state.fallback_source) {
        debug!("No known sources in {:?}, using {}", requested, state.fallback_source);
        Some(vec![state.fallback_source.clone()])
    } else {
        debug!("No known sources in {:?} and no fallback, using all", requested);
        None
    }
}
