//! API Handlers
//!
//! Operator endpoints over the response cache, plus health checks.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use tracing::debug;
use uuid::Uuid;

use crate::cache::{CacheEngine, CacheStatistics, Clock};
use crate::config::Config;
use crate::error::{ApiError, Error, Result};
use crate::integrations::Integrations;
use crate::models::{
    DeletedCountResponse, DeletedResponse, HealthResponse, IntegrationsHealthResponse, OkResponse,
    RemovedCountResponse,
};

/// Header carrying a caller-supplied correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Response cache shared by every integration
    pub cache: CacheEngine<serde_json::Value>,
    pub integrations: Arc<Integrations>,
}

impl AppState {
    pub fn new(cache: CacheEngine<serde_json::Value>, integrations: Arc<Integrations>) -> Self {
        Self {
            cache,
            integrations,
        }
    }

    /// Builds the cache and integrations described by `config`.
    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let cache = CacheEngine::from_config(&config.cache, Arc::clone(&clock))?;
        let integrations = Integrations::from_config(config, clock)?;
        Ok(Self::new(cache, Arc::new(integrations)))
    }
}

/// Correlation id of the inbound request, generated when absent.
pub fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Handler for GET /api/v1/cache/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<CacheStatistics> {
    Json(state.cache.stats().await)
}

/// Handler for DELETE /api/v1/cache/clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<DeletedResponse> {
    let removed = state.cache.clear().await;
    debug!(removed, "Cache cleared by operator");
    Json(DeletedResponse { deleted: true })
}

/// Handler for DELETE /api/v1/cache/key/*key
pub async fn delete_key_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<DeletedResponse> {
    let deleted = state.cache.delete(&key).await;
    Json(DeletedResponse { deleted })
}

/// Handler for DELETE /api/v1/cache/pattern/:pattern
///
/// An empty pattern would match every key, so it is rejected; `clear`
/// exists for that.
pub async fn delete_pattern_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    pattern: Option<Path<String>>,
) -> std::result::Result<Json<DeletedCountResponse>, ApiError> {
    let pattern = pattern.map(|Path(pattern)| pattern).unwrap_or_default();
    if pattern.is_empty() {
        return Err(Error::InvalidRequest("pattern must not be empty".to_string())
            .with_correlation(correlation_id(&headers)));
    }

    let deleted_count = state.cache.delete_by_pattern(&pattern).await;
    Ok(Json(DeletedCountResponse { deleted_count }))
}

/// Handler for POST /api/v1/cache/cleanup
pub async fn cleanup_handler(State(state): State<AppState>) -> Json<RemovedCountResponse> {
    let removed_count = state.cache.sweep_expired().await;
    Json(RemovedCountResponse { removed_count })
}

/// Handler for POST /api/v1/cache/reset-stats
pub async fn reset_stats_handler(State(state): State<AppState>) -> Json<OkResponse> {
    state.cache.reset_stats().await;
    Json(OkResponse::ok())
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /api/v1/integrations/health
pub async fn integrations_health_handler(
    State(state): State<AppState>,
) -> Json<IntegrationsHealthResponse> {
    Json(IntegrationsHealthResponse::new(
        state.integrations.health().await,
    ))
}
