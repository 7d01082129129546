//! API Routes
//!
//! Configures the Axum router with the admin and health endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cleanup_handler, clear_handler, delete_key_handler, delete_pattern_handler, health_handler,
    integrations_health_handler, reset_stats_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Liveness check
/// - `GET /api/v1/integrations/health` - Per-integration authentication state
/// - `GET /api/v1/cache/stats` - Cache statistics
/// - `DELETE /api/v1/cache/clear` - Remove every entry
/// - `DELETE /api/v1/cache/key/*key` - Remove one entry
/// - `DELETE /api/v1/cache/pattern/:pattern` - Remove entries whose key contains `pattern`
/// - `POST /api/v1/cache/cleanup` - Sweep expired entries now
/// - `POST /api/v1/cache/reset-stats` - Zero the counters
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let cache_routes = Router::new()
        .route("/stats", get(stats_handler))
        .route("/clear", delete(clear_handler))
        .route("/key/*key", delete(delete_key_handler))
        .route("/pattern/", delete(delete_pattern_handler))
        .route("/pattern/:pattern", delete(delete_pattern_handler))
        .route("/cleanup", post(cleanup_handler))
        .route("/reset-stats", post(reset_stats_handler));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/integrations/health", get(integrations_health_handler))
        .nest("/api/v1/cache", cache_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
