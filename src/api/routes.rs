//! API Routes
//!
//! Configures the Axum router with all cache management endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_entries_handler, delete_entry_handler, get_entry_handler, get_parameters_handler,
    health_handler, list_caches_handler, list_entries_handler, put_entry_handler,
    put_parameters_handler, stats_handler, sweep_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `GET /caches` - Names of every cache
/// - `GET|PUT|DELETE /caches/:name/entries` - Snapshot, store, clear
/// - `GET|DELETE /caches/:name/entries/:key` - Read or remove one key
/// - `GET|PUT /caches/:name/parameters` - Inspect or change limits
/// - `POST /caches/:name/sweep` - Run the expiry sweep now
/// - `GET /caches/:name/stats` - Get cache statistics
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router with all endpoints
    Router::new()
        .route("/health", get(health_handler))
        .route("/caches", get(list_caches_handler))
        .route(
            "/caches/:name/entries",
            get(list_entries_handler)
                .put(put_entry_handler)
                .delete(clear_entries_handler),
        )
        .route(
            "/caches/:name/entries/:key",
            get(get_entry_handler).delete(delete_entry_handler),
        )
        .route(
            "/caches/:name/parameters",
            get(get_parameters_handler).put(put_parameters_handler),
        )
        .route("/caches/:name/sweep", post(sweep_handler))
        .route("/caches/:name/stats", get(stats_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
