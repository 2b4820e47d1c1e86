//! API route definitions.

use axum::{Router, middleware as axum_middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::{health, object, stats};
use crate::middleware;
use crate::state::AppState;

/// Create the proxy router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/object", get(object::get_object))
        .route("/stats", get(stats::stats))
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .layer(axum_middleware::from_fn(middleware::request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
