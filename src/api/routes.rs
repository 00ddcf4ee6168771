//! API Routes
//!
//! Configures the Axum router: proxied `/api` traffic, discovery endpoints
//! and static files for everything else.

use std::path::Path;

use axum::{
    routing::{any, get},
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use super::handlers::{config_handler, health_handler, proxy_handler, AppState};

/// Document root for static assets.
pub const STATIC_ROOT: &str = "public";

/// Creates the main router serving static files from [`STATIC_ROOT`].
///
/// # Endpoints
/// - `ANY /api`, `ANY /api/*` - Forwarded upstream (HTTP and upgrades)
/// - `GET /config` - Upstream base and proxy prefix
/// - `GET /health` - Health check endpoint
/// - anything else - Static files
pub fn create_router(state: AppState) -> Router {
    create_router_with_static(state, STATIC_ROOT)
}

/// Creates the main router serving static files from `static_root`.
pub fn create_router_with_static(state: AppState, static_root: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/api", any(proxy_handler))
        .route("/api/", any(proxy_handler))
        .route("/api/*rest", any(proxy_handler))
        .route("/config", get(config_handler))
        .route("/health", get(health_handler))
        .fallback_service(ServeDir::new(static_root.as_ref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
