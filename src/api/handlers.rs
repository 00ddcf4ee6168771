//! API Handlers
//!
//! HTTP request handlers for the proxy and its discovery endpoints.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    Json,
};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;
use crate::models::{ConfigResponse, HealthResponse};
use crate::proxy::{is_upgrade_request, Forwarder};

/// Application state shared across all handlers.
///
/// Read-only after startup.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Configuration resolved at startup
    pub config: Arc<Config>,
    /// Upstream client
    pub forwarder: Forwarder,
}

impl AppState {
    /// Creates a new AppState from configuration.
    ///
    /// Builds the upstream client for `config.api_base()`.
    pub fn from_config(config: Config) -> Result<Self> {
        let forwarder = Forwarder::new(config.api_base())?;
        Ok(Self {
            config: Arc::new(config),
            forwarder,
        })
    }
}

/// Handler for `ANY /api` and `ANY /api/*`
///
/// Forwards the request upstream, relaying upgrade handshakes when asked.
pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Result<Response> {
    debug!(method = %request.method(), uri = %request.uri(), "Inbound API request");

    let result = if is_upgrade_request(request.headers()) {
        state.forwarder.forward_upgrade(request).await
    } else {
        state.forwarder.forward(request).await
    };

    result.inspect_err(|e| warn!(error = %e, "Proxy request failed"))
}

/// Handler for GET /config
///
/// Returns the upstream base and the same-origin proxy prefix.
pub async fn config_handler(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse::new(state.config.api_base()))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.config.api_base()))
}
