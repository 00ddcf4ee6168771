//! Error types for the proxy and the cache backends
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Proxy Error Enum ==
/// Errors surfaced to clients of the reverse proxy.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Upstream could not be reached (refused, DNS failure, timeout)
    #[error("{0}")]
    Upstream(String),

    /// Upgrade handshake could not be relayed
    #[error("Upgrade failed: {0}")]
    Upgrade(String),

    /// Inbound request body could not be read
    #[error("{0}")]
    Body(String),

    /// Response could not be assembled
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            ProxyError::Upstream(format!("Failed to connect to upstream: {}", err))
        } else if err.is_timeout() {
            ProxyError::Upstream(format!("Upstream request timed out: {}", err))
        } else {
            ProxyError::Upstream(format!("Upstream request failed: {}", err))
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProxyError::Upstream(_) | ProxyError::Upgrade(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Body(_) => StatusCode::BAD_REQUEST,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Store Error Enum ==
/// Failures of a single cache backend call.
///
/// Never returned from the public cache operations; the tiered cache logs,
/// counts and falls back instead.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Native store was used before a successful open
    #[error("native store not open")]
    NotOpen,

    /// SQLite call failed
    #[error("native store error: {0}")]
    Native(String),

    /// Flat store read/write failed
    #[error("flat store error: {0}")]
    Flat(String),

    /// Flat store write rejected for size
    #[error("flat store quota exceeded: {needed} bytes > {quota} bytes")]
    QuotaExceeded { needed: usize, quota: usize },
}

impl From<tokio_rusqlite::Error<tokio_rusqlite::rusqlite::Error>> for StoreError {
    fn from(err: tokio_rusqlite::Error<tokio_rusqlite::rusqlite::Error>) -> Self {
        StoreError::Native(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Flat(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Flat(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for proxy handlers.
pub type Result<T> = std::result::Result<T, ProxyError>;
