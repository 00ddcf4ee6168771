//! Response DTOs for the proxy endpoints
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::proxy::API_PREFIX;

/// Response body for `GET /config`
///
/// Tells the client where API calls go: the upstream base for display and
/// the same-origin prefix to actually call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    /// Upstream base URL, `host:port`
    pub api_base: String,
    /// Same-origin prefix proxied to the upstream
    pub api_proxy_base: String,
}

impl ConfigResponse {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_proxy_base: API_PREFIX.to_string(),
        }
    }
}

/// Response body for `GET /health`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub ok: bool,
    /// Upstream base URL, `host:port`
    pub api_base: String,
}

impl HealthResponse {
    pub fn healthy(api_base: impl Into<String>) -> Self {
        Self {
            ok: true,
            api_base: api_base.into(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_response_serialize() {
        let resp = ConfigResponse::new("http://localhost:3000");
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            value,
            json!({"apiBase": "http://localhost:3000", "apiProxyBase": "/api"})
        );
    }

    #[test]
    fn test_health_response_serialize() {
        let value = serde_json::to_value(HealthResponse::healthy("http://localhost:3000")).unwrap();
        assert_eq!(value, json!({"ok": true, "apiBase": "http://localhost:3000"}));
    }

    #[test]
    fn test_error_response_serialize() {
        let resp = ErrorResponse::new("Something went wrong");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Something went wrong"));
    }
}
