//! Request Forwarding
//!
//! Sends rewritten requests to the upstream and relays the responses.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request},
    response::Response,
};
use tracing::{debug, info, warn};

use super::rewrite::classify;
use crate::error::{ProxyError, Result};

/// Largest request body buffered for forwarding.
pub const MAX_REQUEST_BODY: usize = 64 * 1024 * 1024;

// == Forwarder ==
/// HTTP client bound to one upstream base URL.
///
/// Upstream certificates are not validated and redirects are relayed to
/// the browser instead of followed.
#[derive(Debug, Clone)]
pub struct Forwarder {
    pub(super) client: reqwest::Client,
    upstream: String,
}

impl Forwarder {
    /// Creates a forwarder for `upstream`, e.g. `http://localhost:3000`.
    pub fn new(upstream: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProxyError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            upstream: upstream.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Full upstream URL for an already rewritten path.
    ///
    /// An empty path targets the upstream root.
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> String {
        let path = if path.is_empty() { "/" } else { path };
        match query {
            Some(query) if !query.is_empty() => format!("{}{}?{}", self.upstream, path, query),
            _ => format!("{}{}", self.upstream, path),
        }
    }

    // == Forward ==
    /// Forwards a plain HTTP request and relays the upstream response.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response> {
        let (class, path) = classify(request.uri().path());
        let url = self.upstream_url(&path, request.uri().query());
        let method = request.method().clone();
        let headers = request_headers(request.headers(), false);

        let body = axum::body::to_bytes(request.into_body(), MAX_REQUEST_BODY)
            .await
            .map_err(|e| ProxyError::Body(format!("Failed to read request body: {}", e)))?;

        info!(route = class.as_str(), method = %method, url = %url, "Proxying request");

        let upstream = self
            .client
            .request(method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "Upstream request failed");
                ProxyError::from(e)
            })?;

        info!(status = %upstream.status(), url = %url, "Proxied response");
        relay_response(upstream)
    }
}

/// Streams an upstream response back to the client.
pub(super) fn relay_response(upstream: reqwest::Response) -> Result<Response> {
    let mut builder = Response::builder().status(upstream.status());
    if let Some(headers) = builder.headers_mut() {
        *headers = response_headers(upstream.headers(), false);
    }

    builder
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| ProxyError::Internal(format!("Failed to build response: {}", e)))
}

// == Header Filtering ==
/// Hop-by-hop headers, plus `host` which must name the upstream.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "proxy-connection"
            | "te"
            | "trailer"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
            | "host"
    )
}

fn is_upgrade_header(name: &HeaderName) -> bool {
    name == header::CONNECTION || name == header::UPGRADE
}

/// Headers sent upstream. `keep_upgrade` retains `connection` and
/// `upgrade` for handshakes.
pub(super) fn request_headers(source: &HeaderMap, keep_upgrade: bool) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(source.len());
    for (name, value) in source {
        if is_hop_by_hop(name) && !(keep_upgrade && is_upgrade_header(name)) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Headers relayed to the client, with cookie domains removed.
pub(super) fn response_headers(source: &HeaderMap, keep_upgrade: bool) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(source.len());
    for (name, value) in source {
        if is_hop_by_hop(name) && !(keep_upgrade && is_upgrade_header(name)) {
            continue;
        }
        if name == header::SET_COOKIE {
            headers.append(name.clone(), rewrite_set_cookie(value));
        } else {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

fn rewrite_set_cookie(value: &HeaderValue) -> HeaderValue {
    let Ok(raw) = value.to_str() else {
        return value.clone();
    };
    let rewritten = strip_cookie_domain(raw);
    if rewritten == raw {
        return value.clone();
    }
    debug!(cookie = %rewritten, "Removed cookie domain");
    HeaderValue::from_str(&rewritten).unwrap_or_else(|_| value.clone())
}

/// Drops the `Domain` attribute of a `Set-Cookie` value so the cookie is
/// scoped to the proxy's own host.
pub fn strip_cookie_domain(cookie: &str) -> String {
    let mut parts = cookie.split(';');
    let mut kept: Vec<&str> = parts.next().map(str::trim).into_iter().collect();
    kept.extend(
        parts
            .map(str::trim)
            .filter(|attr| !attr.is_empty())
            .filter(|attr| {
                !attr
                    .split('=')
                    .next()
                    .is_some_and(|name| name.trim().eq_ignore_ascii_case("domain"))
            }),
    );
    kept.join("; ")
}
