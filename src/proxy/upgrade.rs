//! Connection Upgrades
//!
//! Relays WebSocket (and other HTTP/1.1 upgrade) handshakes to the upstream
//! and joins both upgraded connections as a raw byte stream.

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode, Version},
    response::Response,
};
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tracing::{debug, info, warn};

use super::forward::{relay_response, request_headers, response_headers, Forwarder};
use super::rewrite::classify;
use crate::error::{ProxyError, Result};

/// True when the request asks to switch protocols: a `Connection` header
/// carrying the `upgrade` token and an `Upgrade` header.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    connection_upgrade && headers.contains_key(header::UPGRADE)
}

impl Forwarder {
    // == Forward Upgrade ==
    /// Forwards an upgrade handshake.
    ///
    /// A `101` from the upstream is relayed to the client and a task is
    /// spawned that copies bytes both ways until either side closes. Any
    /// other upstream status is relayed as a normal response.
    pub async fn forward_upgrade(&self, mut request: Request<Body>) -> Result<Response> {
        let (class, path) = classify(request.uri().path());
        let url = self.upstream_url(&path, request.uri().query());
        let client_upgrade = hyper::upgrade::on(&mut request);
        let protocol = request
            .headers()
            .get(header::UPGRADE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        info!(route = class.as_str(), protocol = %protocol, url = %url, "Proxying upgrade");

        let upstream = self
            .client
            .request(request.method().clone(), &url)
            .version(Version::HTTP_11)
            .headers(request_headers(request.headers(), true))
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "Upstream upgrade request failed");
                ProxyError::from(e)
            })?;

        if upstream.status() != StatusCode::SWITCHING_PROTOCOLS {
            info!(status = %upstream.status(), url = %url, "Upstream declined upgrade");
            return relay_response(upstream);
        }

        let mut builder = Response::builder().status(StatusCode::SWITCHING_PROTOCOLS);
        if let Some(headers) = builder.headers_mut() {
            *headers = response_headers(upstream.headers(), true);
        }
        let response = builder
            .body(Body::empty())
            .map_err(|e| ProxyError::Internal(format!("Failed to build response: {}", e)))?;

        tokio::spawn(async move {
            match splice(client_upgrade, upstream).await {
                Ok((sent, received)) => {
                    info!(url = %url, sent, received, "Upgraded connection closed")
                }
                Err(e) => warn!(url = %url, error = %e, "Upgraded connection failed"),
            }
        });

        Ok(response)
    }
}

/// Waits for both sides to finish upgrading, then copies bytes until one
/// side closes. Returns bytes sent upstream and received from upstream.
async fn splice(client: OnUpgrade, upstream: reqwest::Response) -> Result<(u64, u64)> {
    let mut upstream = upstream
        .upgrade()
        .await
        .map_err(|e| ProxyError::Upgrade(format!("upstream: {}", e)))?;
    let client = client
        .await
        .map_err(|e| ProxyError::Upgrade(format!("client: {}", e)))?;
    let mut client = TokioIo::new(client);

    debug!("Upgrade established, relaying bytes");
    tokio::io::copy_bidirectional(&mut client, &mut upstream)
        .await
        .map_err(|e| ProxyError::Upgrade(e.to_string()))
}
