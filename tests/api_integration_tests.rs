//! Integration Tests for the Proxy Endpoints
//!
//! Drives the router against a real upstream bound on an ephemeral port.

use std::net::SocketAddr;
use std::path::Path;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chat_frontend::{api::create_router_with_static, AppState, Config};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tower::ServiceExt;

// == Helper Functions ==

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn spawn_server(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Upstream that echoes the request it received, or accepts an `echo`
/// protocol upgrade and echoes bytes.
async fn upstream_handler(mut request: Request<Body>) -> Response {
    let wants_echo = request
        .headers()
        .get(header::UPGRADE)
        .is_some_and(|v| v == "echo");

    if wants_echo {
        let on_upgrade = hyper::upgrade::on(&mut request);
        tokio::spawn(async move {
            if let Ok(upgraded) = on_upgrade.await {
                let mut io = TokioIo::new(upgraded);
                let mut buf = [0u8; 1024];
                loop {
                    let n = match io.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => n,
                    };
                    if io.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            }
        });

        return Response::builder()
            .status(StatusCode::SWITCHING_PROTOCOLS)
            .header(header::CONNECTION, "upgrade")
            .header(header::UPGRADE, "echo")
            .header("x-upstream-path", request.uri().path())
            .body(Body::empty())
            .unwrap();
    }

    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let echo = json!({
        "method": parts.method.as_str(),
        "path": parts.uri.path(),
        "query": parts.uri.query(),
        "host": parts.headers.get(header::HOST).and_then(|v| v.to_str().ok()),
        "authorization": parts.headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()),
        "body": String::from_utf8_lossy(&body),
    });

    Response::builder()
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::SET_COOKIE, "sid=abc; Domain=upstream.internal; Path=/; HttpOnly")
        .body(Body::from(echo.to_string()))
        .unwrap()
}

async fn spawn_upstream() -> SocketAddr {
    spawn_server(Router::new().fallback(upstream_handler)).await
}

fn proxy_app(upstream_port: u16, static_root: &Path) -> Router {
    let config = Config {
        api_host: "http://127.0.0.1".to_string(),
        api_port: upstream_port,
        frontend_port: 0,
    };
    create_router_with_static(AppState::from_config(config).unwrap(), static_root)
}

async fn proxied_get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

// == Path Rewrite ==

#[tokio::test]
async fn test_rewrite_classes_reach_upstream() {
    let upstream = spawn_upstream().await;
    let dir = tempfile::tempdir().unwrap();

    let cases = [
        ("/api/socket.io/abc", "/socket.io/abc"),
        ("/api/notify/xyz", "/notify/xyz"),
        ("/api/users/5", "/users/5"),
        ("/api", "/"),
    ];

    for (inbound, expected) in cases {
        let (status, json) = proxied_get(proxy_app(upstream.port(), dir.path()), inbound).await;
        assert_eq!(status, StatusCode::OK, "inbound: {}", inbound);
        assert_eq!(json["path"], expected, "inbound: {}", inbound);
    }
}

#[tokio::test]
async fn test_query_string_preserved() {
    let upstream = spawn_upstream().await;
    let dir = tempfile::tempdir().unwrap();

    let (_, json) = proxied_get(
        proxy_app(upstream.port(), dir.path()),
        "/api/socket.io/?EIO=4&transport=polling",
    )
    .await;

    assert_eq!(json["path"], "/socket.io/");
    assert_eq!(json["query"], "EIO=4&transport=polling");
}

// == Forwarding Semantics ==

#[tokio::test]
async fn test_host_rewritten_to_upstream() {
    let upstream = spawn_upstream().await;
    let dir = tempfile::tempdir().unwrap();

    let response = proxy_app(upstream.port(), dir.path())
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(header::HOST, "chat.example.com")
                .header(header::AUTHORIZATION, "Bearer token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["host"], format!("127.0.0.1:{}", upstream.port()));
    assert_eq!(json["authorization"], "Bearer token");
}

#[tokio::test]
async fn test_post_body_forwarded() {
    let upstream = spawn_upstream().await;
    let dir = tempfile::tempdir().unwrap();

    let response = proxy_app(upstream.port(), dir.path())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/totp/verify")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"code":"123456"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["method"], "POST");
    assert_eq!(json["path"], "/totp/verify");
    assert_eq!(json["body"], r#"{"code":"123456"}"#);
}

#[tokio::test]
async fn test_cookie_domain_removed() {
    let upstream = spawn_upstream().await;
    let dir = tempfile::tempdir().unwrap();

    let response = proxy_app(upstream.port(), dir.path())
        .oneshot(Request::builder().uri("/api/login").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert_eq!(cookie, "sid=abc; Path=/; HttpOnly");
}

// == Upstream Failure ==

#[tokio::test]
async fn test_upstream_unreachable_returns_bad_gateway() {
    let closed_port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dir = tempfile::tempdir().unwrap();

    let (status, json) = proxied_get(proxy_app(closed_port, dir.path()), "/api/players").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["error"].is_string());
    assert!(!json["error"].as_str().unwrap().is_empty());
}

// == Discovery Endpoints ==

#[tokio::test]
async fn test_config_endpoint_defaults_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(dir.path().join("config.json"));
    let app = create_router_with_static(AppState::from_config(config).unwrap(), dir.path());

    let (status, json) = proxied_get(app, "/config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!({"apiBase": "http://localhost:3000", "apiProxyBase": "/api"})
    );
}

#[tokio::test]
async fn test_config_endpoint_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"api_host": "http://10.0.0.7", "api_port": 5000}"#).unwrap();
    let app = create_router_with_static(
        AppState::from_config(Config::load(&path)).unwrap(),
        dir.path(),
    );

    let (_, json) = proxied_get(app, "/config").await;
    assert_eq!(json["apiBase"], "http://10.0.0.7:5000");
    assert_eq!(json["apiProxyBase"], "/api");
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router_with_static(AppState::from_config(Config::default()).unwrap(), dir.path());

    let (status, json) = proxied_get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"ok": true, "apiBase": "http://localhost:3000"}));
}

// == Upgrades ==

#[tokio::test]
async fn test_declined_upgrade_relayed_as_response() {
    let upstream = spawn_upstream().await;
    let dir = tempfile::tempdir().unwrap();

    let response = proxy_app(upstream.port(), dir.path())
        .oneshot(
            Request::builder()
                .uri("/api/socket.io/?transport=websocket")
                .header(header::CONNECTION, "Upgrade")
                .header(header::UPGRADE, "websocket")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["path"], "/socket.io/");
}

#[tokio::test]
async fn test_upgrade_spliced_end_to_end() {
    let upstream = spawn_upstream().await;
    let dir = tempfile::tempdir().unwrap();
    let proxy = spawn_server(proxy_app(upstream.port(), dir.path())).await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream
        .write_all(
            b"GET /api/socket.io/?EIO=4 HTTP/1.1\r\n\
              Host: localhost\r\n\
              Connection: Upgrade\r\n\
              Upgrade: echo\r\n\r\n",
        )
        .await
        .unwrap();

    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        stream.read_exact(&mut byte).await.unwrap();
        head.push(byte[0]);
    }
    let head = String::from_utf8(head).unwrap().to_ascii_lowercase();
    assert!(head.starts_with("http/1.1 101"), "head: {}", head);
    assert!(head.contains("x-upstream-path: /socket.io/"), "head: {}", head);

    stream.write_all(b"ping").await.unwrap();
    let mut echoed = [0u8; 4];
    stream.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"ping");
}

#[tokio::test]
async fn test_served_over_real_socket() {
    let upstream = spawn_upstream().await;
    let dir = tempfile::tempdir().unwrap();
    let proxy = spawn_server(proxy_app(upstream.port(), dir.path())).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("http://{}/health", proxy))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["ok"], true);

    let echo: Value = client
        .get(format!("http://{}/api/notify/stream?since=3", proxy))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echo["path"], "/notify/stream");
    assert_eq!(echo["query"], "since=3");
}
