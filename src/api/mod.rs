//! API Module
//!
//! HTTP handlers and routing for the same-origin frontend server.
//!
//! # Endpoints
//! - `ANY /api/*` - Reverse-proxied to the upstream backend
//! - `GET /config` - Where the client should send API calls
//! - `GET /health` - Health check endpoint
//! - everything else - Static assets

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::{create_router, create_router_with_static, STATIC_ROOT};
