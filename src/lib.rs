//! Chat Frontend - same-origin server for the chat web client
//!
//! Reverse-proxies `/api` traffic (including WebSocket upgrades) to the chat
//! backend, and provides the tiered key-value cache the client persists
//! fetched payloads into.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod proxy;

pub use api::AppState;
pub use cache::TieredCache;
pub use config::Config;
