//! Response models for the proxy's own endpoints
//!
//! This module defines the DTOs serialized by `/config`, `/health` and
//! error responses.

pub mod responses;

// Re-export commonly used types
pub use responses::{ConfigResponse, ErrorResponse, HealthResponse};
