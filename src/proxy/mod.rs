//! Proxy Module
//!
//! Same-origin reverse proxy for the chat backend. Everything under `/api`
//! is rewritten and forwarded to the configured upstream; upgrade
//! handshakes are relayed and then spliced as raw byte streams.

mod forward;
mod rewrite;
mod upgrade;

pub use forward::{strip_cookie_domain, Forwarder, MAX_REQUEST_BODY};
pub use rewrite::{classify, rewrite_path, RouteClass, API_PREFIX, NOTIFY_PATH, REALTIME_PATH};
pub use upgrade::is_upgrade_request;
