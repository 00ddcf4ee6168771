//! Path Rewrite
//!
//! Maps public `/api` paths to upstream paths.

/// Public prefix under which all upstream traffic is served.
pub const API_PREFIX: &str = "/api";

/// Real-time transport subpath, kept verbatim upstream.
pub const REALTIME_PATH: &str = "/socket.io";

/// Notification subpath, kept verbatim upstream.
pub const NOTIFY_PATH: &str = "/notify";

/// Routing class of a proxied path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    RealtimeTransport,
    Notification,
    Api,
}

impl RouteClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::RealtimeTransport => "realtime",
            RouteClass::Notification => "notify",
            RouteClass::Api => "api",
        }
    }
}

/// Rewrites an inbound path and reports its routing class.
///
/// Rules, first match wins:
/// - `/api/socket.io...` → `/socket.io...`
/// - `/api/notify...` → `/notify...`
/// - `/api...` → `...` (so `/api` itself becomes the empty string)
///
/// Paths outside the prefix (including `/apiary`) come back unchanged as
/// [`RouteClass::Api`].
pub fn classify(path: &str) -> (RouteClass, String) {
    let Some(rest) = strip_api_prefix(path) else {
        return (RouteClass::Api, path.to_string());
    };

    if rest.starts_with(REALTIME_PATH) {
        (RouteClass::RealtimeTransport, rest.to_string())
    } else if rest.starts_with(NOTIFY_PATH) {
        (RouteClass::Notification, rest.to_string())
    } else {
        (RouteClass::Api, rest.to_string())
    }
}

/// Upstream path for an inbound path. See [`classify`].
pub fn rewrite_path(path: &str) -> String {
    classify(path).1
}

fn strip_api_prefix(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(API_PREFIX)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}
