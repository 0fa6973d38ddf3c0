//! # Offkit Platform
//!
//! Host-platform collaborator for the Offkit offline-caching shim.
//!
//! A browser hands a service worker three things: lifecycle events, a named
//! cache store, and the network. This crate models that platform surface so
//! the shim can be written and exercised without a browser around it.
//!
//! ## Features
//!
//! - **Worker lifecycle**: install / fetch / activate dispatch with
//!   installing → installed → activating → activated → redundant bookkeeping
//! - **Cache API**: named caches, precache population, cache matching
//! - **Network seam**: an HTTP backend and a canned in-memory backend
//! - **Capability handle**: the page-side `Navigator` the registrar checks
//!
//! ## Architecture
//!
//! ```text
//! Navigator (page side)
//!     └── WorkerHost
//!             ├── Registration (waiting / active worker version)
//!             ├── CacheStorage
//!             │       └── Cache (name → path → CacheEntry)
//!             └── Network (HttpNetwork | StaticNetwork)
//! ```

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};

pub mod cache;
pub mod host;
pub mod net;

pub use cache::{Cache, CacheEntry, CacheStats, CacheStorage};
pub use host::{
    Navigator, RegisterError, VersionInfo, WorkerContext, WorkerError, WorkerHost, WorkerId,
    WorkerScript, WorkerState,
};
pub use net::{HttpNetwork, Network, NetworkConfig, NetworkError, StaticNetwork};

/// A request as seen by the worker's fetch handler.
///
/// Paths are rooted against the page origin; the platform, not the worker,
/// knows what origin that is.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Rooted resource path, e.g. `/static/css/style.css`.
    pub path: String,
    /// HTTP method.
    pub method: Method,
    /// Request headers.
    pub headers: HeaderMap,
}

impl FetchRequest {
    /// Create a request with the given method.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            headers: HeaderMap::new(),
        }
    }

    /// Create a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Add a header.
    pub fn header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// A response handed back to the page.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
    /// Whether the cache, rather than the network, produced this response.
    pub from_cache: bool,
}

impl FetchResponse {
    /// Create a network-origin response with no headers.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            from_cache: false,
        }
    }

    /// Check whether the status is a success (2xx).
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_get() {
        let request = FetchRequest::get("/login");
        assert_eq!(request.path, "/login");
        assert_eq!(request.method, Method::GET);
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_request_header_builder() {
        let request = FetchRequest::get("/").header(
            http::header::ACCEPT,
            http::HeaderValue::from_static("text/html"),
        );
        assert!(request.headers.contains_key("accept"));
    }

    #[test]
    fn test_response_ok() {
        assert!(FetchResponse::new(StatusCode::OK, "body").ok());
        assert!(!FetchResponse::new(StatusCode::NOT_FOUND, "").ok());
        assert!(!FetchResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "").ok());
    }

    #[test]
    fn test_response_defaults_to_network_origin() {
        let response = FetchResponse::new(StatusCode::OK, "body");
        assert!(!response.from_cache);
    }
}
