//! Network seam behind the worker host.
//!
//! The host never talks HTTP directly; it goes through [`Network`]. The two
//! backends here cover the two lives of the shim: [`HttpNetwork`] for a real
//! origin over reqwest, [`StaticNetwork`] for deterministic canned routes
//! with per-path hit counters and an offline switch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use hashbrown::HashMap;
use http::StatusCode;
use tokio::sync::RwLock;
use tracing::{debug, info, trace};
use url::Url;

use crate::{FetchRequest, FetchResponse};

/// Network errors.
///
/// An HTTP error status is not a network error: a 404 or 500 still comes
/// back as an ordinary [`FetchResponse`]. `Err` means the request could not
/// be carried out at all.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unreachable: {0}")]
    Unreachable(String),

    #[error("Network offline")]
    Offline,
}

/// Something the host can fetch from.
#[async_trait]
pub trait Network: Send + Sync {
    /// Carry out a request against the origin.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, NetworkError>;
}

/// Configuration for [`HttpNetwork`].
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// User agent string sent with every request.
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: "Offkit/1.0".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Real HTTP backend: resolves rooted paths against one origin.
pub struct HttpNetwork {
    client: reqwest::Client,
    origin: Url,
}

impl HttpNetwork {
    /// Create a backend for the given origin.
    pub fn new(origin: Url, config: NetworkConfig) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;

        info!(origin = %origin, "HTTP network backend ready");
        Ok(Self { client, origin })
    }

    fn resolve(&self, path: &str) -> Result<Url, NetworkError> {
        self.origin
            .join(path)
            .map_err(|e| NetworkError::InvalidUrl(format!("{path}: {e}")))
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, NetworkError> {
        let url = self.resolve(&request.path)?;
        debug!(method = %request.method, url = %url, "Fetching over HTTP");

        let mut builder = self.client.request(request.method.clone(), url);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        trace!(path = %request.path, status = %status, bytes = body.len(), "HTTP response");
        Ok(FetchResponse {
            status,
            headers,
            body,
            from_cache: false,
        })
    }
}

#[derive(Debug, Clone)]
struct CannedRoute {
    response: Option<FetchResponse>,
    hits: u64,
}

/// Canned in-memory backend for tests and smoke runs.
///
/// Every route keeps a hit counter, so a test can assert not just what came
/// back but how many times the network was actually touched.
#[derive(Default)]
pub struct StaticNetwork {
    routes: RwLock<HashMap<String, CannedRoute>>,
    offline: AtomicBool,
}

impl StaticNetwork {
    /// Create a backend with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a canned body for a path.
    pub async fn route(&self, path: impl Into<String>, status: StatusCode, body: impl Into<Bytes>) {
        let route = CannedRoute {
            response: Some(FetchResponse::new(status, body)),
            hits: 0,
        };
        self.routes.write().await.insert(path.into(), route);
    }

    /// Make a path fail with [`NetworkError::Unreachable`] when fetched.
    pub async fn unreachable(&self, path: impl Into<String>) {
        let route = CannedRoute {
            response: None,
            hits: 0,
        };
        self.routes.write().await.insert(path.into(), route);
    }

    /// Flip the whole backend offline or back on.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// How many fetches reached a path.
    pub async fn hits(&self, path: &str) -> u64 {
        self.routes
            .read()
            .await
            .get(path)
            .map(|route| route.hits)
            .unwrap_or(0)
    }

    /// Total fetches across all routes.
    pub async fn total_hits(&self) -> u64 {
        self.routes.read().await.values().map(|route| route.hits).sum()
    }
}

#[async_trait]
impl Network for StaticNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, NetworkError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Offline);
        }

        let mut routes = self.routes.write().await;
        match routes.get_mut(&request.path) {
            Some(route) => {
                route.hits += 1;
                match &route.response {
                    Some(response) => Ok(response.clone()),
                    None => Err(NetworkError::Unreachable(request.path.clone())),
                }
            }
            None => Err(NetworkError::Unreachable(request.path.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_config_default() {
        let config = NetworkConfig::default();
        assert_eq!(config.user_agent, "Offkit/1.0");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_static_network_serves_routes() {
        let network = StaticNetwork::new();
        network.route("/", StatusCode::OK, "<html>").await;

        let response = network.fetch(&FetchRequest::get("/")).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, Bytes::from("<html>"));
        assert!(!response.from_cache);
    }

    #[tokio::test]
    async fn test_static_network_unknown_path_is_unreachable() {
        let network = StaticNetwork::new();
        let err = network.fetch(&FetchRequest::get("/missing")).await.unwrap_err();
        assert!(matches!(err, NetworkError::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_static_network_offline_switch() {
        let network = StaticNetwork::new();
        network.route("/", StatusCode::OK, "").await;

        network.set_offline(true);
        let err = network.fetch(&FetchRequest::get("/")).await.unwrap_err();
        assert!(matches!(err, NetworkError::Offline));

        network.set_offline(false);
        assert!(network.fetch(&FetchRequest::get("/")).await.is_ok());
    }

    #[tokio::test]
    async fn test_static_network_counts_hits() {
        let network = StaticNetwork::new();
        network.route("/a", StatusCode::OK, "").await;
        network.route("/b", StatusCode::OK, "").await;

        network.fetch(&FetchRequest::get("/a")).await.unwrap();
        network.fetch(&FetchRequest::get("/a")).await.unwrap();
        network.fetch(&FetchRequest::get("/b")).await.unwrap();

        assert_eq!(network.hits("/a").await, 2);
        assert_eq!(network.hits("/b").await, 1);
        assert_eq!(network.hits("/c").await, 0);
        assert_eq!(network.total_hits().await, 3);
    }

    #[tokio::test]
    async fn test_static_network_injected_failure_counts_as_hit() {
        let network = StaticNetwork::new();
        network.unreachable("/flaky").await;

        let err = network.fetch(&FetchRequest::get("/flaky")).await.unwrap_err();
        assert!(matches!(err, NetworkError::Unreachable(_)));
        assert_eq!(network.hits("/flaky").await, 1);
    }

    #[tokio::test]
    async fn test_http_network_fetches_from_server() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/static/js/pwa.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("console.log('pwa');"))
            .mount(&server)
            .await;

        let origin = Url::parse(&server.uri()).unwrap();
        let network = HttpNetwork::new(origin, NetworkConfig::default()).unwrap();

        let response = network
            .fetch(&FetchRequest::get("/static/js/pwa.js"))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, Bytes::from("console.log('pwa');"));
    }

    #[tokio::test]
    async fn test_http_network_passes_error_status_through() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let origin = Url::parse(&server.uri()).unwrap();
        let network = HttpNetwork::new(origin, NetworkConfig::default()).unwrap();

        let response = network.fetch(&FetchRequest::get("/missing")).await.unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(!response.ok());
    }

    #[tokio::test]
    async fn test_http_network_connection_failure_is_err() {
        // A pooled server (`MockServer::start`) keeps its listener open after
        // drop; an exclusive one actually frees the port, which this test needs.
        let server = wiremock::MockServer::builder().start().await;
        let origin = Url::parse(&server.uri()).unwrap();
        drop(server);

        let network = HttpNetwork::new(origin, NetworkConfig::default()).unwrap();
        assert!(network.fetch(&FetchRequest::get("/")).await.is_err());
    }
}
