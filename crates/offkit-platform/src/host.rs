//! Worker host: registration, lifecycle dispatch, and the capability handle.
//!
//! [`WorkerHost`] plays the part of the browser's service worker container.
//! It owns the cache storage and the network backend, accepts worker script
//! registrations, and dispatches install / fetch / activate to whichever
//! [`WorkerScript`] holds the relevant slot. [`Navigator`] is the page-side
//! handle: a platform without service worker support simply has none.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use tokio::sync::RwLock;
use tracing::{debug, error, info, trace, warn};

use crate::cache::{CacheEntry, CacheStorage};
use crate::net::{Network, NetworkError};
use crate::{FetchRequest, FetchResponse};

/// Errors raised while registering a worker script.
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("Invalid script URL: {0:?}")]
    InvalidScriptUrl(String),
}

/// Errors raised by worker handlers and host dispatch.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Precache fetch for {path} failed: {source}")]
    Precache {
        path: String,
        #[source]
        source: NetworkError,
    },

    #[error("Precache fetch for {path} returned {status}")]
    PrecacheStatus { path: String, status: StatusCode },

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("State error: {0}")]
    State(String),
}

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    fn next() -> Self {
        WorkerId(NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric id.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Lifecycle state of a worker version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkerState {
    /// Install handler is running.
    #[default]
    Installing,
    /// Installed, waiting to be activated.
    Installed,
    /// Activate handler is running.
    Activating,
    /// Active and handling fetches.
    Activated,
    /// Superseded or failed; will never run again.
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        }
    }
}

/// Snapshot of a worker version's identity and state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub id: WorkerId,
    pub script_url: String,
    pub state: WorkerState,
}

struct Version {
    id: WorkerId,
    script_url: String,
    state: WorkerState,
    script: Arc<dyn WorkerScript>,
}

impl Version {
    fn info(&self) -> VersionInfo {
        VersionInfo {
            id: self.id,
            script_url: self.script_url.clone(),
            state: self.state,
        }
    }
}

#[derive(Default)]
struct Registration {
    waiting: Option<Version>,
    active: Option<Version>,
}

/// A worker script's event handlers.
///
/// Every handler is optional; the defaults do nothing on install and
/// activate and pass fetches straight to the network.
#[async_trait]
pub trait WorkerScript: Send + Sync {
    /// Runs once when the version is registered.
    ///
    /// An error here makes the version redundant without touching whatever
    /// worker is currently active.
    async fn install(&self, _ctx: &WorkerContext) -> Result<(), WorkerError> {
        Ok(())
    }

    /// Handles a page fetch while this version is active.
    async fn fetch(
        &self,
        ctx: &WorkerContext,
        request: &FetchRequest,
    ) -> Result<FetchResponse, WorkerError> {
        Ok(ctx.network_fetch(request).await?)
    }

    /// Runs once when the version takes over the active slot.
    async fn activate(&self, _ctx: &WorkerContext) -> Result<(), WorkerError> {
        Ok(())
    }
}

/// Platform capabilities handed to a running handler.
#[derive(Clone)]
pub struct WorkerContext {
    caches: Arc<RwLock<CacheStorage>>,
    network: Arc<dyn Network>,
}

impl WorkerContext {
    /// Create a context over the given storage and network.
    pub fn new(caches: Arc<RwLock<CacheStorage>>, network: Arc<dyn Network>) -> Self {
        Self { caches, network }
    }

    /// Fetch every path and commit the lot into a named cache.
    ///
    /// All fetches are staged before anything is written: if any path fails
    /// or comes back with a non-success status, the cache is left exactly as
    /// it was.
    pub async fn precache(&self, cache_name: &str, paths: &[String]) -> Result<(), WorkerError> {
        let mut staged = Vec::with_capacity(paths.len());
        for path in paths {
            let request = FetchRequest::get(path.clone());
            let response =
                self.network
                    .fetch(&request)
                    .await
                    .map_err(|source| WorkerError::Precache {
                        path: path.clone(),
                        source,
                    })?;
            if !response.ok() {
                return Err(WorkerError::PrecacheStatus {
                    path: path.clone(),
                    status: response.status,
                });
            }
            staged.push((path.clone(), CacheEntry::from_response(&response)));
        }

        let mut storage = self.caches.write().await;
        let cache = storage.open(cache_name);
        for (path, entry) in staged {
            cache.put(path, entry);
        }
        debug!(cache = cache_name, entries = cache.len(), "Precache committed");
        Ok(())
    }

    /// Look up a request across all caches.
    pub async fn match_request(&self, request: &FetchRequest) -> Option<FetchResponse> {
        self.caches.write().await.match_request(request)
    }

    /// Fetch from the network, bypassing the caches.
    pub async fn network_fetch(
        &self,
        request: &FetchRequest,
    ) -> Result<FetchResponse, NetworkError> {
        self.network.fetch(request).await
    }

    /// Names of all caches.
    pub async fn cache_names(&self) -> Vec<String> {
        self.caches.read().await.keys()
    }

    /// Delete a cache by name. Returns true if it existed.
    pub async fn delete_cache(&self, name: &str) -> bool {
        self.caches.write().await.delete(name)
    }
}

/// The platform's service worker container.
pub struct WorkerHost {
    registration: RwLock<Registration>,
    /// Cache storage shared with running handlers.
    pub caches: Arc<RwLock<CacheStorage>>,
    network: Arc<dyn Network>,
    registrations: AtomicU64,
}

impl WorkerHost {
    /// Create a host over the given network backend.
    pub fn new(network: Arc<dyn Network>) -> Self {
        Self {
            registration: RwLock::new(Registration::default()),
            caches: Arc::new(RwLock::new(CacheStorage::new())),
            network,
            registrations: AtomicU64::new(0),
        }
    }

    /// Context handed to this host's handlers.
    pub fn context(&self) -> WorkerContext {
        WorkerContext::new(Arc::clone(&self.caches), Arc::clone(&self.network))
    }

    /// Register a worker script and run its install handler.
    ///
    /// Registration succeeds as long as the script URL is acceptable; a
    /// failed install is reported through the returned state, not through
    /// `Err`. On success the version lands in the waiting slot, replacing
    /// any version already waiting there.
    pub async fn register(
        &self,
        script_url: &str,
        script: Arc<dyn WorkerScript>,
    ) -> Result<VersionInfo, RegisterError> {
        self.registrations.fetch_add(1, Ordering::Relaxed);
        if script_url.is_empty() || !script_url.starts_with('/') {
            return Err(RegisterError::InvalidScriptUrl(script_url.to_string()));
        }

        let mut version = Version {
            id: WorkerId::next(),
            script_url: script_url.to_string(),
            state: WorkerState::Installing,
            script,
        };
        debug!(worker = version.id.raw(), script = script_url, "Installing worker");

        let ctx = self.context();
        match version.script.install(&ctx).await {
            Ok(()) => {
                version.state = WorkerState::Installed;
                info!(worker = version.id.raw(), script = script_url, "Worker installed");
                let snapshot = version.info();
                let mut registration = self.registration.write().await;
                if let Some(mut old) = registration.waiting.take() {
                    old.state = WorkerState::Redundant;
                    debug!(worker = old.id.raw(), "Discarded superseded waiting worker");
                }
                registration.waiting = Some(version);
                Ok(snapshot)
            }
            Err(e) => {
                version.state = WorkerState::Redundant;
                error!(worker = version.id.raw(), error = %e, "Worker install failed");
                Ok(version.info())
            }
        }
    }

    /// Promote the waiting worker to active and run its activate handler.
    ///
    /// A failing activate handler is logged but does not stop the takeover.
    pub async fn activate(&self) -> Result<VersionInfo, WorkerError> {
        let mut version = {
            let mut registration = self.registration.write().await;
            registration
                .waiting
                .take()
                .ok_or_else(|| WorkerError::State("no waiting worker to activate".to_string()))?
        };

        version.state = WorkerState::Activating;
        let ctx = self.context();
        if let Err(e) = version.script.activate(&ctx).await {
            warn!(worker = version.id.raw(), error = %e, "Activate handler failed");
        }
        version.state = WorkerState::Activated;
        info!(worker = version.id.raw(), script = %version.script_url, "Worker activated");

        let snapshot = version.info();
        let mut registration = self.registration.write().await;
        if let Some(mut old) = registration.active.take() {
            old.state = WorkerState::Redundant;
            debug!(worker = old.id.raw(), "Retired previous active worker");
        }
        registration.active = Some(version);
        Ok(snapshot)
    }

    /// Route a page fetch through the active worker.
    ///
    /// With no active worker, the request goes straight to the network.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Result<FetchResponse, WorkerError> {
        let active = {
            let registration = self.registration.read().await;
            registration
                .active
                .as_ref()
                .map(|version| (version.id, Arc::clone(&version.script)))
        };

        match active {
            Some((id, script)) => {
                trace!(worker = id.raw(), path = %request.path, "Dispatching fetch");
                let ctx = self.context();
                script.fetch(&ctx, request).await
            }
            None => Ok(self.network.fetch(request).await?),
        }
    }

    /// Snapshot of the active worker, if any.
    pub async fn active(&self) -> Option<VersionInfo> {
        self.registration.read().await.active.as_ref().map(Version::info)
    }

    /// Snapshot of the waiting worker, if any.
    pub async fn waiting(&self) -> Option<VersionInfo> {
        self.registration.read().await.waiting.as_ref().map(Version::info)
    }

    /// How many registration calls this host has received.
    pub fn registration_count(&self) -> u64 {
        self.registrations.load(Ordering::Relaxed)
    }
}

/// Page-side capability handle.
///
/// Mirrors the navigator object a page sees: on a capable platform it
/// exposes the worker container, on any other platform it exposes nothing.
#[derive(Clone, Default)]
pub struct Navigator {
    service_worker: Option<Arc<WorkerHost>>,
}

impl Navigator {
    /// A navigator on a platform with service worker support.
    pub fn with_service_worker(host: Arc<WorkerHost>) -> Self {
        Self {
            service_worker: Some(host),
        }
    }

    /// A navigator on a platform without service worker support.
    pub fn without_service_worker() -> Self {
        Self::default()
    }

    /// The worker container, if the platform has one.
    pub fn service_worker(&self) -> Option<&Arc<WorkerHost>> {
        self.service_worker.as_ref()
    }
}
