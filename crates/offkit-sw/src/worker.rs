//! The cache-first offline worker.

use async_trait::async_trait;
use offkit_platform::{FetchRequest, FetchResponse, WorkerContext, WorkerError, WorkerScript};
use tracing::{debug, info};

use crate::manifest::ShellManifest;

/// Cache-first worker over a fixed shell manifest.
///
/// Install precaches the manifest's paths into its versioned cache, fetch
/// answers from cache before touching the network, and activate deletes
/// every cache left over from older versions. A response fetched from the
/// network on a cache miss is never written back; only install populates
/// the cache, so what is served offline is exactly what was installed.
#[derive(Debug, Clone, Default)]
pub struct ShellWorker {
    manifest: ShellManifest,
}

impl ShellWorker {
    /// Create a worker serving the given shell.
    pub fn new(manifest: ShellManifest) -> Self {
        Self { manifest }
    }

    /// The shell this worker serves.
    pub fn manifest(&self) -> &ShellManifest {
        &self.manifest
    }
}

#[async_trait]
impl WorkerScript for ShellWorker {
    async fn install(&self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        info!(
            cache = %self.manifest.cache_name,
            paths = self.manifest.precache.len(),
            "Precaching app shell"
        );
        ctx.precache(&self.manifest.cache_name, &self.manifest.precache)
            .await
    }

    async fn fetch(
        &self,
        ctx: &WorkerContext,
        request: &FetchRequest,
    ) -> Result<FetchResponse, WorkerError> {
        if let Some(response) = ctx.match_request(request).await {
            return Ok(response);
        }
        Ok(ctx.network_fetch(request).await?)
    }

    async fn activate(&self, ctx: &WorkerContext) -> Result<(), WorkerError> {
        for name in ctx.cache_names().await {
            if name != self.manifest.cache_name {
                ctx.delete_cache(&name).await;
                debug!(cache = %name, "Deleted stale cache");
            }
        }
        Ok(())
    }
}
