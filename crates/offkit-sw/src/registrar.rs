//! Page-load registration hook.
//!
//! The page side of the shim does exactly one thing on load: if the
//! platform exposes a service worker container, register the worker script
//! once and log how it went. A platform without support means no call and
//! no error, and a failed registration is logged and dropped. There is no
//! retry; the next page load will try again anyway.

use std::sync::Arc;

use offkit_platform::{Navigator, WorkerScript};
use tracing::{debug, error, info};

/// Where the worker script conventionally lives.
pub const DEFAULT_SCRIPT_URL: &str = "/static/js/service-worker.js";

/// Outcome of the page-load hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    /// The platform accepted the registration.
    Registered,
    /// The platform has no service worker support; nothing was attempted.
    Unsupported,
    /// Registration was attempted and rejected.
    Failed,
}

/// Run the page-load hook: check capability, register once, log the outcome.
pub async fn register_on_load(
    navigator: &Navigator,
    script_url: &str,
    script: Arc<dyn WorkerScript>,
) -> RegistrationStatus {
    let Some(container) = navigator.service_worker() else {
        debug!("Service workers unsupported on this platform, skipping registration");
        return RegistrationStatus::Unsupported;
    };

    match container.register(script_url, script).await {
        Ok(info) => {
            info!(
                worker = info.id.raw(),
                script = script_url,
                "Service worker registered"
            );
            RegistrationStatus::Registered
        }
        Err(e) => {
            error!(error = %e, script = script_url, "Service worker registration failed");
            RegistrationStatus::Failed
        }
    }
}
