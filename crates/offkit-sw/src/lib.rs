//! # Offkit SW
//!
//! The offline-caching shim itself: a page-load [`registrar`] and a
//! cache-first [`worker`], both written against the platform seam in
//! `offkit-platform`.
//!
//! The strategy is deliberately small:
//!
//! - **Install**: fetch the shell manifest's paths and commit them into a
//!   versioned cache, all or nothing
//! - **Fetch**: answer from cache when possible, otherwise pass the request
//!   to the network untouched; network responses are never written back
//! - **Activate**: delete every cache whose name is not the current version
//!
//! Updating the shell is a one-line change: ship a manifest with a new
//! cache name and let activation sweep the old one away.

pub mod manifest;
pub mod registrar;
pub mod worker;

pub use manifest::ShellManifest;
pub use registrar::{register_on_load, RegistrationStatus, DEFAULT_SCRIPT_URL};
pub use worker::ShellWorker;
