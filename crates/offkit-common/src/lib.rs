//! # Offkit Common
//!
//! Shared utilities for the Offkit offline-caching shim.
//!
//! Currently this is logging only: a small configuration type and an
//! initializer that binaries call once at startup. Library crates emit
//! `tracing` events and never install a subscriber themselves.

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};
