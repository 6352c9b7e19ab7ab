//! Core types and utilities for cni-bridge
//!
//! # Modules
//!
//! - `config`: Environment file loading and the typed bridge configuration
//! - `error`: Error types and Result alias
//! - `runtime`: The container runtime seam consumed by the cache and driver
//! - `types`: Network, container and event records

pub mod config;
pub mod error;
pub mod runtime;
pub mod types;

// Re-exports
pub use config::BridgeConfig;
pub use error::{Error, Result};
pub use runtime::RuntimeClient;
pub use types::*;
