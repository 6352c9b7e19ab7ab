use thiserror::Error;

/// Failures resolving runtime identifiers from the cache
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Container {0} not found")]
    NotFound(String),

    #[error("Container {0} not running")]
    NotRunning(String),
}
