//! cb-http: Unix socket HTTP server
//!
//! Serves an axum router over a unix stream socket, the transport Docker
//! uses to reach remote network drivers.
//!
//! ```text
//! cni-bridge-service
//!     └── cb-http (this crate)
//!         ├── UnixListener accept loop, one hyper HTTP/1 task per connection
//!         ├── ConnectionSignal attached to every request (fires on close)
//!         ├── Middleware stack (tracing, request logging)
//!         └── Router composition
//!             ├── /Plugin.Activate, /status
//!             └── /NetworkDriver.*   → cb_network::create_router()
//! ```

pub mod lifecycle;
pub mod middleware;
pub mod router;
pub mod server;

// Re-export main types
pub use lifecycle::{connection_pair, ConnectionGuard, ConnectionSignal};
pub use middleware::apply_middleware;
pub use router::RouterBuilder;
pub use server::{UnixSocketServer, UnixSocketServerBuilder};

// Re-export axum for convenience - other crates use this
pub use axum;
pub use tower;

/// Error types for the HTTP server
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Server binding error on {path}: {source}")]
    Bind {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Router configuration error: {0}")]
    RouterError(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;
