//! Unix socket server
//!
//! Accepts connections on a unix socket and serves each one with hyper's
//! HTTP/1 connection driver on its own task. Keep-alive is disabled, so a
//! connection carries exactly one request and closes after the response.

use crate::lifecycle::connection_pair;
use crate::middleware::apply_middleware;
use crate::{Result, ServerError};
use axum::{Extension, Router};
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use std::future::Future;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tower::Layer;
use tracing::{debug, info, warn};

/// Permissions applied to the socket file
pub const SOCKET_MODE: u32 = 0o660;

/// Pause after a failed accept before trying again
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// HTTP server bound to a unix socket
pub struct UnixSocketServer {
    socket_path: PathBuf,
    router: Router,
    listener: UnixListener,
}

impl UnixSocketServer {
    pub fn builder() -> UnixSocketServerBuilder {
        UnixSocketServerBuilder::new()
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Serve until the process ends
    pub async fn serve(self) {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves, then remove the socket file.
    ///
    /// Accept errors are logged and retried; only `shutdown` ends the loop.
    /// Connections already accepted keep running on their own tasks.
    pub async fn serve_with_shutdown<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        info!("Listening on unix:{}", self.socket_path.display());
        tokio::pin!(shutdown);

        let listener = &self.listener;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                (stream, _) = accept_with_retry(|| listener.accept()) => {
                    let router = self.router.clone();
                    tokio::spawn(serve_connection(stream, router));
                }
            }
        }

        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            debug!("Could not remove socket {}: {}", self.socket_path.display(), e);
        }
    }
}

/// Run `accept` until it succeeds, sleeping [`ACCEPT_BACKOFF`] between
/// failures. Transient errors such as EMFILE must not stop the server.
async fn accept_with_retry<F, Fut, T>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(e) => {
                warn!("Accept error: {}, retrying", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn serve_connection(stream: UnixStream, router: Router) {
    let (guard, signal) = connection_pair();
    let service = TowerToHyperService::new(Extension(signal).layer(router));

    if let Err(e) = http1::Builder::new()
        .keep_alive(false)
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        debug!("Connection error: {}", e);
    }

    guard.close();
}

/// Builder for UnixSocketServer
pub struct UnixSocketServerBuilder {
    socket_path: Option<PathBuf>,
    router: Option<Router>,
}

impl UnixSocketServerBuilder {
    pub fn new() -> Self {
        Self {
            socket_path: None,
            router: None,
        }
    }

    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = Some(path.into());
        self
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Bind the socket.
    ///
    /// A stale socket file is removed first and the parent directory is
    /// created when missing. Must be called inside a tokio runtime.
    pub fn bind(self) -> Result<UnixSocketServer> {
        let socket_path = self
            .socket_path
            .ok_or_else(|| ServerError::RouterError("socket path not set".to_string()))?;
        let router = apply_middleware(self.router.unwrap_or_default());

        let bind_err = |source: std::io::Error| ServerError::Bind {
            path: socket_path.display().to_string(),
            source,
        };

        if let Some(dir) = socket_path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(bind_err)?;
            }
        }

        if socket_path.exists() {
            warn!("Removing stale socket {}", socket_path.display());
            std::fs::remove_file(&socket_path).map_err(bind_err)?;
        }

        let listener = UnixListener::bind(&socket_path).map_err(bind_err)?;
        std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(SOCKET_MODE))
            .map_err(bind_err)?;

        Ok(UnixSocketServer {
            socket_path,
            router,
            listener,
        })
    }
}

impl Default for UnixSocketServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
