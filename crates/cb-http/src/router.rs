//! Router Composition
//!
//! Plugin paths are absolute (`/Plugin.Activate`, `/NetworkDriver.Join`), so
//! services are merged at the root rather than nested under a prefix.

use axum::http::{StatusCode, Uri};
use axum::Router;
use tracing::{info, warn};

/// Builder for composing service routers
pub struct RouterBuilder {
    router: Router,
    services: Vec<&'static str>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            services: Vec::new(),
        }
    }

    /// Merge a service router at the root
    pub fn merge(mut self, name: &'static str, router: Router) -> Self {
        info!("Mounting service '{}'", name);
        self.router = self.router.merge(router);
        self.services.push(name);
        self
    }

    /// Names of the merged services
    pub fn services(&self) -> &[&'static str] {
        &self.services
    }

    /// Unclaimed paths answer 404
    pub fn build(self) -> Router {
        self.router.fallback(not_found)
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Fallback for paths no service claims
pub async fn not_found(uri: Uri) -> StatusCode {
    warn!("Not found: {}", uri);
    StatusCode::NOT_FOUND
}
