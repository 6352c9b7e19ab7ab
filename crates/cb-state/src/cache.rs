//! Shared network and container view
//!
//! The network map is written by the driver (register on CreateNetwork,
//! unregister on DeleteNetwork). The container map is written only by the
//! watcher loop. Every access goes through one `RwLock`.

use cb_core::{ContainerRecord, NetworkRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::StateError;

/// Network namespace path of a running process
pub fn netns_path(pid: i64) -> String {
    format!("/proc/{}/ns/net", pid)
}

#[derive(Debug, Default)]
struct CacheInner {
    networks: HashMap<String, NetworkRecord>,
    containers: HashMap<String, ContainerRecord>,
}

/// Cloneable handle to the cache
#[derive(Debug, Clone, Default)]
pub struct StateCache {
    inner: Arc<RwLock<CacheInner>>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a network
    pub async fn register_network(&self, network: NetworkRecord) {
        info!(
            "Watch network {} ({}, type {})",
            network.id, network.name, network.plugin_type
        );
        let mut inner = self.inner.write().await;
        inner.networks.insert(network.id.clone(), network);
    }

    /// Remove a network; returns whether it was present
    pub async fn unregister_network(&self, id: &str) -> bool {
        info!("Unwatch network {}", id);
        let mut inner = self.inner.write().await;
        inner.networks.remove(id).is_some()
    }

    pub async fn lookup_network(&self, id: &str) -> Option<NetworkRecord> {
        self.inner.read().await.networks.get(id).cloned()
    }

    /// Insert or replace a container.
    ///
    /// A non-empty sandbox key belongs to at most one live container; any
    /// other container still holding the same key is evicted.
    pub async fn insert_container(&self, container: ContainerRecord) {
        let mut inner = self.inner.write().await;

        let key = container.sandbox_key();
        if !key.is_empty() {
            let stale: Vec<String> = inner
                .containers
                .values()
                .filter(|c| c.id != container.id && c.sandbox_key() == key)
                .map(|c| c.id.clone())
                .collect();
            for id in stale {
                warn!(
                    "Sandbox key {} moved from container {} to {}; evicting {}",
                    key, id, container.id, id
                );
                inner.containers.remove(&id);
            }
        }

        debug!(
            "Tracking container {} (pid {}, sandbox {})",
            container.id,
            container.pid,
            container.sandbox_key()
        );
        inner.containers.insert(container.id.clone(), container);
    }

    /// Remove a container; returns whether it was present
    pub async fn remove_container(&self, id: &str) -> bool {
        let mut inner = self.inner.write().await;
        inner.containers.remove(id).is_some()
    }

    /// Find the live container whose sandbox key equals `key`
    pub async fn lookup_container_by_sandbox_key(&self, key: &str) -> Option<ContainerRecord> {
        if key.is_empty() {
            return None;
        }
        let inner = self.inner.read().await;
        inner
            .containers
            .values()
            .find(|c| c.sandbox_key() == key)
            .cloned()
    }

    pub async fn lookup_container(&self, id: &str) -> Option<ContainerRecord> {
        self.inner.read().await.containers.get(id).cloned()
    }

    /// Resolve the network namespace path of a tracked container
    pub async fn resolve_netns_path(&self, container_id: &str) -> Result<String, StateError> {
        let inner = self.inner.read().await;
        let container = inner
            .containers
            .get(container_id)
            .ok_or_else(|| StateError::NotFound(container_id.to_string()))?;

        if !container.is_running() {
            return Err(StateError::NotRunning(container_id.to_string()));
        }

        Ok(netns_path(container.pid))
    }

    pub async fn network_count(&self) -> usize {
        self.inner.read().await.networks.len()
    }

    pub async fn container_count(&self) -> usize {
        self.inner.read().await.containers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_unregister_sequences() {
        let cache = StateCache::new();
        let nw = NetworkRecord::new("net1", "cni-net", "bridge");

        cache.register_network(nw.clone()).await;
        cache.register_network(nw.clone()).await;
        assert_eq!(cache.lookup_network("net1").await, Some(nw.clone()));
        assert_eq!(cache.network_count().await, 1);

        assert!(cache.unregister_network("net1").await);
        assert!(!cache.unregister_network("net1").await);
        assert!(cache.lookup_network("net1").await.is_none());

        cache.register_network(nw.clone()).await;
        assert!(cache.lookup_network("net1").await.is_some());
    }

    #[tokio::test]
    async fn test_register_replaces_record() {
        let cache = StateCache::new();
        cache
            .register_network(NetworkRecord::new("net1", "old", "bridge"))
            .await;
        cache
            .register_network(NetworkRecord::new("net1", "new", "macvlan"))
            .await;

        let nw = cache.lookup_network("net1").await.unwrap();
        assert_eq!(nw.name, "new");
        assert_eq!(nw.plugin_type, "macvlan");
    }

    #[tokio::test]
    async fn test_resolve_netns_path() {
        let cache = StateCache::new();
        cache
            .insert_container(ContainerRecord::new("c1", "sb1", 4242))
            .await;

        assert_eq!(
            cache.resolve_netns_path("c1").await.unwrap(),
            "/proc/4242/ns/net"
        );
    }

    #[tokio::test]
    async fn test_resolve_netns_not_running() {
        let cache = StateCache::new();
        cache.insert_container(ContainerRecord::new("c0", "sb0", 0)).await;
        cache
            .insert_container(ContainerRecord::new("cneg", "sbneg", -7))
            .await;

        assert_eq!(
            cache.resolve_netns_path("c0").await,
            Err(StateError::NotRunning("c0".to_string()))
        );
        assert_eq!(
            cache.resolve_netns_path("cneg").await,
            Err(StateError::NotRunning("cneg".to_string()))
        );
    }

    #[tokio::test]
    async fn test_resolve_netns_unknown() {
        let cache = StateCache::new();
        assert_eq!(
            cache.resolve_netns_path("never").await,
            Err(StateError::NotFound("never".to_string()))
        );
    }

    #[tokio::test]
    async fn test_lookup_by_sandbox_key() {
        let cache = StateCache::new();
        cache.insert_container(ContainerRecord::new("c1", "sb1", 10)).await;
        cache.insert_container(ContainerRecord::new("c2", "sb2", 11)).await;

        assert_eq!(
            cache.lookup_container_by_sandbox_key("sb2").await.unwrap().id,
            "c2"
        );
        assert!(cache.lookup_container_by_sandbox_key("sb3").await.is_none());
        assert!(cache.lookup_container_by_sandbox_key("").await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_sandbox_key_evicts_older() {
        let cache = StateCache::new();
        cache.insert_container(ContainerRecord::new("old", "sb", 10)).await;
        cache.insert_container(ContainerRecord::new("new", "sb", 11)).await;

        assert_eq!(
            cache.lookup_container_by_sandbox_key("sb").await.unwrap().id,
            "new"
        );
        assert!(cache.lookup_container("old").await.is_none());
        assert_eq!(cache.container_count().await, 1);
    }

    #[tokio::test]
    async fn test_empty_sandbox_keys_coexist() {
        let cache = StateCache::new();
        cache.insert_container(ContainerRecord::new("a", "", 0)).await;
        cache.insert_container(ContainerRecord::new("b", "", 0)).await;
        assert_eq!(cache.container_count().await, 2);
    }
}
