//! Network driver
//!
//! Translates remote driver verbs into state cache lookups and CNI plugin
//! invocations. Only Join does real work; endpoint verbs are acknowledged
//! and CreateNetwork registers the network once the runtime has committed
//! it, which is after the request's connection has closed.

use cb_core::RuntimeClient;
use cb_http::ConnectionSignal;
use cb_plugins::{CniCommand, PluginInvoker};
use cb_state::StateCache;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::DriverError;
use crate::netconf::NetconfLoader;
use crate::wire::{
    CreateEndpointRequest, CreateEndpointResponse, CreateNetworkRequest, DeleteNetworkRequest,
    EndpointInfoResponse, EndpointRequest, InterfaceName, JoinRequest, JoinResponse, LeaveRequest,
};

/// Interface name prefix inside the sandbox
pub const DST_PREFIX: &str = "eth";

const SRC_NAME_PREFIX: &str = "cni";
const SRC_NAME_ID_LEN: usize = 12;

#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Reported by the status endpoint
    pub version: String,
    /// Upper bound on waiting for the CreateNetwork connection to close
    pub register_timeout: Duration,
    pub netconf_dir: Option<PathBuf>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            register_timeout: Duration::from_secs(cb_core::config::DEFAULT_REGISTER_TIMEOUT_SECS),
            netconf_dir: None,
        }
    }
}

pub struct NetworkDriver {
    config: DriverConfig,
    cache: StateCache,
    runtime: Arc<dyn RuntimeClient>,
    invoker: Arc<dyn PluginInvoker>,
    netconf: NetconfLoader,
    shutdown: watch::Sender<bool>,
}

impl NetworkDriver {
    pub fn new(
        config: DriverConfig,
        cache: StateCache,
        runtime: Arc<dyn RuntimeClient>,
        invoker: Arc<dyn PluginInvoker>,
    ) -> Self {
        let netconf = NetconfLoader::new(config.netconf_dir.clone());
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            cache,
            runtime,
            invoker,
            netconf,
            shutdown,
        }
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn cache(&self) -> &StateCache {
        &self.cache
    }

    /// Abandon pending deferred registrations
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Acknowledge the network and register it once `signal` reports the
    /// connection closed.
    ///
    /// The runtime only commits a network after the driver has answered, so
    /// querying it from inside the request would find nothing. Without a
    /// signal the registration starts right away.
    pub fn create_network(&self, req: CreateNetworkRequest, signal: Option<ConnectionSignal>) {
        info!("CreateNetwork {}", req.network_id);
        if req.network_id.is_empty() {
            warn!("CreateNetwork without a network id, nothing to register");
            return;
        }

        let runtime = self.runtime.clone();
        let cache = self.cache.clone();
        let timeout = self.config.register_timeout;
        let mut shutdown = self.shutdown.subscribe();
        let network_id = req.network_id;

        tokio::spawn(async move {
            if let Some(signal) = signal {
                let stopping = async move {
                    let _ = shutdown.wait_for(|stop| *stop).await;
                };
                tokio::select! {
                    _ = stopping => {
                        debug!("Driver stopping, dropping registration of {}", network_id);
                        return;
                    }
                    waited = tokio::time::timeout(timeout, signal.closed()) => {
                        if waited.is_err() {
                            warn!(
                                "Connection for CreateNetwork {} still open after {:?}, not registering",
                                network_id, timeout
                            );
                            return;
                        }
                    }
                }
            }

            match runtime.network_info(&network_id).await {
                Ok(network) => {
                    info!(
                        "Registered network {} ({}) with plugin {}",
                        network.name, network.id, network.plugin_type
                    );
                    cache.register_network(network).await;
                }
                Err(e) => warn!("Failed to look up network {}: {}", network_id, e),
            }
        });
    }

    pub async fn delete_network(&self, req: DeleteNetworkRequest) {
        info!("DeleteNetwork {}", req.network_id);
        if !self.cache.unregister_network(&req.network_id).await {
            debug!("Network {} was not registered", req.network_id);
        }
    }

    pub fn create_endpoint(&self, req: CreateEndpointRequest) -> CreateEndpointResponse {
        debug!(
            "CreateEndpoint {} on {} ({} interfaces requested)",
            req.endpoint_id,
            req.network_id,
            req.interfaces.len()
        );
        CreateEndpointResponse::default()
    }

    pub fn delete_endpoint(&self, req: EndpointRequest) {
        debug!("DeleteEndpoint {} on {}", req.endpoint_id, req.network_id);
    }

    pub fn endpoint_info(&self, req: EndpointRequest) -> EndpointInfoResponse {
        debug!("EndpointOperInfo {} on {}", req.endpoint_id, req.network_id);
        EndpointInfoResponse::default()
    }

    /// Attach the sandbox behind `req.sandbox_key` to the network by
    /// running the network's plugin with ADD.
    pub async fn join(&self, req: JoinRequest) -> Result<JoinResponse, DriverError> {
        info!(
            "Join {} on {} sandbox {}",
            req.endpoint_id, req.network_id, req.sandbox_key
        );

        let network = self
            .cache
            .lookup_network(&req.network_id)
            .await
            .ok_or_else(|| DriverError::NetworkNotFound(req.network_id.clone()))?;

        let container = self
            .cache
            .lookup_container_by_sandbox_key(&req.sandbox_key)
            .await
            .ok_or_else(|| DriverError::ContainerNotFound(req.sandbox_key.clone()))?;

        let netns = self
            .cache
            .resolve_netns_path(&container.id)
            .await
            .map_err(|source| DriverError::NamespaceUnresolved {
                container: container.id.clone(),
                source,
            })?;

        let config = self.netconf.load(&network).await?;

        let started = Instant::now();
        self.invoker
            .invoke(
                &network.plugin_type,
                CniCommand::Add,
                &req.sandbox_key,
                &netns,
                &config,
            )
            .await
            .map_err(|e| DriverError::from_plugin(&network.plugin_type, CniCommand::Add, e))?;

        info!(
            "Joined container {} to {} in {:?}",
            container.id,
            network.name,
            started.elapsed()
        );

        Ok(JoinResponse {
            interface_names: vec![placeholder_interface(&req.endpoint_id)],
            ..JoinResponse::default()
        })
    }

    /// Acknowledged only, the plugin is not asked to tear anything down
    pub fn leave(&self, req: LeaveRequest) {
        debug!("Leave {} on {}", req.endpoint_id, req.network_id);
    }
}

impl Drop for NetworkDriver {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

fn placeholder_interface(endpoint_id: &str) -> InterfaceName {
    let short: String = endpoint_id.chars().take(SRC_NAME_ID_LEN).collect();
    InterfaceName {
        src_name: format!("{}{}", SRC_NAME_PREFIX, short),
        dst_prefix: DST_PREFIX.to_string(),
        id: 0,
    }
}
