//! Docker Engine runtime client

use async_trait::async_trait;
use bollard::network::InspectNetworkOptions;
use bollard::system::EventsOptions;
use bollard::Docker;
use cb_core::{ContainerRecord, Error, NetworkRecord, Result, RuntimeClient, RuntimeEvent};
use futures::StreamExt;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::convert::{container_record, network_record, runtime_event};

/// Seconds before a Docker API request is abandoned
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to `docker_host` (`unix://` or `tcp://`/`http://`) and
    /// verify the daemon answers.
    pub async fn connect(docker_host: &str) -> Result<Self> {
        let docker = if docker_host.is_empty() {
            Docker::connect_with_local_defaults()
        } else if docker_host.starts_with("unix://") || docker_host.starts_with('/') {
            Docker::connect_with_unix(
                docker_host,
                REQUEST_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            )
        } else {
            Docker::connect_with_http(
                docker_host,
                REQUEST_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            )
        }
        .map_err(|e| Error::runtime(format!("Failed to connect to Docker at {}: {}", docker_host, e)))?;

        docker
            .ping()
            .await
            .map_err(|e| Error::runtime(format!("Failed to ping Docker at {}: {}", docker_host, e)))?;

        info!("Connected to Docker at {}", docker_host);
        Ok(Self { docker })
    }
}

#[async_trait]
impl RuntimeClient for DockerRuntime {
    async fn list_networks(&self) -> Result<Vec<NetworkRecord>> {
        let networks = self
            .docker
            .list_networks::<String>(None)
            .await
            .map_err(|e| Error::runtime(format!("Failed to list networks: {}", e)))?;

        Ok(networks.into_iter().filter_map(network_record).collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerRecord> {
        let info = self
            .docker
            .inspect_container(id, None)
            .await
            .map_err(|e| Error::runtime(format!("Failed to inspect container {}: {}", id, e)))?;

        Ok(container_record(id, info))
    }

    async fn network_info(&self, id: &str) -> Result<NetworkRecord> {
        let network = self
            .docker
            .inspect_network(id, None::<InspectNetworkOptions<String>>)
            .await
            .map_err(|e| Error::runtime(format!("Failed to inspect network {}: {}", id, e)))?;

        network_record(network).ok_or_else(|| Error::not_found(format!("network {}", id)))
    }

    async fn add_event_listener(&self, sender: mpsc::Sender<RuntimeEvent>) -> Result<()> {
        // The event stream is lazy; an unreachable daemon must fail here
        self.docker
            .ping()
            .await
            .map_err(|e| Error::subscription(e.to_string()))?;

        let options = EventsOptions::<String> {
            filters: HashMap::from([("type".to_string(), vec!["container".to_string()])]),
            ..Default::default()
        };
        let docker = self.docker.clone();

        tokio::spawn(async move {
            let mut events = Box::pin(docker.events(Some(options)));
            debug!("Forwarding Docker container events");
            while let Some(message) = events.next().await {
                let message = match message {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("Docker event stream failed: {}", e);
                        break;
                    }
                };
                let Some(event) = runtime_event(message) else {
                    continue;
                };
                if sender.send(event).await.is_err() {
                    debug!("Event receiver dropped, stopping forwarder");
                    return;
                }
            }
            warn!("Docker event stream ended");
        });

        Ok(())
    }
}
