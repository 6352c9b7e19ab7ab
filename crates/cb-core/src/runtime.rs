//! Container runtime seam
//!
//! The cache and the driver only need four operations from the runtime.
//! Both receive an `Arc<dyn RuntimeClient>` at construction.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::types::{ContainerRecord, NetworkRecord, RuntimeEvent};

#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// List every network the runtime currently knows about
    async fn list_networks(&self) -> Result<Vec<NetworkRecord>>;

    /// Fetch the full record of a container
    async fn inspect_container(&self, id: &str) -> Result<ContainerRecord>;

    /// Fetch the full record of a network
    async fn network_info(&self, id: &str) -> Result<NetworkRecord>;

    /// Start forwarding container events into `sender`.
    ///
    /// Forwarding stops once the receiving side is dropped.
    async fn add_event_listener(&self, sender: mpsc::Sender<RuntimeEvent>) -> Result<()>;
}
