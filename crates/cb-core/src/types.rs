//! Records shared by the state cache, the driver and runtime clients

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Network option that selects the CNI plugin binary
pub const PLUGIN_TYPE_OPTION: &str = "type";

/// A network known to the runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub id: String,
    pub name: String,
    /// Name of the CNI executable that serves this network
    pub plugin_type: String,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl NetworkRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        plugin_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            plugin_type: plugin_type.into(),
            options: HashMap::new(),
        }
    }

    /// Build a record from runtime data, preferring the `type` option over
    /// the driver name for the plugin type.
    pub fn from_runtime(
        id: impl Into<String>,
        name: impl Into<String>,
        driver: &str,
        options: HashMap<String, String>,
    ) -> Self {
        let plugin_type = options
            .get(PLUGIN_TYPE_OPTION)
            .filter(|t| !t.is_empty())
            .cloned()
            .unwrap_or_else(|| driver.to_string());

        Self {
            id: id.into(),
            name: name.into(),
            plugin_type,
            options,
        }
    }
}

/// Network settings reported for a container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerNetworkSettings {
    pub sandbox_key: String,
}

/// A container as last inspected from the runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: String,
    /// Process id of the container init; `<= 0` when not running
    pub pid: i64,
    pub network_settings: ContainerNetworkSettings,
}

impl ContainerRecord {
    pub fn new(id: impl Into<String>, sandbox_key: impl Into<String>, pid: i64) -> Self {
        Self {
            id: id.into(),
            pid,
            network_settings: ContainerNetworkSettings {
                sandbox_key: sandbox_key.into(),
            },
        }
    }

    pub fn sandbox_key(&self) -> &str {
        &self.network_settings.sandbox_key
    }

    pub fn is_running(&self) -> bool {
        self.pid > 0
    }
}

/// Container lifecycle status carried by a runtime event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStatus {
    Create,
    Start,
    Die,
    Other(String),
}

impl From<&str> for EventStatus {
    fn from(status: &str) -> Self {
        match status {
            "create" => EventStatus::Create,
            "start" => EventStatus::Start,
            "die" => EventStatus::Die,
            other => EventStatus::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Create => write!(f, "create"),
            EventStatus::Start => write!(f, "start"),
            EventStatus::Die => write!(f, "die"),
            EventStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// A container event from the runtime event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEvent {
    pub id: String,
    pub status: EventStatus,
}

impl RuntimeEvent {
    pub fn new(id: impl Into<String>, status: impl Into<EventStatus>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
        }
    }
}
