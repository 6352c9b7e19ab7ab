//! Docker API models to cni-bridge records

use bollard::models::{ContainerInspectResponse, EventMessage, Network};
use cb_core::{ContainerRecord, ContainerNetworkSettings, NetworkRecord, RuntimeEvent};

pub fn network_record(network: Network) -> Option<NetworkRecord> {
    let id = network.id.filter(|id| !id.is_empty())?;
    Some(NetworkRecord::from_runtime(
        id,
        network.name.unwrap_or_default(),
        network.driver.as_deref().unwrap_or_default(),
        network.options.unwrap_or_default(),
    ))
}

/// Stopped containers report pid 0
pub fn container_record(fallback_id: &str, info: ContainerInspectResponse) -> ContainerRecord {
    let pid = info.state.and_then(|s| s.pid).unwrap_or(0);
    let sandbox_key = info
        .network_settings
        .and_then(|settings| settings.sandbox_key)
        .unwrap_or_default();

    ContainerRecord {
        id: info.id.unwrap_or_else(|| fallback_id.to_string()),
        pid,
        network_settings: ContainerNetworkSettings { sandbox_key },
    }
}

/// Events without an actor id or action are dropped
pub fn runtime_event(message: EventMessage) -> Option<RuntimeEvent> {
    let action = message.action.filter(|a| !a.is_empty())?;
    let id = message
        .actor
        .and_then(|actor| actor.id)
        .filter(|id| !id.is_empty())?;
    Some(RuntimeEvent::new(id, action.as_str()))
}
