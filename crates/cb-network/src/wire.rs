//! Remote driver wire types
//!
//! Field names follow the libnetwork remote driver API exactly, hence the
//! explicit renames where PascalCase alone would not match (`NetworkID`,
//! `GatewayIPv6`, ...). Every request field is optional on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Receiver name in `/<Receiver>.<Verb>` paths
pub const METHOD_RECEIVER: &str = "NetworkDriver";

pub type Options = HashMap<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointInterface {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "SrcName")]
    pub src_name: String,
    #[serde(rename = "DstPrefix")]
    pub dst_prefix: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "MacAddress")]
    pub mac_address: String,
}

/// Interface the sandbox should pick up after Join
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceName {
    #[serde(rename = "SrcName")]
    pub src_name: String,
    #[serde(rename = "DstPrefix")]
    pub dst_prefix: String,
    #[serde(rename = "ID")]
    pub id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticRoute {
    #[serde(rename = "Destination")]
    pub destination: String,
    #[serde(rename = "RouteType")]
    pub route_type: i64,
    #[serde(rename = "NextHop")]
    pub next_hop: String,
    #[serde(rename = "InterfaceID")]
    pub interface_id: i64,
}

// === Requests

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateNetworkRequest {
    #[serde(rename = "NetworkID")]
    pub network_id: String,
    #[serde(rename = "Options")]
    pub options: Options,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeleteNetworkRequest {
    #[serde(rename = "NetworkID")]
    pub network_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateEndpointRequest {
    #[serde(rename = "NetworkID")]
    pub network_id: String,
    #[serde(rename = "EndpointID")]
    pub endpoint_id: String,
    #[serde(rename = "Interfaces")]
    pub interfaces: Vec<EndpointInterface>,
    #[serde(rename = "Options")]
    pub options: Options,
}

/// Body shared by DeleteEndpoint and EndpointOperInfo
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EndpointRequest {
    #[serde(rename = "NetworkID")]
    pub network_id: String,
    #[serde(rename = "EndpointID")]
    pub endpoint_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JoinRequest {
    #[serde(rename = "NetworkID")]
    pub network_id: String,
    #[serde(rename = "EndpointID")]
    pub endpoint_id: String,
    #[serde(rename = "SandboxKey")]
    pub sandbox_key: String,
    #[serde(rename = "Options")]
    pub options: Options,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LeaveRequest {
    #[serde(rename = "NetworkID")]
    pub network_id: String,
    #[serde(rename = "EndpointID")]
    pub endpoint_id: String,
    #[serde(rename = "Options")]
    pub options: Options,
}

// === Responses

/// `{}`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmptyResponse {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandshakeResponse {
    #[serde(rename = "Implements")]
    pub implements: Vec<String>,
}

impl Default for HandshakeResponse {
    fn default() -> Self {
        Self {
            implements: vec![METHOD_RECEIVER.to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilitiesResponse {
    #[serde(rename = "Scope")]
    pub scope: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateEndpointResponse {
    #[serde(rename = "Interfaces")]
    pub interfaces: Vec<EndpointInterface>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EndpointInfoResponse {
    #[serde(rename = "Value")]
    pub value: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinResponse {
    #[serde(rename = "InterfaceNames")]
    pub interface_names: Vec<InterfaceName>,
    #[serde(rename = "Gateway")]
    pub gateway: String,
    #[serde(rename = "GatewayIPv6")]
    pub gateway_ipv6: String,
    #[serde(rename = "HostsPath")]
    pub hosts_path: String,
    #[serde(rename = "ResolvConfPath")]
    pub resolv_conf_path: String,
    #[serde(rename = "StaticRoutes")]
    pub static_routes: Vec<StaticRoute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "Err")]
    pub err: String,
}
