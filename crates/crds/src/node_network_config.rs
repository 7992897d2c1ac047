//! NodeNetworkConfig CRD
//!
//! One instance per node, named after the node. The cluster control plane
//! writes `status` (network containers and scaler settings); the node agent
//! writes `spec` (how many IPs it wants and which ones it no longer uses).

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Namespace the per-node `NodeNetworkConfig` objects live in.
pub const NODE_NETWORK_CONFIG_NAMESPACE: &str = "kube-system";

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "acn.azure.com",
    version = "v1alpha",
    kind = "NodeNetworkConfig",
    namespaced,
    status = "NodeNetworkConfigStatus",
    shortname = "nnc",
    printcolumn = r#"{"name":"Requested IPs", "type":"integer", "jsonPath":".spec.requestedIPCount"}"#,
    printcolumn = r#"{"name":"Batch", "type":"integer", "jsonPath":".status.scaler.batchSize"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NodeNetworkConfigSpec {
    /// Number of secondary IPs the node wants allocated
    #[serde(rename = "requestedIPCount", default)]
    pub requested_ip_count: i64,

    /// IP configuration ids the node is releasing
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ips_not_in_use: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeNetworkConfigStatus {
    /// Pool scaling parameters
    #[serde(default)]
    pub scaler: Scaler,

    /// Network containers provisioned for this node
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_containers: Vec<NetworkContainer>,
}

/// Parameters the node agent uses to decide when to grow or shrink its IP pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Scaler {
    #[serde(default)]
    pub batch_size: i64,

    #[serde(default)]
    pub release_threshold_percent: i64,

    #[serde(default)]
    pub request_threshold_percent: i64,

    #[serde(rename = "maxIPCount", default)]
    pub max_ip_count: i64,
}

/// A block of IP addresses assigned to the node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkContainer {
    pub id: String,

    #[serde(rename = "primaryIP", default)]
    pub primary_ip: String,

    #[serde(default)]
    pub subnet_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_assignments: Vec<IPAssignment>,

    #[serde(default)]
    pub default_gateway: String,

    /// Subnet CIDR, e.g. `10.240.0.0/16`
    #[serde(default)]
    pub subnet_address_space: String,

    #[serde(default)]
    pub version: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IPAssignment {
    /// IP configuration id
    pub name: String,
    pub ip: String,
}

impl NodeNetworkConfig {
    /// Status of the resource, or the empty status when the control plane
    /// has not written one yet.
    pub fn status_or_default(&self) -> NodeNetworkConfigStatus {
        self.status.clone().unwrap_or_default()
    }
}
