//! MultiTenantNetworkContainer CRD
//!
//! Describes a single tenant network container scheduled onto a node. The
//! cluster programs `status` once the container's addresses are reserved.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Finalizer the node agent holds until the container is removed from CNS.
pub const MULTITENANT_NC_FINALIZER: &str = "finalizers.acn.azure.com/cns";

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "multitenancy.acn.azure.com",
    version = "v1alpha1",
    kind = "MultiTenantNetworkContainer",
    namespaced,
    status = "MultiTenantNetworkContainerStatus",
    printcolumn = r#"{"name":"Node", "type":"string", "jsonPath":".spec.node"}"#,
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.state"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MultiTenantNetworkContainerSpec {
    /// Network container id
    #[serde(default)]
    pub uuid: String,

    #[serde(default)]
    pub network: String,

    #[serde(default)]
    pub subnet: String,

    /// Node the container is scheduled on
    #[serde(default)]
    pub node: String,

    #[serde(default)]
    pub interface_name: String,

    #[serde(rename = "reservationID", default)]
    pub reservation_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MultiTenantNetworkContainerStatus {
    #[serde(default)]
    pub state: NetworkContainerState,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub gateway: String,

    /// Subnet CIDR the container IP belongs to
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip_subnet: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub primary_interface_identifier: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mac_address: String,
}

/// Provisioning state of a tenant network container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum NetworkContainerState {
    /// Not yet programmed by the cluster
    #[default]
    #[serde(rename = "")]
    Pending,

    /// Addresses reserved, waiting for the node
    Initialized,

    /// Programmed into the node's CNS
    Succeeded,

    /// Being torn down
    Terminated,
}
