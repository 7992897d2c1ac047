//! CNS data model
//!
//! Request and state types exchanged with the container networking service.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of network container being provisioned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkContainerType {
    #[default]
    Docker,
}

/// Primary address and prefix of a network container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IPSubnet {
    pub ip_address: String,
    pub prefix_length: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IPConfiguration {
    #[serde(rename = "IPSubnet")]
    pub ip_subnet: IPSubnet,

    #[serde(rename = "GatewayIPAddress")]
    pub gateway_ip_address: String,
}

/// A secondary IP the node can hand out to pods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecondaryIPConfig {
    #[serde(rename = "IPAddress")]
    pub ip_address: String,

    #[serde(rename = "NCVersion")]
    pub nc_version: i64,
}

/// Request to create (or update) a network container in CNS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateNetworkContainerRequest {
    pub version: String,

    pub network_container_type: NetworkContainerType,

    #[serde(rename = "NetworkContainerid")]
    pub network_container_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_interface_identifier: Option<String>,

    pub ip_configuration: IPConfiguration,

    /// Keyed by IP configuration id
    #[serde(rename = "SecondaryIPConfigs", default)]
    pub secondary_ip_configs: BTreeMap<String, SecondaryIPConfig>,
}

/// Pod that owns an IP address on this node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PodInfo {
    pub pod_name: String,
    pub pod_namespace: String,
}

impl PodInfo {
    pub fn new(pod_name: impl Into<String>, pod_namespace: impl Into<String>) -> Self {
        Self {
            pod_name: pod_name.into(),
            pod_namespace: pod_namespace.into(),
        }
    }
}

/// Allocation lifecycle state of a single IP configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IPConfigState {
    /// Handed to a pod
    Allocated,
    /// Free for allocation
    Available,
    /// Known to CNS but not yet programmed on the host
    PendingProgramming,
    /// Marked for release back to the cluster
    PendingRelease,
}

impl IPConfigState {
    /// All states, in lifecycle order.
    pub const ALL: [IPConfigState; 4] = [
        IPConfigState::Allocated,
        IPConfigState::Available,
        IPConfigState::PendingProgramming,
        IPConfigState::PendingRelease,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IPConfigState::Allocated => "Allocated",
            IPConfigState::Available => "Available",
            IPConfigState::PendingProgramming => "PendingProgramming",
            IPConfigState::PendingRelease => "PendingRelease",
        }
    }
}

impl fmt::Display for IPConfigState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown IP configuration state name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown IP configuration state: {0}")]
pub struct UnknownIPConfigState(pub String);

impl FromStr for IPConfigState {
    type Err = UnknownIPConfigState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IPConfigState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownIPConfigState(s.to_string()))
    }
}

/// An IP configuration and where it sits in its allocation lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IPConfigurationStatus {
    #[serde(rename = "ID")]
    pub id: String,
    pub state: IPConfigState,
}

impl IPConfigurationStatus {
    pub fn new(id: impl Into<String>, state: IPConfigState) -> Self {
        Self {
            id: id.into(),
            state,
        }
    }
}

/// Envelope CNS wraps every response in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CnsResponse {
    #[serde(default)]
    pub response: ResponseStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseStatus {
    #[serde(default)]
    pub return_code: i32,
    #[serde(default)]
    pub message: String,
}
