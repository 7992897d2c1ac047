//! Translation from cluster resources to CNS requests.
//!
//! Pure functions: nothing here talks to the cluster or to CNS, and a failed
//! translation leaves no trace.

use cns_client::{
    CreateNetworkContainerRequest, IPConfiguration, IPSubnet, NetworkContainerType, PodInfo,
    SecondaryIPConfig,
};
use crds::{MultiTenantNetworkContainer, NetworkContainer, NodeNetworkConfigStatus};
use ipnetwork::IpNetwork;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use thiserror::Error;
use tracing::{debug, warn};

/// Reasons a resource cannot be turned into a CNS request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslationError {
    #[error("invalid primary IP {ip:?} for network container {network_container_id}")]
    InvalidPrimaryIp { network_container_id: String, ip: String },

    #[error("invalid subnet address space {subnet:?} for network container {network_container_id}")]
    InvalidSubnet { network_container_id: String, subnet: String },

    #[error("invalid secondary IP {ip:?} ({name}) for network container {network_container_id}")]
    InvalidSecondaryIp { network_container_id: String, name: String, ip: String },

    #[error("status carries no network containers")]
    NoNetworkContainers,

    #[error("network container id is empty")]
    MissingNetworkContainerId,
}

fn parse_ip(ip: &str) -> Option<IpAddr> {
    ip.trim().parse::<IpAddr>().ok()
}

fn parse_prefix_length(subnet: &str) -> Option<u8> {
    subnet.trim().parse::<IpNetwork>().ok().map(|network| network.prefix())
}

fn network_container_to_request(
    nc: &NetworkContainer,
) -> Result<CreateNetworkContainerRequest, TranslationError> {
    let primary_ip = parse_ip(&nc.primary_ip).ok_or_else(|| TranslationError::InvalidPrimaryIp {
        network_container_id: nc.id.clone(),
        ip: nc.primary_ip.clone(),
    })?;
    let prefix_length = parse_prefix_length(&nc.subnet_address_space).ok_or_else(|| {
        TranslationError::InvalidSubnet {
            network_container_id: nc.id.clone(),
            subnet: nc.subnet_address_space.clone(),
        }
    })?;

    let mut secondary_ip_configs = BTreeMap::new();
    for assignment in &nc.ip_assignments {
        let ip = parse_ip(&assignment.ip).ok_or_else(|| TranslationError::InvalidSecondaryIp {
            network_container_id: nc.id.clone(),
            name: assignment.name.clone(),
            ip: assignment.ip.clone(),
        })?;
        secondary_ip_configs.insert(
            assignment.name.clone(),
            SecondaryIPConfig {
                ip_address: ip.to_string(),
                nc_version: nc.version,
            },
        );
    }

    Ok(CreateNetworkContainerRequest {
        version: nc.version.to_string(),
        network_container_type: NetworkContainerType::Docker,
        network_container_id: nc.id.clone(),
        primary_interface_identifier: None,
        ip_configuration: IPConfiguration {
            ip_subnet: IPSubnet {
                ip_address: primary_ip.to_string(),
                prefix_length,
            },
            gateway_ip_address: nc.default_gateway.clone(),
        },
        secondary_ip_configs,
    })
}

/// Build the CNS request for a node's `NodeNetworkConfig` status.
///
/// A node carries a single network container. If the status lists more,
/// every one is validated and the last one wins.
pub fn status_to_nc_request(
    status: &NodeNetworkConfigStatus,
) -> Result<CreateNetworkContainerRequest, TranslationError> {
    if status.network_containers.len() > 1 {
        warn!(
            "Status lists {} network containers, only the last one is sent to CNS",
            status.network_containers.len()
        );
    }

    let mut request = None;
    for nc in &status.network_containers {
        request = Some(network_container_to_request(nc)?);
    }
    request.ok_or(TranslationError::NoNetworkContainers)
}

/// Index running pods by IP.
///
/// Host-network pods share the node's address and never own a secondary IP,
/// so they are left out, as are pods that have not been given an IP yet.
pub fn pods_to_pod_info_by_ip(pods: &[Pod]) -> HashMap<String, PodInfo> {
    let mut pod_info_by_ip = HashMap::new();
    for pod in pods {
        let host_network = pod
            .spec
            .as_ref()
            .and_then(|spec| spec.host_network)
            .unwrap_or(false);
        if host_network {
            continue;
        }

        let Some(pod_ip) = pod
            .status
            .as_ref()
            .and_then(|status| status.pod_ip.as_deref())
            .filter(|ip| !ip.is_empty())
        else {
            debug!("Pod {} has no IP yet, skipping", pod.name_any());
            continue;
        };

        pod_info_by_ip.insert(
            pod_ip.to_string(),
            PodInfo::new(pod.name_any(), pod.namespace().unwrap_or_default()),
        );
    }
    pod_info_by_ip
}

/// Build the CNS request for a programmed `MultiTenantNetworkContainer`.
pub fn multitenant_status_to_nc_request(
    nc: &MultiTenantNetworkContainer,
) -> Result<CreateNetworkContainerRequest, TranslationError> {
    let id = nc.spec.uuid.clone();
    if id.is_empty() {
        return Err(TranslationError::MissingNetworkContainerId);
    }
    let status = nc.status.clone().unwrap_or_default();

    let ip = parse_ip(&status.ip).ok_or_else(|| TranslationError::InvalidPrimaryIp {
        network_container_id: id.clone(),
        ip: status.ip.clone(),
    })?;
    let prefix_length = parse_prefix_length(&status.ip_subnet).ok_or_else(|| {
        TranslationError::InvalidSubnet {
            network_container_id: id.clone(),
            subnet: status.ip_subnet.clone(),
        }
    })?;
    let primary_interface_identifier = (!status.primary_interface_identifier.is_empty())
        .then(|| status.primary_interface_identifier.clone());

    Ok(CreateNetworkContainerRequest {
        version: "0".to_string(),
        network_container_type: NetworkContainerType::Docker,
        network_container_id: id,
        primary_interface_identifier,
        ip_configuration: IPConfiguration {
            ip_subnet: IPSubnet {
                ip_address: ip.to_string(),
                prefix_length,
            },
            gateway_ip_address: status.gateway,
        },
        secondary_ip_configs: BTreeMap::new(),
    })
}
