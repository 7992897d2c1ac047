//! CnsClientTrait for mocking
//!
//! This trait abstracts the CNS client so controllers can be unit tested
//! without a running CNS. The concrete `CnsClient` implements it over HTTP.

use crate::error::CnsError;
use crate::models::{CreateNetworkContainerRequest, PodInfo};
use crds::{NodeNetworkConfigSpec, Scaler};
use std::collections::HashMap;

/// Operations the node controllers drive into CNS.
///
/// Every operation must be idempotent: the controllers sit behind an
/// at-least-once watch and re-apply the same desired state freely.
#[async_trait::async_trait]
pub trait CnsClientTrait: Send + Sync {
    /// Apply the node's desired network container state.
    ///
    /// `request` is `None` when the node has no network container yet.
    /// `pod_info_by_ip` is `None` when existing pod assignments must be left
    /// untouched; `Some` replaces them with the given map.
    async fn reconcile_nc_state(
        &self,
        request: Option<CreateNetworkContainerRequest>,
        pod_info_by_ip: Option<HashMap<String, PodInfo>>,
        scaler: Scaler,
        spec: NodeNetworkConfigSpec,
    ) -> Result<(), CnsError>;

    /// Create a network container, or update it in place if it exists.
    async fn create_or_update_network_container(
        &self,
        request: CreateNetworkContainerRequest,
    ) -> Result<(), CnsError>;

    /// Remove a network container. Removing an unknown container succeeds.
    async fn delete_network_container(&self, network_container_id: &str) -> Result<(), CnsError>;
}
