//! MultiTenantNetworkContainer reconciler
//!
//! Programs tenant network containers scheduled on this node into CNS and
//! removes them again when the object is deleted. A finalizer keeps the
//! object around until CNS has let go of the container.

use crate::cluster::MultiTenantNetworkContainerClient;
use crate::error::ControllerError;
use crate::translate::multitenant_status_to_nc_request;
use crate::watcher::ResourceReconciler;
use cns_client::CnsClientTrait;
use crds::{MultiTenantNetworkContainer, NetworkContainerState, MULTITENANT_NC_FINALIZER};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, info};

/// Reconciler for tenant network containers on this node.
pub struct MultiTenantReconciler {
    cns_client: Arc<dyn CnsClientTrait>,
    nc_client: Arc<dyn MultiTenantNetworkContainerClient>,
    node_name: String,
}

impl MultiTenantReconciler {
    pub fn new(
        cns_client: Arc<dyn CnsClientTrait>,
        nc_client: Arc<dyn MultiTenantNetworkContainerClient>,
        node_name: String,
    ) -> Self {
        Self {
            cns_client,
            nc_client,
            node_name,
        }
    }

    /// Reconcile one observed `MultiTenantNetworkContainer`.
    pub async fn reconcile_multitenant_nc(&self, nc: &MultiTenantNetworkContainer) -> Result<(), ControllerError> {
        let name = nc.name_any();
        if nc.spec.node != self.node_name {
            debug!("Ignoring MultiTenantNetworkContainer {} scheduled on {:?}", name, nc.spec.node);
            return Ok(());
        }
        let namespace = nc.namespace().unwrap_or_default();
        let has_finalizer = nc.finalizers().iter().any(|f| f == MULTITENANT_NC_FINALIZER);

        if nc.metadata.deletion_timestamp.is_some() {
            if !has_finalizer {
                return Ok(());
            }
            info!("Deleting network container {} ({}) from CNS", nc.spec.uuid, name);
            self.cns_client.delete_network_container(&nc.spec.uuid).await?;

            let remaining: Vec<String> = nc
                .finalizers()
                .iter()
                .filter(|f| f.as_str() != MULTITENANT_NC_FINALIZER)
                .cloned()
                .collect();
            self.nc_client.set_finalizers(&namespace, &name, remaining).await?;
            return Ok(());
        }

        let Some(status) = nc.status.as_ref() else {
            debug!("MultiTenantNetworkContainer {} has no status yet", name);
            return Ok(());
        };
        let programmed = matches!(
            status.state,
            NetworkContainerState::Initialized | NetworkContainerState::Succeeded
        );
        if !programmed || status.ip.is_empty() {
            debug!(
                "MultiTenantNetworkContainer {} not ready (state {:?}), waiting",
                name, status.state
            );
            return Ok(());
        }

        let request = multitenant_status_to_nc_request(nc)?;

        // Finalizer goes on before CNS learns about the container
        if !has_finalizer {
            let mut finalizers = nc.finalizers().to_vec();
            finalizers.push(MULTITENANT_NC_FINALIZER.to_string());
            self.nc_client.set_finalizers(&namespace, &name, finalizers).await?;
        }

        info!("Programming network container {} ({}) into CNS", request.network_container_id, name);
        self.cns_client.create_or_update_network_container(request).await?;

        if status.state != NetworkContainerState::Succeeded {
            self.nc_client
                .set_state(&namespace, &name, NetworkContainerState::Succeeded)
                .await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ResourceReconciler<MultiTenantNetworkContainer> for MultiTenantReconciler {
    async fn reconcile(&self, resource: Arc<MultiTenantNetworkContainer>) -> Result<Action, ControllerError> {
        self.reconcile_multitenant_nc(&resource).await?;
        Ok(Action::await_change())
    }
}
