//! NodeNetworkConfig reconciler
//!
//! Pushes the node's network container, scaler and spec into CNS whenever
//! the node's `NodeNetworkConfig` changes. Pod assignments are left alone:
//! they are only rebuilt during cold start.

use crate::error::ControllerError;
use crate::translate::status_to_nc_request;
use crate::watcher::ResourceReconciler;
use cns_client::CnsClientTrait;
use crds::{NodeNetworkConfig, NodeNetworkConfigSpec, NodeNetworkConfigStatus};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Reconciler for this node's `NodeNetworkConfig`.
pub struct NodeNetworkConfigReconciler {
    cns_client: Arc<dyn CnsClientTrait>,
    node_name: String,
    last_pushed: Mutex<Option<(NodeNetworkConfigStatus, NodeNetworkConfigSpec)>>,
}

impl NodeNetworkConfigReconciler {
    pub fn new(cns_client: Arc<dyn CnsClientTrait>, node_name: String) -> Self {
        Self {
            cns_client,
            node_name,
            last_pushed: Mutex::new(None),
        }
    }

    fn already_pushed(&self, observed: &(NodeNetworkConfigStatus, NodeNetworkConfigSpec)) -> bool {
        self.last_pushed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            == Some(observed)
    }

    /// Reconcile one observed `NodeNetworkConfig`.
    pub async fn reconcile_node_network_config(&self, nnc: &NodeNetworkConfig) -> Result<(), ControllerError> {
        let name = nnc.name_any();
        if name != self.node_name {
            debug!("Ignoring NodeNetworkConfig {} for another node", name);
            return Ok(());
        }

        let status = nnc.status_or_default();
        let observed = (status, nnc.spec.clone());
        if self.already_pushed(&observed) {
            debug!("NodeNetworkConfig {} unchanged since last push", name);
            return Ok(());
        }
        let (status, spec) = &observed;

        let request = if status.network_containers.is_empty() {
            info!("NodeNetworkConfig {} has no network containers yet", name);
            None
        } else {
            Some(status_to_nc_request(status)?)
        };

        info!(
            "Pushing NodeNetworkConfig {} to CNS: {} secondary IPs, requested {}",
            name,
            request.as_ref().map_or(0, |r| r.secondary_ip_configs.len()),
            spec.requested_ip_count
        );
        self.cns_client
            .reconcile_nc_state(request, None, status.scaler.clone(), spec.clone())
            .await?;

        *self.last_pushed.lock().unwrap_or_else(PoisonError::into_inner) = Some(observed);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ResourceReconciler<NodeNetworkConfig> for NodeNetworkConfigReconciler {
    async fn reconcile(&self, resource: Arc<NodeNetworkConfig>) -> Result<Action, ControllerError> {
        self.reconcile_node_network_config(&resource).await?;
        Ok(Action::await_change())
    }
}
