//! Multi-tenant controller.
//!
//! Watches `MultiTenantNetworkContainer` objects in all namespaces and
//! programs the ones scheduled on this node into CNS. There is no cold start:
//! the controller goes straight from created to started.

use crate::cluster::KubeDirectClient;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::lifecycle::{Lifecycle, ReconcileLoop};
use crate::reconciler::MultiTenantReconciler;
use crate::watcher::WatchRunner;
use cns_client::CnsClientTrait;
use crds::MultiTenantNetworkContainer;
use kube::{Api, Client};
use kube_runtime::watcher;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, Span};

/// The production multi-tenant controller.
pub type KubeMultiTenantController =
    MultiTenantController<WatchRunner<MultiTenantNetworkContainer, MultiTenantReconciler>>;

/// Controller for tenant network containers on this node.
pub struct MultiTenantController<L> {
    lifecycle: Lifecycle<L>,
    node_name: String,
}

impl KubeMultiTenantController {
    /// Build the controller against a live cluster.
    pub fn new(
        kube_client: Client,
        cns_client: Arc<dyn CnsClientTrait>,
        config: &ControllerConfig,
        span: Span,
    ) -> Result<Self, ControllerError> {
        if config.node_name.is_empty() {
            return Err(ControllerError::InvalidConfig("node name must be set".to_string()));
        }

        let api: Api<MultiTenantNetworkContainer> = Api::all(kube_client.clone());
        let reconciler = MultiTenantReconciler::new(
            cns_client,
            Arc::new(KubeDirectClient::new(kube_client)),
            config.node_name.clone(),
        );
        let runner = WatchRunner::new(api, watcher::Config::default(), reconciler, "MultiTenantNetworkContainer");

        Self::with_runner(runner, config.node_name.clone(), span)
    }
}

impl<L: ReconcileLoop> MultiTenantController<L> {
    /// Build the controller around an existing reconcile loop.
    pub fn with_runner(runner: L, node_name: String, span: Span) -> Result<Self, ControllerError> {
        if node_name.is_empty() {
            return Err(ControllerError::InvalidConfig("node name must be set".to_string()));
        }
        Ok(Self {
            lifecycle: Lifecycle::new(runner, false, span),
            node_name,
        })
    }

    /// Replace the handler called on unrecoverable errors.
    #[cfg(test)]
    pub fn with_fatal_handler(mut self, on_fatal: crate::lifecycle::FatalHandler) -> Self {
        self.lifecycle = self.lifecycle.with_fatal_handler(on_fatal);
        self
    }

    /// Run the watch until `shutdown` fires.
    pub async fn start(&self, shutdown: CancellationToken) -> Result<(), ControllerError> {
        info!(parent: self.lifecycle.span(), "Starting multi-tenant controller on node {}", self.node_name);
        self.lifecycle.start(shutdown).await
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }
}
