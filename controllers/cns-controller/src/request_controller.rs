//! Request controller.
//!
//! Keeps the local CNS in step with this node's `NodeNetworkConfig`:
//! - `init` performs the cold start, reading straight from the API server
//!   because the watch cache is still empty
//! - `start` runs the watch that pushes every later change
//! - `update_spec` writes the node's desired spec back to the cluster

use crate::cluster::{
    ClusterError, KubeCachedClient, KubeDirectClient, NodeNetworkConfigClient, NodeNetworkConfigGetter,
    PodLister,
};
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::lifecycle::{Lifecycle, ReconcileLoop};
use crate::reconciler::NodeNetworkConfigReconciler;
use crate::translate::{pods_to_pod_info_by_ip, status_to_nc_request};
use crate::watcher::WatchRunner;
use cns_client::CnsClientTrait;
use crds::{NodeNetworkConfig, NodeNetworkConfigSpec, Scaler};
use kube::{Api, Client};
use kube_runtime::watcher;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument, Span};

/// Cluster clients the request controller reads and writes through.
#[derive(Clone)]
pub struct ClusterClients {
    /// Cached reads and writes of `NodeNetworkConfig`
    pub cached: Arc<dyn NodeNetworkConfigClient>,
    /// Uncached `NodeNetworkConfig` reads
    pub nnc_getter: Arc<dyn NodeNetworkConfigGetter>,
    /// Uncached pod listing
    pub pod_lister: Arc<dyn PodLister>,
}

/// The production request controller.
pub type KubeRequestController = RequestController<WatchRunner<NodeNetworkConfig, NodeNetworkConfigReconciler>>;

/// Controller reconciling this node's `NodeNetworkConfig` into CNS.
pub struct RequestController<L> {
    lifecycle: Lifecycle<L>,
    clients: ClusterClients,
    cns_client: Arc<dyn CnsClientTrait>,
    node_name: String,
    namespace: String,
}

impl KubeRequestController {
    /// Build the controller against a live cluster.
    pub fn new(
        kube_client: Client,
        cns_client: Arc<dyn CnsClientTrait>,
        config: &ControllerConfig,
        span: Span,
    ) -> Result<Self, ControllerError> {
        validate(&config.node_name, &config.namespace)?;

        let api: Api<NodeNetworkConfig> = Api::namespaced(kube_client.clone(), &config.namespace);
        let watcher_config = watcher::Config::default().fields(&format!("metadata.name={}", config.node_name));
        let reconciler = NodeNetworkConfigReconciler::new(cns_client.clone(), config.node_name.clone());
        let runner = WatchRunner::new(api, watcher_config, reconciler, "NodeNetworkConfig");

        let direct = Arc::new(KubeDirectClient::new(kube_client.clone()));
        let clients = ClusterClients {
            cached: Arc::new(KubeCachedClient::new(kube_client, runner.store())),
            nnc_getter: direct.clone(),
            pod_lister: direct,
        };

        Self::with_clients(
            runner,
            clients,
            cns_client,
            config.node_name.clone(),
            config.namespace.clone(),
            span,
        )
    }
}

fn validate(node_name: &str, namespace: &str) -> Result<(), ControllerError> {
    if node_name.is_empty() {
        return Err(ControllerError::InvalidConfig("node name must be set".to_string()));
    }
    if namespace.is_empty() {
        return Err(ControllerError::InvalidConfig(
            "NodeNetworkConfig namespace must not be empty".to_string(),
        ));
    }
    Ok(())
}

impl<L: ReconcileLoop> RequestController<L> {
    /// Build the controller from its parts.
    pub fn with_clients(
        runner: L,
        clients: ClusterClients,
        cns_client: Arc<dyn CnsClientTrait>,
        node_name: String,
        namespace: String,
        span: Span,
    ) -> Result<Self, ControllerError> {
        validate(&node_name, &namespace)?;
        Ok(Self {
            lifecycle: Lifecycle::new(runner, true, span),
            clients,
            cns_client,
            node_name,
            namespace,
        })
    }

    /// Replace the handler called on unrecoverable errors.
    #[cfg(test)]
    pub fn with_fatal_handler(mut self, on_fatal: crate::lifecycle::FatalHandler) -> Self {
        self.lifecycle = self.lifecycle.with_fatal_handler(on_fatal);
        self
    }

    /// Cold-start CNS from the cluster's current state.
    ///
    /// Fails without side effects on the lifecycle if any step fails; the
    /// caller decides whether to retry.
    pub async fn init(&self) -> Result<(), ControllerError> {
        self.lifecycle.initialize(|| self.init_cns()).await
    }

    async fn init_cns(&self) -> Result<(), ControllerError> {
        info!("Initializing CNS state for node {}", self.node_name);

        let nnc = match self.clients.nnc_getter.get_direct(&self.node_name, &self.namespace).await {
            Ok(nnc) => nnc,
            Err(ClusterError::NotFound(message)) => {
                warn!(
                    "NodeNetworkConfig {}/{} does not exist yet, initializing CNS without network containers: {}",
                    self.namespace, self.node_name, message
                );
                self.cns_client
                    .reconcile_nc_state(None, None, Scaler::default(), NodeNetworkConfigSpec::default())
                    .await?;
                return Ok(());
            }
            Err(e) => {
                error!("Failed to read NodeNetworkConfig {}/{}: {}", self.namespace, self.node_name, e);
                return Err(e.into());
            }
        };

        let status = nnc.status_or_default();
        if status.network_containers.is_empty() {
            info!("NodeNetworkConfig {} has no network containers yet", self.node_name);
            self.cns_client
                .reconcile_nc_state(None, None, status.scaler, nnc.spec)
                .await?;
            return Ok(());
        }

        let request = status_to_nc_request(&status)?;
        let pods = self.clients.pod_lister.list_pods(None, &self.node_name).await?;
        let pod_info_by_ip = if pods.is_empty() {
            None
        } else {
            Some(pods_to_pod_info_by_ip(&pods))
        };

        info!(
            "Reconciling network container {} with {} secondary IPs and {} pods",
            request.network_container_id,
            request.secondary_ip_configs.len(),
            pod_info_by_ip.as_ref().map_or(0, |pods| pods.len())
        );
        self.cns_client
            .reconcile_nc_state(Some(request), pod_info_by_ip, status.scaler, nnc.spec)
            .await?;
        Ok(())
    }

    /// Run the watch until `shutdown` fires. Requires a successful `init`.
    pub async fn start(&self, shutdown: CancellationToken) -> Result<(), ControllerError> {
        self.lifecycle.start(shutdown).await
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    /// Write `spec` into this node's `NodeNetworkConfig`.
    ///
    /// A concurrent modification surfaces as `ClusterError::Conflict`; the
    /// caller re-reads and retries.
    pub async fn update_spec(&self, spec: NodeNetworkConfigSpec) -> Result<(), ControllerError> {
        async {
            let mut nnc = self
                .clients
                .cached
                .get(&self.node_name, &self.namespace)
                .await
                .map_err(|e| {
                    error!("Failed to read NodeNetworkConfig {} for spec update: {}", self.node_name, e);
                    e
                })?;

            info!(
                "Updating NodeNetworkConfig {} spec: requested IPs {}, {} IPs not in use",
                self.node_name,
                spec.requested_ip_count,
                spec.ips_not_in_use.len()
            );
            nnc.spec = spec;
            self.clients.cached.update(&nnc).await?;
            Ok::<(), ControllerError>(())
        }
        .instrument(self.lifecycle.span().clone())
        .await
    }
}
