//! Cluster access for the node controllers.
//!
//! Every Kubernetes call goes through one of the traits below so the
//! controllers can be tested against in-memory fakes. Errors are classified
//! into `ClusterError` here, at the client boundary, and nowhere else.
//!
//! Two read paths exist on purpose:
//! - the cached client reads from the watch runner's reflector store
//! - the direct readers always hit the API server, for use before the watch
//!   cache has been populated (cold start)

use crds::{MultiTenantNetworkContainer, NetworkContainerState, NodeNetworkConfig, NODE_NETWORK_CONFIG_NAMESPACE};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use kube_runtime::reflector::{ObjectRef, Store};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// Kubernetes failures, tagged by what the caller should do about them.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The object does not exist
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The resource kind is not served by the API server (CRD not installed)
    #[error("resource kind is not defined in the cluster: {0}")]
    KindUndefined(String),

    /// Optimistic concurrency check failed on write
    #[error("conflicting update: {0}")]
    Conflict(String),

    /// Anything else; usually worth retrying
    #[error("Kubernetes API error: {0}")]
    Transient(#[source] kube::Error),
}

impl ClusterError {
    /// Classify an API status.
    ///
    /// A 404 carrying a proper `Status` body with reason `NotFound` means the
    /// object is missing. Any other 404 means the server does not serve the
    /// path at all, which for a custom resource means the CRD is absent.
    /// Returns `None` for statuses that are not tagged specially.
    pub fn from_status(code: u16, reason: &str, message: impl Into<String>) -> Option<Self> {
        let message = message.into();
        match (code, reason) {
            (404, "NotFound") => Some(ClusterError::NotFound(message)),
            (404, _) => Some(ClusterError::KindUndefined(message)),
            (409, _) => Some(ClusterError::Conflict(message)),
            _ => None,
        }
    }

    /// Classify an error returned by the kube client.
    pub fn from_kube(err: kube::Error) -> Self {
        let classified = match &err {
            kube::Error::Api(response) => Self::from_status(response.code, &response.reason, err.to_string()),
            _ => None,
        };
        classified.unwrap_or_else(|| ClusterError::Transient(err))
    }
}

/// Cached read/write access to `NodeNetworkConfig`.
#[async_trait::async_trait]
pub trait NodeNetworkConfigClient: Send + Sync {
    /// Read a `NodeNetworkConfig`, preferring the watch cache.
    async fn get(&self, name: &str, namespace: &str) -> Result<NodeNetworkConfig, ClusterError>;

    /// Replace a `NodeNetworkConfig`. Fails with `Conflict` when the object
    /// changed since it was read.
    async fn update(&self, nnc: &NodeNetworkConfig) -> Result<NodeNetworkConfig, ClusterError>;
}

/// Uncached `NodeNetworkConfig` reads.
#[async_trait::async_trait]
pub trait NodeNetworkConfigGetter: Send + Sync {
    async fn get_direct(&self, name: &str, namespace: &str) -> Result<NodeNetworkConfig, ClusterError>;
}

/// Uncached pod listing.
#[async_trait::async_trait]
pub trait PodLister: Send + Sync {
    /// Pods scheduled on `node_name`, in `namespace` or all namespaces when `None`.
    async fn list_pods(&self, namespace: Option<&str>, node_name: &str) -> Result<Vec<Pod>, ClusterError>;
}

/// Writes the multi-tenant controller performs on its own objects.
#[async_trait::async_trait]
pub trait MultiTenantNetworkContainerClient: Send + Sync {
    /// Replace the finalizer list.
    async fn set_finalizers(&self, namespace: &str, name: &str, finalizers: Vec<String>) -> Result<(), ClusterError>;

    /// Patch `status.state`.
    async fn set_state(&self, namespace: &str, name: &str, state: NetworkContainerState) -> Result<(), ClusterError>;
}

/// Direct readers backed by plain API calls.
#[derive(Clone)]
pub struct KubeDirectClient {
    client: Client,
}

impl KubeDirectClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl NodeNetworkConfigGetter for KubeDirectClient {
    async fn get_direct(&self, name: &str, namespace: &str) -> Result<NodeNetworkConfig, ClusterError> {
        let api: Api<NodeNetworkConfig> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await.map_err(ClusterError::from_kube)
    }
}

#[async_trait::async_trait]
impl PodLister for KubeDirectClient {
    async fn list_pods(&self, namespace: Option<&str>, node_name: &str) -> Result<Vec<Pod>, ClusterError> {
        let api: Api<Pod> = match namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        };
        let params = ListParams::default().fields(&format!("spec.nodeName={}", node_name));
        let pods = api.list(&params).await.map_err(ClusterError::from_kube)?;
        debug!("Listed {} pods on node {}", pods.items.len(), node_name);
        Ok(pods.items)
    }
}

#[async_trait::async_trait]
impl MultiTenantNetworkContainerClient for KubeDirectClient {
    async fn set_finalizers(&self, namespace: &str, name: &str, finalizers: Vec<String>) -> Result<(), ClusterError> {
        let api: Api<MultiTenantNetworkContainer> = Api::namespaced(self.client.clone(), namespace);
        let patch = json!({ "metadata": { "finalizers": finalizers } });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(ClusterError::from_kube)?;
        Ok(())
    }

    async fn set_state(&self, namespace: &str, name: &str, state: NetworkContainerState) -> Result<(), ClusterError> {
        let api: Api<MultiTenantNetworkContainer> = Api::namespaced(self.client.clone(), namespace);
        let patch = json!({ "status": { "state": state } });
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(ClusterError::from_kube)?;
        Ok(())
    }
}

/// `NodeNetworkConfig` client reading through the watch runner's store.
#[derive(Clone)]
pub struct KubeCachedClient {
    client: Client,
    store: Store<NodeNetworkConfig>,
}

impl KubeCachedClient {
    pub fn new(client: Client, store: Store<NodeNetworkConfig>) -> Self {
        Self { client, store }
    }
}

#[async_trait::async_trait]
impl NodeNetworkConfigClient for KubeCachedClient {
    async fn get(&self, name: &str, namespace: &str) -> Result<NodeNetworkConfig, ClusterError> {
        let key = ObjectRef::new(name).within(namespace);
        if let Some(cached) = self.store.get(&key) {
            return Ok(cached.as_ref().clone());
        }

        // Store is empty until the watch has listed at least once
        debug!("NodeNetworkConfig {}/{} not in watch cache, reading from API server", namespace, name);
        let api: Api<NodeNetworkConfig> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await.map_err(ClusterError::from_kube)
    }

    async fn update(&self, nnc: &NodeNetworkConfig) -> Result<NodeNetworkConfig, ClusterError> {
        let namespace = nnc
            .namespace()
            .unwrap_or_else(|| NODE_NETWORK_CONFIG_NAMESPACE.to_string());
        let api: Api<NodeNetworkConfig> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&nnc.name_any(), &PostParams::default(), nnc)
            .await
            .map_err(ClusterError::from_kube)
    }
}
