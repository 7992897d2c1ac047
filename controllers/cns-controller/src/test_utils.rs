//! Test utilities for unit testing controllers and reconcilers
//!
//! In-memory stand-ins for the cluster clients plus builders for test objects.

use crate::cluster::{
    ClusterError, MultiTenantNetworkContainerClient, NodeNetworkConfigClient,
    NodeNetworkConfigGetter, PodLister,
};
use crate::error::ControllerError;
use crate::lifecycle::ReconcileLoop;
use crds::*;
use k8s_openapi::api::core::v1::{Pod, PodSpec, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::ResourceExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// What a fake cluster read should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFailure {
    NotFound,
    KindUndefined,
    Conflict,
}

impl FakeFailure {
    fn to_error(self, what: &str) -> ClusterError {
        match self {
            FakeFailure::NotFound => ClusterError::NotFound(what.to_string()),
            FakeFailure::KindUndefined => ClusterError::KindUndefined(what.to_string()),
            FakeFailure::Conflict => ClusterError::Conflict(what.to_string()),
        }
    }
}

/// In-memory cluster implementing every client trait the controllers use.
#[derive(Clone, Default)]
pub struct FakeCluster {
    pub nnc: Arc<Mutex<Option<NodeNetworkConfig>>>,
    pub pods: Arc<Mutex<Vec<Pod>>>,
    pub get_failure: Arc<Mutex<Option<FakeFailure>>>,
    pub update_failure: Arc<Mutex<Option<FakeFailure>>>,
    pub updates: Arc<Mutex<Vec<NodeNetworkConfig>>>,
    pub pod_list_calls: Arc<AtomicUsize>,
    pub finalizers: Arc<Mutex<HashMap<String, Vec<String>>>>,
    pub states: Arc<Mutex<HashMap<String, NetworkContainerState>>>,
}

impl FakeCluster {
    pub fn with_nnc(nnc: NodeNetworkConfig) -> Self {
        let cluster = Self::default();
        *cluster.nnc.lock().unwrap() = Some(nnc);
        cluster
    }

    pub fn set_pods(&self, pods: Vec<Pod>) {
        *self.pods.lock().unwrap() = pods;
    }

    pub fn fail_get(&self, failure: FakeFailure) {
        *self.get_failure.lock().unwrap() = Some(failure);
    }

    pub fn fail_update(&self, failure: FakeFailure) {
        *self.update_failure.lock().unwrap() = Some(failure);
    }

    pub fn updates(&self) -> Vec<NodeNetworkConfig> {
        self.updates.lock().unwrap().clone()
    }

    pub fn finalizers_of(&self, name: &str) -> Option<Vec<String>> {
        self.finalizers.lock().unwrap().get(name).cloned()
    }

    pub fn state_of(&self, name: &str) -> Option<NetworkContainerState> {
        self.states.lock().unwrap().get(name).copied()
    }

    fn read(&self, name: &str) -> Result<NodeNetworkConfig, ClusterError> {
        if let Some(failure) = *self.get_failure.lock().unwrap() {
            return Err(failure.to_error(name));
        }
        self.nnc
            .lock()
            .unwrap()
            .clone()
            .filter(|nnc| nnc.name_any() == name)
            .ok_or_else(|| ClusterError::NotFound(name.to_string()))
    }
}

#[async_trait::async_trait]
impl NodeNetworkConfigClient for FakeCluster {
    async fn get(&self, name: &str, _namespace: &str) -> Result<NodeNetworkConfig, ClusterError> {
        self.read(name)
    }

    async fn update(&self, nnc: &NodeNetworkConfig) -> Result<NodeNetworkConfig, ClusterError> {
        if let Some(failure) = *self.update_failure.lock().unwrap() {
            return Err(failure.to_error(&nnc.name_any()));
        }
        self.updates.lock().unwrap().push(nnc.clone());
        *self.nnc.lock().unwrap() = Some(nnc.clone());
        Ok(nnc.clone())
    }
}

#[async_trait::async_trait]
impl NodeNetworkConfigGetter for FakeCluster {
    async fn get_direct(&self, name: &str, _namespace: &str) -> Result<NodeNetworkConfig, ClusterError> {
        self.read(name)
    }
}

#[async_trait::async_trait]
impl PodLister for FakeCluster {
    async fn list_pods(&self, _namespace: Option<&str>, node_name: &str) -> Result<Vec<Pod>, ClusterError> {
        self.pod_list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .pods
            .lock()
            .unwrap()
            .iter()
            .filter(|pod| {
                pod.spec.as_ref().and_then(|spec| spec.node_name.as_deref()) == Some(node_name)
            })
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl MultiTenantNetworkContainerClient for FakeCluster {
    async fn set_finalizers(&self, _namespace: &str, name: &str, finalizers: Vec<String>) -> Result<(), ClusterError> {
        self.finalizers.lock().unwrap().insert(name.to_string(), finalizers);
        Ok(())
    }

    async fn set_state(&self, _namespace: &str, name: &str, state: NetworkContainerState) -> Result<(), ClusterError> {
        self.states.lock().unwrap().insert(name.to_string(), state);
        Ok(())
    }
}

/// Reconcile loop that counts runs and returns a canned result.
#[derive(Clone, Default)]
pub struct FakeLoop {
    pub runs: Arc<AtomicUsize>,
    pub fail_with_kind_undefined: bool,
}

impl FakeLoop {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ReconcileLoop for FakeLoop {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<(), ControllerError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if self.fail_with_kind_undefined {
            return Err(ClusterError::KindUndefined("fakes".to_string()).into());
        }
        shutdown.cancelled().await;
        Ok(())
    }
}

/// Fatal handler that panics instead of exiting the test process.
pub fn panic_on_fatal(err: &ControllerError) -> ! {
    panic!("fatal: {}", err)
}

/// Helper to create a test NodeNetworkConfig
pub fn create_test_nnc(node_name: &str, status: Option<NodeNetworkConfigStatus>) -> NodeNetworkConfig {
    NodeNetworkConfig {
        metadata: ObjectMeta {
            name: Some(node_name.to_string()),
            namespace: Some(NODE_NETWORK_CONFIG_NAMESPACE.to_string()),
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        spec: NodeNetworkConfigSpec {
            requested_ip_count: 16,
            ips_not_in_use: vec![],
        },
        status,
    }
}

/// Helper to create a network container with `count` secondary IPs
pub fn create_test_network_container(id: &str, count: usize) -> NetworkContainer {
    NetworkContainer {
        id: id.to_string(),
        primary_ip: "10.0.0.4".to_string(),
        subnet_name: "pods".to_string(),
        ip_assignments: (0..count)
            .map(|i| IPAssignment {
                name: format!("{}-ip-{}", id, i),
                ip: format!("10.0.0.{}", 10 + i),
            })
            .collect(),
        default_gateway: "10.0.0.1".to_string(),
        subnet_address_space: "10.0.0.0/24".to_string(),
        version: 2,
    }
}

/// Helper to create a status with the given network containers
pub fn create_test_status(network_containers: Vec<NetworkContainer>) -> NodeNetworkConfigStatus {
    NodeNetworkConfigStatus {
        scaler: Scaler {
            batch_size: 10,
            release_threshold_percent: 150,
            request_threshold_percent: 50,
            max_ip_count: 250,
        },
        network_containers,
    }
}

/// Helper to create a pod scheduled on `node_name`
pub fn create_test_pod(name: &str, node_name: &str, ip: Option<&str>, host_network: bool) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            node_name: Some(node_name.to_string()),
            host_network: Some(host_network),
            ..Default::default()
        }),
        status: Some(PodStatus {
            pod_ip: ip.map(str::to_string),
            ..Default::default()
        }),
    }
}

/// Helper to create a test MultiTenantNetworkContainer
pub fn create_test_multitenant_nc(
    name: &str,
    node_name: &str,
    state: NetworkContainerState,
) -> MultiTenantNetworkContainer {
    MultiTenantNetworkContainer {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("tenant-a".to_string()),
            ..Default::default()
        },
        spec: MultiTenantNetworkContainerSpec {
            uuid: format!("{}-uuid", name),
            network: "vnet-a".to_string(),
            subnet: "subnet-a".to_string(),
            node: node_name.to_string(),
            interface_name: "eth1".to_string(),
            reservation_id: "reservation-1".to_string(),
        },
        status: Some(MultiTenantNetworkContainerStatus {
            state,
            ip: "192.168.0.4".to_string(),
            gateway: "192.168.0.1".to_string(),
            ip_subnet: "192.168.0.0/24".to_string(),
            primary_interface_identifier: "10.1.0.4".to_string(),
            mac_address: "00:0d:3a:00:00:01".to_string(),
        }),
    }
}

/// Mark a test object as being deleted
pub fn mark_deleted(nc: &mut MultiTenantNetworkContainer) {
    nc.metadata.deletion_timestamp = Some(Time(Default::default()));
}
