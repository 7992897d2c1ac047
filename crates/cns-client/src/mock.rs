//! Mock CnsClient for unit testing
//!
//! Keeps the state CNS would hold in memory and records every call so tests
//! can assert on exactly what a controller pushed.

use crate::cns_trait::CnsClientTrait;
use crate::error::CnsError;
use crate::models::{CreateNetworkContainerRequest, PodInfo};
use crds::{NodeNetworkConfigSpec, Scaler};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Arguments of one `reconcile_nc_state` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileCall {
    pub request: Option<CreateNetworkContainerRequest>,
    pub pod_info_by_ip: Option<HashMap<String, PodInfo>>,
    pub scaler: Scaler,
    pub spec: NodeNetworkConfigSpec,
}

/// Observable node state inside the mock CNS.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockNodeState {
    pub network_containers: BTreeMap<String, CreateNetworkContainerRequest>,
    pub pod_info_by_ip: HashMap<String, PodInfo>,
    pub scaler: Scaler,
    pub spec: NodeNetworkConfigSpec,
}

/// Mock CnsClient for testing
#[derive(Clone, Default)]
pub struct MockCnsClient {
    pub(crate) state: Arc<Mutex<MockNodeState>>,
    pub(crate) reconcile_calls: Arc<Mutex<Vec<ReconcileCall>>>,
    pub(crate) deleted: Arc<Mutex<Vec<String>>>,
    pub(crate) fail_with: Arc<Mutex<Option<String>>>,
}

impl MockCnsClient {
    /// Create a new mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail with a CNS API error.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.fail_with.lock().unwrap() = Some(message.into());
    }

    /// Clear a previously configured failure.
    pub fn clear_failure(&self) {
        *self.fail_with.lock().unwrap() = None;
    }

    /// All `reconcile_nc_state` calls, oldest first.
    pub fn reconcile_calls(&self) -> Vec<ReconcileCall> {
        self.reconcile_calls.lock().unwrap().clone()
    }

    /// Ids passed to `delete_network_container`, oldest first.
    pub fn deleted_network_containers(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    /// Snapshot of the state CNS currently holds.
    pub fn node_state(&self) -> MockNodeState {
        self.state.lock().unwrap().clone()
    }

    fn check_failure(&self) -> Result<(), CnsError> {
        match self.fail_with.lock().unwrap().as_ref() {
            Some(message) => Err(CnsError::Api {
                code: 1,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl CnsClientTrait for MockCnsClient {
    async fn reconcile_nc_state(
        &self,
        request: Option<CreateNetworkContainerRequest>,
        pod_info_by_ip: Option<HashMap<String, PodInfo>>,
        scaler: Scaler,
        spec: NodeNetworkConfigSpec,
    ) -> Result<(), CnsError> {
        self.check_failure()?;
        self.reconcile_calls.lock().unwrap().push(ReconcileCall {
            request: request.clone(),
            pod_info_by_ip: pod_info_by_ip.clone(),
            scaler: scaler.clone(),
            spec: spec.clone(),
        });

        let mut state = self.state.lock().unwrap();
        if let Some(request) = request {
            state
                .network_containers
                .insert(request.network_container_id.clone(), request);
        }
        if let Some(pods) = pod_info_by_ip {
            state.pod_info_by_ip = pods;
        }
        state.scaler = scaler;
        state.spec = spec;
        Ok(())
    }

    async fn create_or_update_network_container(
        &self,
        request: CreateNetworkContainerRequest,
    ) -> Result<(), CnsError> {
        self.check_failure()?;
        self.state
            .lock()
            .unwrap()
            .network_containers
            .insert(request.network_container_id.clone(), request);
        Ok(())
    }

    async fn delete_network_container(&self, network_container_id: &str) -> Result<(), CnsError> {
        self.check_failure()?;
        self.deleted.lock().unwrap().push(network_container_id.to_string());
        self.state
            .lock()
            .unwrap()
            .network_containers
            .remove(network_container_id);
        Ok(())
    }
}
