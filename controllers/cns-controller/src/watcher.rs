//! Kubernetes resource watchers.
//!
//! `WatchRunner` drives a `kube_runtime::Controller` for one resource kind and
//! hands every change to a `ResourceReconciler`. The controller's reflector
//! store is exposed so other code can read from the same cache the watch
//! populates.

use crate::backoff::FibonacciBackoff;
use crate::cluster::ClusterError;
use crate::error::ControllerError;
use crate::lifecycle::ReconcileLoop;
use futures::StreamExt;
use kube::api::ListParams;
use kube::api::DynamicObject;
use kube::{Api, Resource, ResourceExt};
use kube_runtime::controller::{self, Action, Config as ControllerConfig};
use kube_runtime::reflector::{ObjectRef, Store};
use kube_runtime::{watcher, Controller};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const REQUEUE_MIN_SECONDS: u64 = 1;
const REQUEUE_MAX_SECONDS: u64 = 60;

/// Reconciles one resource kind.
#[async_trait::async_trait]
pub trait ResourceReconciler<K>: Send + Sync + 'static {
    async fn reconcile(&self, resource: Arc<K>) -> Result<Action, ControllerError>;
}

/// Consecutive failures per object, for requeue backoff.
#[derive(Clone, Default)]
struct ErrorCounts(Arc<Mutex<HashMap<String, u32>>>);

impl ErrorCounts {
    fn record_failure(&self, key: String) -> u32 {
        let mut counts = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let count = counts.entry(key).or_insert(0);
        *count += 1;
        *count
    }

    fn clear(&self, key: &str) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
    }
}

fn key_of(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(namespace) => format!("{}/{}", namespace, name),
        None => name.to_string(),
    }
}

fn object_key<K: Resource>(obj: &K) -> String {
    key_of(obj.namespace().as_deref(), &obj.name_any())
}

/// Drop the failure count of an object that left the store while it was
/// waiting on a requeue. The error policy never sees it again.
fn forget_deleted(counts: &ErrorCounts, obj_ref: &ObjectRef<DynamicObject>) {
    counts.clear(&key_of(obj_ref.namespace.as_deref(), &obj_ref.name));
}

/// Pull a kind-not-defined error out of a watch failure, if that is what it is.
fn kind_undefined(err: watcher::Error) -> Option<ClusterError> {
    let kube_err = match err {
        watcher::Error::InitialListFailed(e)
        | watcher::Error::WatchStartFailed(e)
        | watcher::Error::WatchFailed(e) => e,
        _ => return None,
    };
    match ClusterError::from_kube(kube_err) {
        err @ ClusterError::KindUndefined(_) => Some(err),
        _ => None,
    }
}

/// Watch loop for a single resource kind.
pub struct WatchRunner<K, R>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Debug + Unpin,
{
    api: Api<K>,
    controller: Mutex<Option<Controller<K>>>,
    store: Store<K>,
    reconciler: Arc<R>,
    resource_name: &'static str,
}

impl<K, R> WatchRunner<K, R>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Debug + Unpin,
    R: ResourceReconciler<K>,
{
    /// Build the runner. Nothing is watched until `run` is called, but the
    /// store is available immediately (empty until the first list).
    pub fn new(api: Api<K>, watcher_config: watcher::Config, reconciler: R, resource_name: &'static str) -> Self {
        let controller = Controller::new(api.clone(), watcher_config);
        let store = controller.store();
        Self {
            api,
            controller: Mutex::new(Some(controller)),
            store,
            reconciler: Arc::new(reconciler),
            resource_name,
        }
    }

    /// Cache populated by this runner's watch.
    pub fn store(&self) -> Store<K> {
        self.store.clone()
    }

    /// List one item to find out whether the kind is served at all.
    async fn probe_kind(&self) -> Result<(), ControllerError> {
        match self.api.list(&ListParams::default().limit(1)).await {
            Ok(_) => Ok(()),
            Err(e) => match ClusterError::from_kube(e) {
                err @ ClusterError::KindUndefined(_) => Err(err.into()),
                // The watch retries on its own
                err => {
                    warn!("Probing {} failed, starting watch anyway: {}", self.resource_name, err);
                    Ok(())
                }
            },
        }
    }
}

#[async_trait::async_trait]
impl<K, R> ReconcileLoop for WatchRunner<K, R>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Debug + Unpin,
    R: ResourceReconciler<K>,
{
    fn name(&self) -> &'static str {
        self.resource_name
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<(), ControllerError> {
        let controller = self
            .controller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| ControllerError::Watch(format!("{} watcher already ran", self.resource_name)))?;

        self.probe_kind().await?;
        info!("Starting {} watcher", self.resource_name);

        let resource_name = self.resource_name;
        let error_counts = ErrorCounts::default();

        let policy_counts = error_counts.clone();
        let reconcile_counts = error_counts.clone();
        let error_policy = move |obj: Arc<K>, error: &ControllerError, _ctx: Arc<R>| {
            let failures = policy_counts.record_failure(object_key(obj.as_ref()));
            let delay = FibonacciBackoff::delay_for_error_count(
                failures.saturating_sub(1),
                REQUEUE_MIN_SECONDS,
                REQUEUE_MAX_SECONDS,
            );
            error!(
                "Reconciliation error for {} {} (attempt {}, retrying in {:?}): {}",
                resource_name,
                obj.name_any(),
                failures,
                delay,
                error
            );
            Action::requeue(delay)
        };

        let reconcile = move |obj: Arc<K>, ctx: Arc<R>| {
            let error_counts = reconcile_counts.clone();
            async move {
                debug!("Reconciling {} {}", resource_name, obj.name_any());
                let action = ctx.reconcile(obj.clone()).await?;
                error_counts.clear(&object_key(obj.as_ref()));
                Ok::<Action, ControllerError>(action)
            }
        };

        // One object per node, so reconciles are serialized
        let controller_config = ControllerConfig::default()
            .debounce(Duration::from_secs(1))
            .concurrency(1);

        let mut results = Box::pin(
            controller
                .with_config(controller_config)
                .graceful_shutdown_on(async move { shutdown.cancelled().await })
                .run(reconcile, error_policy, self.reconciler.clone()),
        );

        while let Some(result) = results.next().await {
            match result {
                Ok((obj, _)) => debug!("Reconciled {} {}", resource_name, obj.name),
                Err(controller::Error::QueueError(watch_err)) => {
                    let message = watch_err.to_string();
                    if let Some(err) = kind_undefined(watch_err) {
                        return Err(err.into());
                    }
                    warn!("{} watch error: {}", resource_name, message);
                }
                Err(controller::Error::ObjectNotFound(obj_ref)) => {
                    debug!("{} {} is gone, dropping its retry state", resource_name, obj_ref.name);
                    forget_deleted(&error_counts, &obj_ref);
                }
                // Already logged by the error policy
                Err(controller::Error::ReconcilerFailed(..)) => {}
                Err(e) => error!("Controller error for {}: {}", resource_name, e),
            }
        }

        info!("{} watcher stopped", resource_name);
        Ok(())
    }
}
