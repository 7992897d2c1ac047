//! Local HTTP API.
//!
//! CNS runs as its own process next to this agent and asks for spec changes
//! over HTTP:
//! - `PUT /v1/nodenetworkconfig/spec` writes the node's desired spec
//! - `GET /readyz` answers 200 once the controller's watch is running
//! - `GET /healthz` answers "ok" while the process is up

use crate::cluster::ClusterError;
use crate::error::ControllerError;
use crate::lifecycle::ReconcileLoop;
use crate::multitenant_controller::MultiTenantController;
use crate::request_controller::RequestController;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, put};
use axum::Router;
use crds::NodeNetworkConfigSpec;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Something that can report whether its reconcile loop is running.
pub trait Readiness: Send + Sync {
    fn is_started(&self) -> bool;
}

/// Writes the node's desired spec back to the cluster.
#[async_trait::async_trait]
pub trait SpecWriter: Send + Sync {
    async fn update_spec(&self, spec: NodeNetworkConfigSpec) -> Result<(), ControllerError>;
}

impl<L: ReconcileLoop> Readiness for RequestController<L> {
    fn is_started(&self) -> bool {
        RequestController::is_started(self)
    }
}

#[async_trait::async_trait]
impl<L: ReconcileLoop> SpecWriter for RequestController<L> {
    async fn update_spec(&self, spec: NodeNetworkConfigSpec) -> Result<(), ControllerError> {
        RequestController::update_spec(self, spec).await
    }
}

impl<L: ReconcileLoop> Readiness for MultiTenantController<L> {
    fn is_started(&self) -> bool {
        MultiTenantController::is_started(self)
    }
}

/// Liveness and readiness probes.
pub fn probe_routes(ready: Arc<dyn Readiness>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readyz))
        .with_state(ready)
}

/// Spec write-back endpoint.
pub fn spec_routes(writer: Arc<dyn SpecWriter>) -> Router {
    Router::new()
        .route("/v1/nodenetworkconfig/spec", put(put_spec))
        .with_state(writer)
}

async fn readyz(State(ready): State<Arc<dyn Readiness>>) -> (StatusCode, &'static str) {
    if ready.is_started() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not started")
    }
}

/// Handle `PUT /v1/nodenetworkconfig/spec`
async fn put_spec(
    State(writer): State<Arc<dyn SpecWriter>>,
    Json(spec): Json<NodeNetworkConfigSpec>,
) -> Result<StatusCode, (StatusCode, String)> {
    writer.update_spec(spec).await.map_err(|e| {
        warn!("Spec update failed: {}", e);
        (status_for(&e), e.to_string())
    })?;
    Ok(StatusCode::NO_CONTENT)
}

fn status_for(err: &ControllerError) -> StatusCode {
    match err {
        ControllerError::Cluster(ClusterError::Conflict(_)) => StatusCode::CONFLICT,
        ControllerError::Cluster(ClusterError::NotFound(_)) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Serve `router` on `addr` until `shutdown` fires.
pub async fn serve(router: Router, addr: SocketAddr, shutdown: CancellationToken) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Local API listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("Local API stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request_controller::ClusterClients;
    use crate::test_utils::*;
    use axum::body::Body;
    use axum::http::Request;
    use cns_client::MockCnsClient;
    use tower::ServiceExt;
    use tracing::Span;

    fn controller(cluster: &FakeCluster) -> Arc<RequestController<FakeLoop>> {
        let clients = ClusterClients {
            cached: Arc::new(cluster.clone()),
            nnc_getter: Arc::new(cluster.clone()),
            pod_lister: Arc::new(cluster.clone()),
        };
        let controller = RequestController::with_clients(
            FakeLoop::default(),
            clients,
            Arc::new(MockCnsClient::new()),
            "node-1".to_string(),
            "kube-system".to_string(),
            Span::none(),
        )
        .unwrap()
        .with_fatal_handler(panic_on_fatal);
        Arc::new(controller)
    }

    fn router(controller: Arc<RequestController<FakeLoop>>) -> Router {
        probe_routes(controller.clone()).merge(spec_routes(controller))
    }

    fn put_spec_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri("/v1/nodenetworkconfig/spec")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_put_spec_updates_node_network_config() {
        let cluster = FakeCluster::with_nnc(create_test_nnc("node-1", None));
        let router = router(controller(&cluster));

        let response = router
            .oneshot(put_spec_request(r#"{"requestedIPCount":32,"ipsNotInUse":["nc-1-ip-0"]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let updates = cluster.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].spec.requested_ip_count, 32);
        assert_eq!(updates[0].spec.ips_not_in_use, vec!["nc-1-ip-0".to_string()]);
    }

    #[tokio::test]
    async fn test_put_spec_conflict() {
        let cluster = FakeCluster::with_nnc(create_test_nnc("node-1", None));
        cluster.fail_update(FakeFailure::Conflict);
        let router = router(controller(&cluster));

        let response = router.oneshot(put_spec_request(r#"{"requestedIPCount":16}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_put_spec_without_node_network_config() {
        let cluster = FakeCluster::default();
        let router = router(controller(&cluster));

        let response = router.oneshot(put_spec_request(r#"{"requestedIPCount":16}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(cluster.updates().is_empty());
    }

    #[tokio::test]
    async fn test_put_spec_rejects_malformed_body() {
        let cluster = FakeCluster::with_nnc(create_test_nnc("node-1", None));
        let router = router(controller(&cluster));

        let response = router.oneshot(put_spec_request("not json")).await.unwrap();
        assert!(response.status().is_client_error());
        assert!(cluster.updates().is_empty());
    }

    #[tokio::test]
    async fn test_readyz_follows_lifecycle() {
        let cluster = FakeCluster::with_nnc(create_test_nnc("node-1", None));
        let controller = controller(&cluster);

        let response = router(controller.clone()).oneshot(get_request("/readyz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        controller.init().await.unwrap();
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        controller.start(shutdown).await.unwrap();

        let response = router(controller).oneshot(get_request("/readyz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_healthz() {
        let cluster = FakeCluster::default();
        let response = router(controller(&cluster)).oneshot(get_request("/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
