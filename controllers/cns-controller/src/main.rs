//! CNS Node Controller
//!
//! Node agent that keeps the local container networking service (CNS) in
//! step with the cluster:
//! - NodeNetworkConfig: this node's network container, IP pool scaler and spec
//! - MultiTenantNetworkContainer: tenant containers scheduled on this node
//!   (when `ENABLE_MULTITENANCY` is set)
//!
//! A local HTTP API serves probes and lets CNS write the node's spec back.

mod api;
mod backoff;
mod cluster;
mod config;
mod error;
mod lifecycle;
mod multitenant_controller;
mod reconciler;
mod request_controller;
#[cfg(test)]
mod test_utils;
mod translate;
#[cfg(test)]
mod translate_test;
mod watcher;

use crate::backoff::FibonacciBackoff;
use crate::cluster::ClusterError;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::multitenant_controller::KubeMultiTenantController;
use crate::request_controller::KubeRequestController;
use cns_client::{CnsClient, CnsClientTrait};
use axum::Router;
use kube::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn};

fn initialize_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal");
            shutdown.cancel();
        }
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}

fn spawn_api(router: Router, addr: SocketAddr, shutdown: CancellationToken) -> JoinHandle<Result<(), ControllerError>> {
    tokio::spawn(api::serve(router, addr, shutdown))
}

/// Stop the API and surface any error it hit while serving.
async fn stop_api(
    api: JoinHandle<Result<(), ControllerError>>,
    shutdown: &CancellationToken,
) -> Result<(), ControllerError> {
    shutdown.cancel();
    api.await
        .map_err(|e| ControllerError::Watch(format!("API server task failed: {}", e)))?
}

async fn run_request_controller(
    kube_client: Client,
    cns_client: Arc<dyn CnsClientTrait>,
    config: &ControllerConfig,
    shutdown: CancellationToken,
) -> Result<(), ControllerError> {
    let span = info_span!("request_controller", node = %config.node_name);
    let controller = Arc::new(KubeRequestController::new(kube_client, cns_client, config, span)?);

    let router = api::probe_routes(controller.clone()).merge(api::spec_routes(controller.clone()));
    let api_task = spawn_api(router, config.api_addr, shutdown.clone());

    // Cold start must succeed before the watch runs
    let mut backoff = FibonacciBackoff::new(1, 30);
    let mut attempt = 1;
    loop {
        match controller.init().await {
            Ok(()) => break,
            Err(e) if attempt < config.init_max_attempts => {
                let delay = backoff.next_backoff();
                warn!(
                    "Initializing CNS failed (attempt {}/{}), retrying in {:?}: {}",
                    attempt, config.init_max_attempts, delay, e
                );
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = shutdown.cancelled() => return stop_api(api_task, &shutdown).await,
                }
                attempt += 1;
            }
            Err(e) => {
                error!("Initializing CNS failed after {} attempts: {}", attempt, e);
                shutdown.cancel();
                return Err(e);
            }
        }
    }

    let watch = tokio::spawn({
        let controller = controller.clone();
        let shutdown = shutdown.clone();
        async move { controller.start(shutdown).await }
    });
    let result = watch
        .await
        .map_err(|e| ControllerError::Watch(format!("request controller task failed: {}", e)))?;
    stop_api(api_task, &shutdown).await?;
    result
}

async fn run_multitenant_controller(
    kube_client: Client,
    cns_client: Arc<dyn CnsClientTrait>,
    config: &ControllerConfig,
    shutdown: CancellationToken,
) -> Result<(), ControllerError> {
    let span = info_span!("multitenant_controller", node = %config.node_name);
    let controller = Arc::new(KubeMultiTenantController::new(kube_client, cns_client, config, span)?);

    let api_task = spawn_api(api::probe_routes(controller.clone()), config.api_addr, shutdown.clone());

    let watch = tokio::spawn({
        let controller = controller.clone();
        let shutdown = shutdown.clone();
        async move { controller.start(shutdown).await }
    });
    let result = watch
        .await
        .map_err(|e| ControllerError::Watch(format!("multi-tenant controller task failed: {}", e)))?;
    stop_api(api_task, &shutdown).await?;
    result
}

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    initialize_logging();

    info!("Starting CNS Node Controller");

    let config = ControllerConfig::from_env()?;
    info!("Configuration:");
    info!("  Node: {}", config.node_name);
    info!("  CNS URL: {}", config.cns_url);
    info!("  NodeNetworkConfig namespace: {}", config.namespace);
    info!("  Multi-tenancy: {}", config.enable_multitenancy);
    info!("  API address: {}", config.api_addr);

    // Both kube and reqwest use rustls; pin the provider before either builds a client
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("rustls crypto provider already installed");
    }

    let kube_client = Client::try_default().await.map_err(ClusterError::from_kube)?;
    let cns_client: Arc<dyn CnsClientTrait> = Arc::new(CnsClient::new(config.cns_url.clone())?);

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

    if config.enable_multitenancy {
        run_multitenant_controller(kube_client, cns_client, &config, shutdown).await?;
    } else {
        run_request_controller(kube_client, cns_client, &config, shutdown).await?;
    }

    info!("CNS Node Controller stopped");
    Ok(())
}
