//! CNS API client
//!
//! Talks to the node-local container networking service over its REST API.
//! Every call is a JSON POST answered with a `Response { ReturnCode, Message }`
//! envelope; a non-zero return code is surfaced as `CnsError::Api`.

use crate::cns_trait::CnsClientTrait;
use crate::error::CnsError;
use crate::models::{CnsResponse, CreateNetworkContainerRequest, PodInfo};
use crds::{NodeNetworkConfigSpec, Scaler};
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const RECONCILE_NC_STATE_PATH: &str = "/network/reconcilencstate";
const CREATE_OR_UPDATE_NC_PATH: &str = "/network/createorupdatenetworkcontainer";
const DELETE_NC_PATH: &str = "/network/deletenetworkcontainer";

/// Return code CNS uses when a network container id is unknown.
const UNKNOWN_CONTAINER_ID: i32 = 18;

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReconcileNCStateBody<'a> {
    #[serde(rename = "NCRequest")]
    nc_request: Option<&'a CreateNetworkContainerRequest>,
    #[serde(rename = "PodInfoByIP")]
    pod_info_by_ip: Option<&'a HashMap<String, PodInfo>>,
    scaler: &'a Scaler,
    spec: &'a NodeNetworkConfigSpec,
}

#[derive(Serialize)]
struct DeleteNetworkContainerBody<'a> {
    #[serde(rename = "NetworkContainerid")]
    network_container_id: &'a str,
}

/// CNS API client
pub struct CnsClient {
    client: Client,
    base_url: String,
}

impl CnsClient {
    /// Create a new CNS client
    ///
    /// # Arguments
    /// * `base_url` - CNS base URL (e.g., "http://localhost:10090")
    pub fn new(base_url: String) -> Result<Self, CnsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON body and unwrap the CNS response envelope.
    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<CnsResponse, CnsError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self.client
            .post(&url)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(CnsError::Api {
                code: i32::from(status.as_u16()),
                message: format!("POST {} failed: {} - {}", path, status, text),
            });
        }

        let envelope: CnsResponse = serde_json::from_str(&text)?;
        Ok(envelope)
    }

    fn check(envelope: CnsResponse) -> Result<(), CnsError> {
        match envelope.response.return_code {
            0 => Ok(()),
            code => Err(CnsError::Api {
                code,
                message: envelope.response.message,
            }),
        }
    }
}

#[async_trait::async_trait]
impl CnsClientTrait for CnsClient {
    async fn reconcile_nc_state(
        &self,
        request: Option<CreateNetworkContainerRequest>,
        pod_info_by_ip: Option<HashMap<String, PodInfo>>,
        scaler: Scaler,
        spec: NodeNetworkConfigSpec,
    ) -> Result<(), CnsError> {
        let body = ReconcileNCStateBody {
            nc_request: request.as_ref(),
            pod_info_by_ip: pod_info_by_ip.as_ref(),
            scaler: &scaler,
            spec: &spec,
        };
        Self::check(self.post(RECONCILE_NC_STATE_PATH, &body).await?)
    }

    async fn create_or_update_network_container(
        &self,
        request: CreateNetworkContainerRequest,
    ) -> Result<(), CnsError> {
        if request.network_container_id.is_empty() {
            return Err(CnsError::InvalidRequest("network container id is empty".to_string()));
        }
        Self::check(self.post(CREATE_OR_UPDATE_NC_PATH, &request).await?)
    }

    async fn delete_network_container(&self, network_container_id: &str) -> Result<(), CnsError> {
        let body = DeleteNetworkContainerBody { network_container_id };
        let envelope = self.post(DELETE_NC_PATH, &body).await?;
        if envelope.response.return_code == UNKNOWN_CONTAINER_ID {
            debug!("Network container {} already absent from CNS", network_container_id);
            return Ok(());
        }
        Self::check(envelope)
    }
}
