//! Process configuration, read from environment variables.

use crate::error::ControllerError;
use crds::NODE_NETWORK_CONFIG_NAMESPACE;
use std::env;
use std::net::SocketAddr;

const DEFAULT_CNS_URL: &str = "http://localhost:10090";
const DEFAULT_INIT_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_API_ADDR: &str = "127.0.0.1:10092";

/// Configuration shared by the node controllers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Name of the node this agent runs on (`NODENAME`)
    pub node_name: String,
    /// CNS base URL (`CNS_URL`)
    pub cns_url: String,
    /// Namespace holding the NodeNetworkConfig objects (`NNC_NAMESPACE`)
    pub namespace: String,
    /// Run the multi-tenant controller instead of the request controller (`ENABLE_MULTITENANCY`)
    pub enable_multitenancy: bool,
    /// Cold-start attempts before giving up (`INIT_MAX_ATTEMPTS`)
    pub init_max_attempts: u32,
    /// Listen address of the local spec and probe API (`API_ADDR`)
    pub api_addr: SocketAddr,
}

impl ControllerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let node_name = lookup("NODENAME")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ControllerError::InvalidConfig("NODENAME environment variable is required".to_string())
            })?;

        let cns_url = lookup("CNS_URL").unwrap_or_else(|| DEFAULT_CNS_URL.to_string());
        let namespace = lookup("NNC_NAMESPACE").unwrap_or_else(|| NODE_NETWORK_CONFIG_NAMESPACE.to_string());
        if namespace.trim().is_empty() {
            return Err(ControllerError::InvalidConfig("NNC_NAMESPACE must not be empty".to_string()));
        }

        let enable_multitenancy = match lookup("ENABLE_MULTITENANCY").as_deref().map(str::trim) {
            None | Some("") => false,
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => true,
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => false,
            Some(v) => {
                return Err(ControllerError::InvalidConfig(format!(
                    "ENABLE_MULTITENANCY must be true or false, got {:?}",
                    v
                )));
            }
        };

        let init_max_attempts = match lookup("INIT_MAX_ATTEMPTS") {
            None => DEFAULT_INIT_MAX_ATTEMPTS,
            Some(v) => v
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ControllerError::InvalidConfig(format!(
                        "INIT_MAX_ATTEMPTS must be a positive integer, got {:?}",
                        v
                    ))
                })?,
        };

        let api_addr_raw = lookup("API_ADDR").unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let api_addr = api_addr_raw.trim().parse::<SocketAddr>().map_err(|e| {
            ControllerError::InvalidConfig(format!("API_ADDR {:?} is not a socket address: {}", api_addr_raw, e))
        })?;

        Ok(Self {
            node_name,
            cns_url,
            namespace,
            enable_multitenancy,
            init_max_attempts,
            api_addr,
        })
    }
}
