//! Controller-specific error types.
//!
//! Cluster failures arrive already classified as `ClusterError`; everything a
//! controller operation can fail with is folded into `ControllerError`.

use crate::cluster::ClusterError;
use crate::translate::TranslationError;
use cns_client::CnsError;
use thiserror::Error;

/// Errors that can occur in the CNS node controllers.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error, classified at the client boundary
    #[error("Kubernetes error: {0}")]
    Cluster(#[from] ClusterError),

    /// CNS rejected or failed a reconcile call
    #[error("CNS error: {0}")]
    Cns(#[from] CnsError),

    /// Cluster state could not be turned into a CNS request
    #[error("Translation failed: {0}")]
    Translation(#[from] TranslationError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Lifecycle operation called in the wrong state
    #[error("Invalid lifecycle transition: {0}")]
    InvalidTransition(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Local HTTP API could not bind or serve
    #[error("API server error: {0}")]
    Server(#[from] std::io::Error),
}

impl ControllerError {
    /// True when the resource kind is not served by the cluster.
    ///
    /// Nothing this process does can fix that, so callers treat it as fatal.
    pub fn is_kind_undefined(&self) -> bool {
        matches!(self, ControllerError::Cluster(ClusterError::KindUndefined(_)))
    }
}
