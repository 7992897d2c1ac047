//! Node networking CRD definitions
//!
//! Kubernetes custom resources consumed by the node network controllers.

pub mod node_network_config;
pub mod multitenant_network_container;

pub use node_network_config::*;
pub use multitenant_network_container::*;
