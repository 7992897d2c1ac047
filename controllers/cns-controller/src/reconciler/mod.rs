//! Reconcilers for the watched resources.
//!
//! Each reconciler turns one observed object into CNS calls. They are driven
//! by a `WatchRunner`, which may deliver the same state more than once.

pub mod multitenant;
pub mod node_network_config;

pub use multitenant::MultiTenantReconciler;
pub use node_network_config::NodeNetworkConfigReconciler;
