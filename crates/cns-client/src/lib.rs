//! Container Networking Service (CNS) client
//!
//! Types and client used by the node controllers to push desired network
//! container state into the node-local CNS, plus the IP configuration state
//! filters used by IP allocation.
//!
//! # Example
//!
//! ```no_run
//! use cns_client::{CnsClient, CnsClientTrait};
//! use crds::{NodeNetworkConfigSpec, Scaler};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = CnsClient::new("http://localhost:10090".to_string())?;
//!
//! // Node has no network container yet: forward scaler and spec only
//! client
//!     .reconcile_nc_state(None, None, Scaler::default(), NodeNetworkConfigSpec::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod filter;
pub mod models;
#[path = "trait.rs"]
pub mod cns_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::CnsClient;
pub use error::CnsError;
pub use models::*;
pub use cns_trait::CnsClientTrait;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockCnsClient, MockNodeState, ReconcileCall};
