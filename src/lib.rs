//! Custodian - backup and replication orchestration
//!
//! Propagates documents and organization-profile snapshots to an ordered
//! set of storage destinations (one primary object store plus secondary
//! cloud-drive accounts), tracking per-item sync state, riding out
//! destination failures and offline periods, and exposing aggregate
//! health to operators.

pub mod adapter;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod events;
pub mod registry;
pub mod replication;
pub mod scheduler;
pub mod service;
pub mod stats;
pub mod store;
pub mod types;

pub use error::{CustodianError, Result};
pub use service::BackupService;
pub use store::DocumentUpload;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
