//! Uniform destination adapter contract
//!
//! One adapter per configured location. Concrete providers (object-store
//! HTTP upload, cloud-drive APIs) live outside the core; the replication
//! worker only sees this trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::types::{LocationId, RemoteRef};

/// One item handed to an adapter for upload
#[derive(Debug, Clone)]
pub struct UploadItem {
    /// Name at the destination
    pub name: String,
    /// Raw content
    pub bytes: Vec<u8>,
    /// MIME type, when known
    pub mime_type: Option<String>,
    /// Human-readable description stored alongside, where supported
    pub description: Option<String>,
    /// Destination folder, when the location has one configured
    pub folder_ref: Option<String>,
}

/// Space usage reported by a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaInfo {
    pub used: u64,
    pub limit: Option<u64>,
}

/// Uniform contract every destination implements.
///
/// Errors come back as [`crate::CustodianError::Destination`]; the worker
/// records them on the document and location without aborting the fan-out.
#[async_trait]
pub trait DestinationAdapter: Send + Sync {
    /// Upload an item, returning the opaque remote reference
    async fn upload(&self, item: &UploadItem) -> Result<RemoteRef>;

    /// Delete a previously uploaded item
    async fn delete(&self, remote_id: &str) -> Result<()>;

    /// Lightweight reachability probe. A capability check, not an upload;
    /// safe to call frequently from a dashboard.
    async fn probe(&self) -> Result<()>;

    /// Space usage, if the destination reports it
    async fn quota(&self) -> Result<Option<QuotaInfo>> {
        Ok(None)
    }
}

/// Per-location adapter dispatch table
#[derive(Default, Clone)]
pub struct AdapterSet {
    inner: Arc<RwLock<HashMap<LocationId, Arc<dyn DestinationAdapter>>>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, location_id: impl Into<LocationId>, adapter: Arc<dyn DestinationAdapter>) {
        self.inner.write().insert(location_id.into(), adapter);
    }

    pub fn unregister(&self, location_id: &str) {
        self.inner.write().remove(location_id);
    }

    pub fn get(&self, location_id: &str) -> Option<Arc<dyn DestinationAdapter>> {
        self.inner.read().get(location_id).cloned()
    }

    pub fn registered_ids(&self) -> Vec<LocationId> {
        self.inner.read().keys().cloned().collect()
    }
}
