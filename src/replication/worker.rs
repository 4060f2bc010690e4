//! The single replication worker
//!
//! Drains the queue sequentially, fanning each task out to every active
//! destination applicable to it. Destination calls run one at a time to
//! bound simultaneous outbound requests; a failure at one destination
//! never aborts the attempts at the remaining ones.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::adapter::{AdapterSet, UploadItem};
use crate::error::CustodianError;
use crate::events::{BackupEvent, EventBroadcaster};
use crate::registry::LocationRegistry;
use crate::replication::ReplicationQueue;
use crate::store::DocumentStore;
use crate::types::{
    AdminBackupConfig, BackupTask, DocumentRecord, LocationId, LocationStatus, TaskKind,
    TaskPayload, PRIMARY_LOCATION_ID,
};

/// Pause between tasks so remote APIs are not hammered during a drain
pub const DEFAULT_TASK_PACING: Duration = Duration::from_millis(500);

/// Everything the worker needs, injected at spawn time
pub struct WorkerContext {
    pub queue: Arc<ReplicationQueue>,
    pub store: Arc<Mutex<DocumentStore>>,
    pub registry: Arc<Mutex<LocationRegistry>>,
    pub admin_config: Arc<Mutex<AdminBackupConfig>>,
    pub adapters: AdapterSet,
    pub events: EventBroadcaster,
    pub online: watch::Receiver<bool>,
    pub pacing: Duration,
}

pub struct ReplicationWorker;

impl ReplicationWorker {
    /// Spawn the worker loop. Exactly one worker drains the queue, so no
    /// per-document locking is needed anywhere downstream.
    pub fn spawn(ctx: WorkerContext, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut online = ctx.online.clone();

            loop {
                if *shutdown.borrow() {
                    break;
                }

                // Park while offline; adapter calls would only fail fast.
                if !*online.borrow() {
                    tokio::select! {
                        _ = online.changed() => {},
                        _ = shutdown.changed() => {},
                    }
                    continue;
                }

                match ctx.queue.pop() {
                    Some(task) => {
                        Self::process_task(&ctx, task).await;
                        ctx.queue.task_done();
                        tokio::time::sleep(ctx.pacing).await;
                    }
                    None => {
                        tokio::select! {
                            _ = ctx.queue.wait_for_task() => {},
                            _ = shutdown.changed() => {},
                        }
                    }
                }
            }

            tracing::info!("Replication worker stopped");
        })
    }

    async fn process_task(ctx: &WorkerContext, task: BackupTask) {
        match task.payload {
            TaskPayload::Document { ref document_id } => {
                Self::process_document(ctx, document_id).await;
            }
            TaskPayload::Snapshot { ref name, ref bytes } => {
                Self::process_snapshot(ctx, task.kind, name, bytes).await;
            }
        }
    }

    async fn process_document(ctx: &WorkerContext, document_id: &str) {
        let (record, content) = {
            let store = ctx.store.lock();
            match store.get(document_id) {
                Some(record) => (
                    record.clone(),
                    store.content(document_id).map(|c| c.to_vec()),
                ),
                None => {
                    tracing::warn!("Skipping task for deleted document {}", document_id);
                    return;
                }
            }
        };
        let Some(content) = content else {
            tracing::warn!("Document {} has no cached content, skipping", document_id);
            return;
        };

        // Applicable set: primary always, eligible secondaries per the admin
        // document toggle, plus the owning profile's personal location.
        // Lock order: admin config before registry, everywhere.
        let required_secondaries = {
            let config = ctx.admin_config.lock();
            let registry = ctx.registry.lock();
            registry.secondary_targets(|location| match &location.owner_profile {
                Some(owner) => record.profile_ref.as_deref() == Some(owner.as_str()),
                None => config.backup_types.documents,
            })
        };

        let mut targets: Vec<LocationId> = vec![PRIMARY_LOCATION_ID.to_string()];
        targets.extend(required_secondaries.iter().cloned());
        let pending: Vec<LocationId> = targets
            .into_iter()
            .filter(|id| !record.remote_refs.contains_key(id))
            .collect();

        if pending.is_empty() {
            // Already present everywhere applicable: no adapter calls.
            let mut store = ctx.store.lock();
            if let Err(e) = store.finish_sync(document_id, &required_secondaries, None) {
                tracing::warn!("Failed to finalize sync for {}: {}", document_id, e);
            }
            return;
        }

        ctx.events.emit(BackupEvent::sync_started(document_id));

        let mut first_error: Option<String> = None;
        for location_id in &pending {
            match Self::upload_to(ctx, location_id, &record, &content).await {
                Ok(()) => {}
                Err(e) => {
                    tracing::warn!(
                        "Upload of document {} to location {} failed: {}",
                        document_id,
                        location_id,
                        e
                    );
                    let _ = ctx
                        .registry
                        .lock()
                        .set_status(location_id, LocationStatus::Error);
                    if first_error.is_none() {
                        first_error = Some(e.to_string());
                    }
                }
            }
        }

        let status = {
            let mut store = ctx.store.lock();
            store.finish_sync(document_id, &required_secondaries, first_error)
        };
        match status {
            Ok(status) => {
                tracing::info!("Document {} replicated, status {}", document_id, status);
            }
            Err(e) => tracing::warn!("Failed to finalize sync for {}: {}", document_id, e),
        }
    }

    async fn upload_to(
        ctx: &WorkerContext,
        location_id: &str,
        record: &DocumentRecord,
        content: &[u8],
    ) -> crate::error::Result<()> {
        let adapter = ctx.adapters.get(location_id).ok_or_else(|| {
            CustodianError::Destination(format!(
                "no adapter registered for location '{}'",
                location_id
            ))
        })?;

        let folder_ref = ctx
            .registry
            .lock()
            .get(location_id)
            .and_then(|l| l.remote_folder_ref.clone());

        let item = UploadItem {
            name: record.name.clone(),
            bytes: content.to_vec(),
            mime_type: Some(record.mime_type.clone()),
            description: record.section_ref.clone(),
            folder_ref,
        };

        let remote = adapter.upload(&item).await?;

        {
            let mut store = ctx.store.lock();
            store.record_remote(&record.id, location_id, remote)?;
        }
        {
            let mut registry = ctx.registry.lock();
            registry.record_backup(location_id, Utc::now(), record.size_bytes)?;
            registry.set_status(location_id, LocationStatus::Active)?;
        }
        Ok(())
    }

    async fn process_snapshot(ctx: &WorkerContext, kind: TaskKind, name: &str, bytes: &[u8]) {
        let targets = {
            let config = ctx.admin_config.lock();
            let registry = ctx.registry.lock();
            let mut targets: Vec<LocationId> = vec![PRIMARY_LOCATION_ID.to_string()];
            targets.extend(registry.secondary_targets(|location| {
                if location.owner_profile.is_some() {
                    return false;
                }
                match kind {
                    TaskKind::ProfileSnapshot => config.backup_types.profile,
                    TaskKind::ConfigurationSnapshot => config.backup_types.configuration,
                    TaskKind::Document => false,
                }
            }));
            targets
        };

        let mut first_error: Option<String> = None;
        for location_id in &targets {
            let outcome = match ctx.adapters.get(location_id) {
                Some(adapter) => {
                    let folder_ref = ctx
                        .registry
                        .lock()
                        .get(location_id)
                        .and_then(|l| l.remote_folder_ref.clone());
                    let item = UploadItem {
                        name: name.to_string(),
                        bytes: bytes.to_vec(),
                        mime_type: Some("application/json".to_string()),
                        description: Some(kind.to_string()),
                        folder_ref,
                    };
                    adapter.upload(&item).await.map(|_| ())
                }
                None => Err(CustodianError::Destination(format!(
                    "no adapter registered for location '{}'",
                    location_id
                ))),
            };

            match outcome {
                Ok(()) => {
                    let mut registry = ctx.registry.lock();
                    let _ = registry.record_backup(location_id, Utc::now(), bytes.len() as u64);
                    let _ = registry.set_status(location_id, LocationStatus::Active);
                }
                Err(e) => {
                    tracing::warn!(
                        "{} upload to location {} failed: {}",
                        kind,
                        location_id,
                        e
                    );
                    let _ = ctx
                        .registry
                        .lock()
                        .set_status(location_id, LocationStatus::Error);
                    if first_error.is_none() {
                        first_error = Some(e.to_string());
                    }
                }
            }
        }

        match first_error {
            None => {
                tracing::info!("{} '{}' replicated to {} locations", kind, name, targets.len());
                ctx.events
                    .emit(BackupEvent::snapshot_completed(&kind.to_string(), name));
            }
            Some(error) => {
                ctx.events
                    .emit(BackupEvent::snapshot_failed(&kind.to_string(), name, &error));
            }
        }
    }
}
