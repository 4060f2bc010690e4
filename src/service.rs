//! The backup service facade
//!
//! One `BackupService` is constructed at process start and handed to every
//! caller; all shared state lives behind it. Internally the registry,
//! store, and configuration sit behind single mutexes and are mutated only
//! by the worker loop and direct operator calls, so no further locking
//! discipline is needed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::adapter::{AdapterSet, DestinationAdapter};
use crate::config::{
    drive_location_id, validate_account, validate_admin_config, ConfigStore, ADMIN_CONFIG_KEY,
};
use crate::connectivity::ConnectivityMonitor;
use crate::error::{CustodianError, Result};
use crate::events::{BackupEvent, EventBroadcaster, EventStream, SubscriptionFilter};
use crate::registry::LocationRegistry;
use crate::replication::{ReplicationQueue, ReplicationWorker, WorkerContext, DEFAULT_TASK_PACING};
use crate::scheduler::{PeriodicScheduler, SchedulerContext};
use crate::stats::compute_stats;
use crate::store::{DocumentStore, DocumentUpload};
use crate::types::{
    AdminBackupConfig, BackupLocation, BackupStats, BackupTask, DocumentRecord, DriveAccount,
    LocationId, LocationKind, ProfileData, TaskPriority,
};

struct ServiceInner {
    registry: Arc<Mutex<LocationRegistry>>,
    store: Arc<Mutex<DocumentStore>>,
    admin_config: Arc<Mutex<AdminBackupConfig>>,
    active_profile: Arc<Mutex<Option<ProfileData>>>,
    adapters: AdapterSet,
    queue: Arc<ReplicationQueue>,
    events: EventBroadcaster,
    config_store: Arc<dyn ConfigStore>,
}

pub struct BackupService {
    inner: Arc<ServiceInner>,
    online_tx: watch::Sender<bool>,
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl BackupService {
    /// Construct the service, loading persisted registry and admin config
    /// from the config store and starting the worker, scheduler, and
    /// connectivity monitor.
    pub fn new(config_store: Arc<dyn ConfigStore>) -> Result<Self> {
        Self::with_pacing(config_store, DEFAULT_TASK_PACING)
    }

    /// As [`new`](Self::new) with an explicit inter-task pacing delay
    pub fn with_pacing(config_store: Arc<dyn ConfigStore>, pacing: Duration) -> Result<Self> {
        let events = EventBroadcaster::new();

        let registry = Arc::new(Mutex::new(LocationRegistry::load(
            config_store.clone(),
            events.clone(),
        )?));

        let admin_config: AdminBackupConfig = match config_store.get(ADMIN_CONFIG_KEY)? {
            Some(value) => serde_json::from_value(value)?,
            None => AdminBackupConfig::default(),
        };
        let admin_config = Arc::new(Mutex::new(admin_config));

        let store = Arc::new(Mutex::new(DocumentStore::new(events.clone())));
        let queue = Arc::new(ReplicationQueue::new());
        let adapters = AdapterSet::new();
        let active_profile = Arc::new(Mutex::new(None));

        let (online_tx, online_rx) = watch::channel(true);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = ReplicationWorker::spawn(
            WorkerContext {
                queue: queue.clone(),
                store: store.clone(),
                registry: registry.clone(),
                admin_config: admin_config.clone(),
                adapters: adapters.clone(),
                events: events.clone(),
                online: online_rx.clone(),
                pacing,
            },
            shutdown_rx.clone(),
        );

        let monitor = ConnectivityMonitor::spawn(
            online_rx,
            store.clone(),
            queue.clone(),
            events.clone(),
            shutdown_rx.clone(),
        );

        let scheduler = PeriodicScheduler::spawn(
            SchedulerContext {
                queue: queue.clone(),
                registry: registry.clone(),
                admin_config: admin_config.clone(),
                active_profile: active_profile.clone(),
            },
            shutdown_rx,
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                registry,
                store,
                admin_config,
                active_profile,
                adapters,
                queue,
                events,
                config_store,
            }),
            online_tx,
            shutdown_tx,
            handles: Mutex::new(vec![worker, monitor, scheduler]),
        })
    }

    /// Register the adapter serving one location. Locations without an
    /// adapter fail their destination attempts until one is registered.
    pub fn register_adapter(
        &self,
        location_id: impl Into<LocationId>,
        adapter: Arc<dyn DestinationAdapter>,
    ) {
        self.inner.adapters.register(location_id, adapter);
    }

    /// All registered locations with their live status
    pub fn backup_status(&self) -> Vec<BackupLocation> {
        self.inner.registry.lock().list()
    }

    /// Summary statistics for dashboards
    pub fn backup_stats(&self) -> BackupStats {
        let locations = self.inner.registry.lock().list();
        compute_stats(&locations, self.inner.queue.depth())
    }

    /// Probe every registered location's adapter. Read-only: location
    /// status is not touched, so this is safe to call from a dashboard.
    pub async fn test_backup_connectivity(&self) -> HashMap<LocationId, bool> {
        let ids: Vec<LocationId> = self
            .inner
            .registry
            .lock()
            .list()
            .into_iter()
            .map(|l| l.id)
            .collect();

        let mut results = HashMap::new();
        for id in ids {
            let reachable = match self.inner.adapters.get(&id) {
                Some(adapter) => adapter.probe().await.is_ok(),
                None => false,
            };
            results.insert(id, reachable);
        }
        results
    }

    /// Refresh space-usage numbers from every adapter that reports them
    pub async fn refresh_quotas(&self) {
        let ids: Vec<LocationId> = self
            .inner
            .registry
            .lock()
            .list()
            .into_iter()
            .map(|l| l.id)
            .collect();

        for id in ids {
            let Some(adapter) = self.inner.adapters.get(&id) else {
                continue;
            };
            match adapter.quota().await {
                Ok(Some(quota)) => {
                    let _ = self
                        .inner
                        .registry
                        .lock()
                        .record_quota(&id, quota.used, quota.limit);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Quota probe for location {} failed: {}", id, e),
            }
        }
    }

    /// Apply a new admin configuration. Rejected wholesale on validation
    /// failure; on success the admin-owned secondary locations are
    /// reconciled to the configured accounts and the config is persisted.
    pub fn configure_admin_backup(&self, config: AdminBackupConfig) -> Result<()> {
        validate_admin_config(&config)?;

        {
            let mut registry = self.inner.registry.lock();

            let desired: HashMap<LocationId, &DriveAccount> = config
                .primary_account
                .iter()
                .chain(config.secondary_accounts.iter())
                .map(|a| (drive_location_id(&a.email), a))
                .collect();

            let stale: Vec<LocationId> = registry
                .list()
                .into_iter()
                .filter(|l| {
                    l.kind == LocationKind::CloudDrive
                        && l.owner_profile.is_none()
                        && !desired.contains_key(&l.id)
                })
                .map(|l| l.id)
                .collect();
            for id in stale {
                registry.remove(&id)?;
                self.inner.adapters.unregister(&id);
            }

            for (id, account) in desired {
                let location = match registry.get(&id) {
                    // Keep accumulated stats and live status on re-configure
                    Some(existing) => BackupLocation {
                        account_identifier: Some(account.email.clone()),
                        remote_folder_ref: account.remote_folder_ref.clone(),
                        ..existing.clone()
                    },
                    None => BackupLocation::cloud_drive(id.clone(), account),
                };
                registry.upsert(location);
            }
        }

        {
            let mut current = self.inner.admin_config.lock();
            *current = config.clone();
        }

        match serde_json::to_value(&config) {
            Ok(value) => {
                if let Err(e) = self.inner.config_store.set(ADMIN_CONFIG_KEY, value) {
                    tracing::warn!("Failed to persist admin config: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize admin config: {}", e),
        }

        self.inner.events.emit(BackupEvent::config_updated());
        Ok(())
    }

    /// Current admin configuration
    pub fn admin_config(&self) -> AdminBackupConfig {
        self.inner.admin_config.lock().clone()
    }

    /// Add a personal backup location for one profile
    pub fn add_profile_backup(
        &self,
        profile_id: &str,
        account: DriveAccount,
    ) -> Result<BackupLocation> {
        validate_account(&account)?;

        let id = format!("profile:{}:{}", profile_id, drive_location_id(&account.email));
        let mut location = BackupLocation::cloud_drive(id, &account);
        location.owner_profile = Some(profile_id.to_string());

        self.inner.registry.lock().upsert(location.clone());
        Ok(location)
    }

    /// Set the profile the periodic scheduler snapshots
    pub fn set_active_profile(&self, profile: ProfileData) {
        *self.inner.active_profile.lock() = Some(profile);
    }

    /// Intake a document and queue its replication
    pub fn backup_document(
        &self,
        upload: DocumentUpload,
        priority: TaskPriority,
    ) -> Result<DocumentRecord> {
        let record = {
            let mut store = self.inner.store.lock();
            let record = store.upsert(upload);
            store.mark_pending(&record.id)?;
            store
                .get(&record.id)
                .cloned()
                .ok_or_else(|| CustodianError::Internal("record vanished on intake".to_string()))?
        };

        self.inner
            .queue
            .push(BackupTask::document(record.id.clone(), priority));
        Ok(record)
    }

    /// Queue a profile snapshot
    pub fn backup_profile_data(&self, profile: &ProfileData) -> Result<()> {
        let bytes = serde_json::to_vec(profile)?;
        self.inner.queue.push(BackupTask::profile_snapshot(
            format!("profile-{}.json", profile.id),
            bytes,
            TaskPriority::Normal,
        ));
        Ok(())
    }

    /// Queue a configuration snapshot, ahead of any document backlog
    pub fn backup_application_config(&self) -> Result<()> {
        let snapshot = {
            let config = self.inner.admin_config.lock();
            let registry = self.inner.registry.lock();
            serde_json::json!({
                "admin_config": &*config,
                "locations": registry.list(),
            })
        };
        let bytes = serde_json::to_vec(&snapshot)?;
        self.inner
            .queue
            .push(BackupTask::configuration_snapshot("config.json".to_string(), bytes));
        Ok(())
    }

    /// Delete a document. Remote deletes are best-effort: failures are
    /// logged as warnings and local removal proceeds regardless.
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        let remote_refs = {
            let store = self.inner.store.lock();
            store
                .get(id)
                .ok_or_else(|| CustodianError::NotFound(id.to_string()))?
                .remote_refs
                .clone()
        };

        for (location_id, remote) in remote_refs {
            match self.inner.adapters.get(&location_id) {
                Some(adapter) => {
                    if let Err(e) = adapter.delete(&remote.remote_id).await {
                        tracing::warn!(
                            "Remote delete of {} at location {} failed: {}",
                            id,
                            location_id,
                            e
                        );
                    }
                }
                None => tracing::warn!(
                    "No adapter for location {}, leaving remote copy of {}",
                    location_id,
                    id
                ),
            }
        }

        self.inner.store.lock().delete(id)?;
        Ok(())
    }

    pub fn document(&self, id: &str) -> Option<DocumentRecord> {
        self.inner.store.lock().get(id).cloned()
    }

    pub fn documents(&self) -> Vec<DocumentRecord> {
        self.inner.store.lock().list()
    }

    pub fn documents_by_category(&self, category: &str) -> Vec<DocumentRecord> {
        self.inner.store.lock().list_by_category(category)
    }

    /// Subscribe to all backup events
    pub fn subscribe(&self) -> broadcast::Receiver<BackupEvent> {
        self.inner.events.subscribe()
    }

    /// Subscribe with a filter
    pub fn subscribe_filtered(&self, filter: SubscriptionFilter) -> EventStream {
        self.inner.events.subscribe_filtered(filter)
    }

    /// Feed the connectivity signal (e.g. from OS network-state events)
    pub fn set_online(&self, online: bool) {
        let _ = self.online_tx.send(online);
    }

    pub fn is_online(&self) -> bool {
        *self.online_tx.borrow()
    }

    /// Immediately enqueue one scheduled backup cycle
    pub fn trigger_backup_cycle(&self) {
        PeriodicScheduler::fire(&SchedulerContext {
            queue: self.inner.queue.clone(),
            registry: self.inner.registry.clone(),
            admin_config: self.inner.admin_config.clone(),
            active_profile: self.inner.active_profile.clone(),
        });
    }

    /// Wait until every queued task has been fully processed
    pub async fn flush(&self) {
        self.inner.queue.wait_drained().await;
    }

    /// Stop the worker, scheduler, and monitor
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            let _ = handle.await;
        }
    }
}
