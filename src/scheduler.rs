//! Periodic backup scheduler
//!
//! Fires on `auto_backup_interval_minutes` while `enable_real_time_sync`
//! is on, enqueuing a profile snapshot for the active profile and a
//! high-priority configuration snapshot. Each firing is independent; no
//! in-flight dedup is attempted, so overlapping cycles are possible under
//! a very short interval.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::registry::LocationRegistry;
use crate::replication::ReplicationQueue;
use crate::types::{AdminBackupConfig, BackupTask, ProfileData, TaskPriority};

pub struct SchedulerContext {
    pub queue: Arc<ReplicationQueue>,
    pub registry: Arc<Mutex<LocationRegistry>>,
    pub admin_config: Arc<Mutex<AdminBackupConfig>>,
    pub active_profile: Arc<Mutex<Option<ProfileData>>>,
}

pub struct PeriodicScheduler;

impl PeriodicScheduler {
    pub fn spawn(ctx: SchedulerContext, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                // Re-read the interval every cycle so configuration
                // changes take effect without a restart.
                let (enabled, interval_minutes) = {
                    let config = ctx.admin_config.lock();
                    (
                        config.enable_real_time_sync,
                        config.auto_backup_interval_minutes.max(1),
                    )
                };
                let sleep = Duration::from_secs(u64::from(interval_minutes) * 60);

                tokio::select! {
                    _ = tokio::time::sleep(sleep) => {}
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                if !enabled {
                    continue;
                }
                Self::fire(&ctx);
            }

            tracing::info!("Periodic scheduler stopped");
        })
    }

    /// Enqueue one backup cycle's snapshots
    pub fn fire(ctx: &SchedulerContext) {
        let toggles = ctx.admin_config.lock().backup_types;

        if toggles.profile {
            let profile = ctx.active_profile.lock().clone();
            if let Some(profile) = profile.filter(|p| p.backup_enabled) {
                match serde_json::to_vec(&profile) {
                    Ok(bytes) => {
                        ctx.queue.push(BackupTask::profile_snapshot(
                            format!("profile-{}.json", profile.id),
                            bytes,
                            TaskPriority::Normal,
                        ));
                    }
                    Err(e) => tracing::warn!("Failed to serialize profile snapshot: {}", e),
                }
            }
        }

        if toggles.configuration {
            let snapshot = {
                let config = ctx.admin_config.lock();
                let registry = ctx.registry.lock();
                serde_json::json!({
                    "admin_config": &*config,
                    "locations": registry.list(),
                })
            };
            match serde_json::to_vec(&snapshot) {
                Ok(bytes) => {
                    ctx.queue
                        .push(BackupTask::configuration_snapshot("config.json".to_string(), bytes));
                }
                Err(e) => tracing::warn!("Failed to serialize configuration snapshot: {}", e),
            }
        }

        tracing::debug!("Scheduled backup cycle enqueued");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigStore;
    use crate::events::EventBroadcaster;
    use crate::types::TaskKind;

    fn context() -> SchedulerContext {
        let registry = LocationRegistry::load(
            Arc::new(MemoryConfigStore::new()),
            EventBroadcaster::new(),
        )
        .unwrap();
        SchedulerContext {
            queue: Arc::new(ReplicationQueue::new()),
            registry: Arc::new(Mutex::new(registry)),
            admin_config: Arc::new(Mutex::new(AdminBackupConfig::default())),
            active_profile: Arc::new(Mutex::new(Some(ProfileData {
                id: "org-1".to_string(),
                backup_enabled: true,
                data: serde_json::json!({"name": "Good Works"}),
            }))),
        }
    }

    #[test]
    fn fire_enqueues_config_before_profile() {
        let ctx = context();
        PeriodicScheduler::fire(&ctx);

        // Configuration snapshot is high priority, so it drains first.
        let first = ctx.queue.pop().unwrap();
        assert_eq!(first.kind, TaskKind::ConfigurationSnapshot);
        let second = ctx.queue.pop().unwrap();
        assert_eq!(second.kind, TaskKind::ProfileSnapshot);
        assert!(ctx.queue.pop().is_none());
    }

    #[test]
    fn fire_skips_profile_with_backup_disabled() {
        let ctx = context();
        ctx.active_profile.lock().as_mut().unwrap().backup_enabled = false;
        PeriodicScheduler::fire(&ctx);

        let first = ctx.queue.pop().unwrap();
        assert_eq!(first.kind, TaskKind::ConfigurationSnapshot);
        assert!(ctx.queue.pop().is_none());
    }

    #[test]
    fn fire_honors_backup_type_toggles() {
        let ctx = context();
        {
            let mut config = ctx.admin_config.lock();
            config.backup_types.profile = false;
            config.backup_types.configuration = false;
        }
        PeriodicScheduler::fire(&ctx);
        assert!(ctx.queue.pop().is_none());
    }
}
