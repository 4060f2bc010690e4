//! Connectivity monitor
//!
//! Watches the online/offline signal and, on every transition back to
//! online, re-enqueues one document task per record stuck in a pending or
//! failed state (the reconciliation pass). This is the system's only
//! automatic-retry path: level-triggered, not count-bounded.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::events::{BackupEvent, EventBroadcaster};
use crate::replication::ReplicationQueue;
use crate::store::DocumentStore;
use crate::types::{BackupTask, TaskPriority};

pub struct ConnectivityMonitor;

impl ConnectivityMonitor {
    pub fn spawn(
        mut online: watch::Receiver<bool>,
        store: Arc<Mutex<DocumentStore>>,
        queue: Arc<ReplicationQueue>,
        events: EventBroadcaster,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut was_online = *online.borrow();

            loop {
                tokio::select! {
                    changed = online.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                let is_online = *online.borrow();
                if is_online && !was_online {
                    let requeued = Self::reconcile(&store, &queue);
                    events.emit(BackupEvent::connectivity_changed(true, requeued));
                    tracing::info!(
                        "Connectivity restored, re-enqueued {} unsynced documents",
                        requeued
                    );
                } else if !is_online && was_online {
                    events.emit(BackupEvent::connectivity_changed(false, 0));
                    tracing::info!("Connectivity lost, replication paused");
                }
                was_online = is_online;
            }

            tracing::info!("Connectivity monitor stopped");
        })
    }

    /// Re-enqueue every pending/failed document at normal priority
    fn reconcile(store: &Arc<Mutex<DocumentStore>>, queue: &Arc<ReplicationQueue>) -> usize {
        let unsynced = {
            let mut store = store.lock();
            let ids = store.list_unsynced();
            for id in &ids {
                let _ = store.mark_pending(id);
            }
            ids
        };

        for id in &unsynced {
            queue.push(BackupTask::document(id.clone(), TaskPriority::Normal));
        }
        unsynced.len()
    }
}
