//! Document store (local cache)
//!
//! Map of document records keyed by document id, plus the content bytes
//! needed to (re)upload. The store is the sole writer of `sync_status`
//! transitions; the replication worker drives them through the methods
//! below. One event per logical mutation.

use std::collections::HashMap;

use chrono::Utc;

use crate::error::{CustodianError, Result};
use crate::events::{BackupEvent, EventBroadcaster};
use crate::types::{DocumentId, DocumentRecord, LocationId, RemoteRef, SyncStatus};

/// Intake payload for a new document or a content update
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    /// Caller-assigned id; a fresh uuid is used when absent
    pub id: Option<DocumentId>,
    pub name: String,
    pub mime_type: String,
    pub category: String,
    pub section_ref: Option<String>,
    pub profile_ref: Option<String>,
    pub content: Vec<u8>,
}

pub struct DocumentStore {
    records: HashMap<DocumentId, DocumentRecord>,
    content: HashMap<DocumentId, Vec<u8>>,
    events: EventBroadcaster,
}

impl DocumentStore {
    pub fn new(events: EventBroadcaster) -> Self {
        Self {
            records: HashMap::new(),
            content: HashMap::new(),
            events,
        }
    }

    pub fn get(&self, id: &str) -> Option<&DocumentRecord> {
        self.records.get(id)
    }

    pub fn content(&self, id: &str) -> Option<&[u8]> {
        self.content.get(id).map(|c| c.as_slice())
    }

    pub fn list(&self) -> Vec<DocumentRecord> {
        self.records.values().cloned().collect()
    }

    pub fn list_by_category(&self, category: &str) -> Vec<DocumentRecord> {
        self.records
            .values()
            .filter(|r| r.category == category)
            .cloned()
            .collect()
    }

    /// Documents stuck in a pending/failed state, for the reconciliation pass
    pub fn list_unsynced(&self) -> Vec<DocumentId> {
        self.records
            .values()
            .filter(|r| {
                matches!(
                    r.sync_status,
                    SyncStatus::SyncPending | SyncStatus::SyncFailed
                )
            })
            .map(|r| r.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Intake a document. A content change on an existing record bumps
    /// `version`, clears `remote_refs` (the new version exists nowhere
    /// remotely) and resets the sync state.
    pub fn upsert(&mut self, upload: DocumentUpload) -> DocumentRecord {
        let id = upload
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let record = match self.records.get_mut(&id) {
            Some(existing) => {
                let content_changed =
                    self.content.get(&id).map(|c| c.as_slice()) != Some(upload.content.as_slice());

                existing.name = upload.name;
                existing.mime_type = upload.mime_type;
                existing.category = upload.category;
                existing.section_ref = upload.section_ref;
                existing.profile_ref = upload.profile_ref;

                if content_changed {
                    existing.version += 1;
                    existing.size_bytes = upload.content.len() as u64;
                    existing.remote_refs.clear();
                    existing.sync_status = SyncStatus::LocalOnly;
                    existing.sync_error = None;
                    self.content.insert(id.clone(), upload.content);
                }

                let record = existing.clone();
                self.events
                    .emit(BackupEvent::document_updated(&id, record.version));
                record
            }
            None => {
                let record = DocumentRecord {
                    id: id.clone(),
                    name: upload.name,
                    size_bytes: upload.content.len() as u64,
                    mime_type: upload.mime_type,
                    category: upload.category,
                    section_ref: upload.section_ref,
                    profile_ref: upload.profile_ref,
                    version: 1,
                    sync_status: SyncStatus::LocalOnly,
                    remote_refs: HashMap::new(),
                    last_sync_time: None,
                    sync_error: None,
                };
                self.records.insert(id.clone(), record.clone());
                self.content.insert(id.clone(), upload.content);
                self.events.emit(BackupEvent::document_created(&id));
                record
            }
        };

        record
    }

    /// Remove a record and its cached content. Remote deletes are the
    /// caller's responsibility (best-effort, before calling this).
    pub fn delete(&mut self, id: &str) -> Result<DocumentRecord> {
        let record = self
            .records
            .remove(id)
            .ok_or_else(|| CustodianError::NotFound(id.to_string()))?;
        self.content.remove(id);
        self.events.emit(BackupEvent::document_deleted(id));
        Ok(record)
    }

    /// Mark a document queued for replication
    pub fn mark_pending(&mut self, id: &str) -> Result<()> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| CustodianError::NotFound(id.to_string()))?;
        record.sync_status = SyncStatus::SyncPending;
        Ok(())
    }

    /// Record a successful upload to one destination
    pub fn record_remote(&mut self, id: &str, location_id: &str, remote: RemoteRef) -> Result<()> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| CustodianError::NotFound(id.to_string()))?;
        record
            .remote_refs
            .insert(location_id.to_string(), remote);
        Ok(())
    }

    /// Finalize a fan-out: set the aggregate status computed from the
    /// destinations reached, stamp the sync time, emit one event.
    pub fn finish_sync(
        &mut self,
        id: &str,
        required_secondaries: &[LocationId],
        error: Option<String>,
    ) -> Result<SyncStatus> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| CustodianError::NotFound(id.to_string()))?;

        let status =
            crate::types::compute_sync_status(&record.remote_refs, required_secondaries, error.as_deref());
        record.sync_status = status;
        record.sync_error = if status == SyncStatus::SyncFailed {
            error
        } else {
            None
        };
        record.last_sync_time = Some(Utc::now());

        match (&record.sync_error, status) {
            (Some(cause), _) => self.events.emit(BackupEvent::sync_failed(id, cause)),
            (None, status) => self.events.emit(BackupEvent::sync_completed(id, status)),
        }

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PRIMARY_LOCATION_ID;

    fn store() -> DocumentStore {
        DocumentStore::new(EventBroadcaster::new())
    }

    fn upload(id: &str, content: &[u8]) -> DocumentUpload {
        DocumentUpload {
            id: Some(id.to_string()),
            name: format!("{}.pdf", id),
            mime_type: "application/pdf".to_string(),
            category: "governance".to_string(),
            section_ref: None,
            profile_ref: None,
            content: content.to_vec(),
        }
    }

    fn remote(n: &str) -> RemoteRef {
        RemoteRef {
            remote_id: n.to_string(),
            remote_url: None,
        }
    }

    #[test]
    fn new_document_starts_local_only_at_version_one() {
        let mut store = store();
        let record = store.upsert(upload("d1", b"hello"));
        assert_eq!(record.version, 1);
        assert_eq!(record.sync_status, SyncStatus::LocalOnly);
        assert_eq!(record.size_bytes, 5);
    }

    #[test]
    fn content_change_bumps_version_and_clears_refs() {
        let mut store = store();
        store.upsert(upload("d1", b"v1"));
        store
            .record_remote("d1", PRIMARY_LOCATION_ID, remote("r1"))
            .unwrap();
        store.finish_sync("d1", &[], None).unwrap();
        assert_eq!(store.get("d1").unwrap().sync_status, SyncStatus::FullySynced);

        let record = store.upsert(upload("d1", b"v2"));
        assert_eq!(record.version, 2);
        assert!(record.remote_refs.is_empty());
        assert_eq!(record.sync_status, SyncStatus::LocalOnly);
    }

    #[test]
    fn metadata_only_change_keeps_version_and_refs() {
        let mut store = store();
        store.upsert(upload("d1", b"same"));
        store
            .record_remote("d1", PRIMARY_LOCATION_ID, remote("r1"))
            .unwrap();

        let mut renamed = upload("d1", b"same");
        renamed.name = "renamed.pdf".to_string();
        let record = store.upsert(renamed);

        assert_eq!(record.version, 1);
        assert_eq!(record.name, "renamed.pdf");
        assert!(record.remote_refs.contains_key(PRIMARY_LOCATION_ID));
    }

    #[test]
    fn finish_sync_with_error_sets_failed_and_cause() {
        let mut store = store();
        store.upsert(upload("d1", b"x"));
        let status = store
            .finish_sync("d1", &[], Some("network unreachable".to_string()))
            .unwrap();
        assert_eq!(status, SyncStatus::SyncFailed);
        assert_eq!(
            store.get("d1").unwrap().sync_error.as_deref(),
            Some("network unreachable")
        );
    }

    #[test]
    fn list_unsynced_finds_pending_and_failed() {
        let mut store = store();
        store.upsert(upload("a", b"1"));
        store.upsert(upload("b", b"2"));
        store.upsert(upload("c", b"3"));
        store.mark_pending("a").unwrap();
        store
            .finish_sync("b", &["drive:x".to_string()], Some("down".to_string()))
            .unwrap();

        let mut unsynced = store.list_unsynced();
        unsynced.sort();
        assert_eq!(unsynced, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn delete_removes_record_and_content() {
        let mut store = store();
        store.upsert(upload("d1", b"x"));
        store.delete("d1").unwrap();
        assert!(store.get("d1").is_none());
        assert!(store.content("d1").is_none());
        assert!(store.delete("d1").is_err());
    }
}
