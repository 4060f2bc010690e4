//! Core types for Custodian

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a backup location
pub type LocationId = String;

/// Unique identifier for a document
pub type DocumentId = String;

/// Stable id of the primary object-store location. Created at
/// initialization and never removable through the public API.
pub const PRIMARY_LOCATION_ID: &str = "primary-object-store";

/// Kind of backup destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationKind {
    PrimaryObjectStore,
    CloudDrive,
}

impl std::fmt::Display for LocationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocationKind::PrimaryObjectStore => write!(f, "primary-object-store"),
            LocationKind::CloudDrive => write!(f, "cloud-drive"),
        }
    }
}

/// Live status of a backup location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocationStatus {
    #[default]
    Active,
    Inactive,
    Error,
}

impl std::fmt::Display for LocationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocationStatus::Active => write!(f, "active"),
            LocationStatus::Inactive => write!(f, "inactive"),
            LocationStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LocationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(LocationStatus::Active),
            "inactive" => Ok(LocationStatus::Inactive),
            "error" => Ok(LocationStatus::Error),
            _ => Err(format!("Unknown location status: {}", s)),
        }
    }
}

/// A configured storage destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupLocation {
    /// Stable string key
    pub id: LocationId,
    /// Display name
    pub name: String,
    /// Destination kind
    pub kind: LocationKind,
    /// Live status, toggled by adapter call outcomes
    #[serde(default)]
    pub status: LocationStatus,
    /// When a backup last landed here
    pub last_backup_time: Option<DateTime<Utc>>,
    /// Bytes stored at this destination
    pub space_used: Option<u64>,
    /// Byte quota, if the provider reports one
    pub space_limit: Option<u64>,
    /// Account email for cloud-drive destinations
    pub account_identifier: Option<String>,
    /// Remote folder the destination writes into
    pub remote_folder_ref: Option<String>,
    /// Set when this is a profile's personal backup location
    pub owner_profile: Option<String>,
}

impl BackupLocation {
    /// The primary object-store location, as created at initialization
    pub fn primary() -> Self {
        Self {
            id: PRIMARY_LOCATION_ID.to_string(),
            name: "Primary object store".to_string(),
            kind: LocationKind::PrimaryObjectStore,
            status: LocationStatus::Active,
            last_backup_time: None,
            space_used: None,
            space_limit: None,
            account_identifier: None,
            remote_folder_ref: None,
            owner_profile: None,
        }
    }

    /// A secondary cloud-drive location for the given account
    pub fn cloud_drive(id: impl Into<String>, account: &DriveAccount) -> Self {
        Self {
            id: id.into(),
            name: format!("Drive ({})", account.email),
            kind: LocationKind::CloudDrive,
            status: LocationStatus::Active,
            last_backup_time: None,
            space_used: None,
            space_limit: None,
            account_identifier: Some(account.email.clone()),
            remote_folder_ref: account.remote_folder_ref.clone(),
            owner_profile: None,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.kind == LocationKind::PrimaryObjectStore
    }
}

/// Per-document synchronization state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Exists only in the local cache
    #[default]
    LocalOnly,
    /// Uploaded to the primary store, secondaries outstanding
    PrimaryOnly,
    /// Present at the primary and every applicable active secondary
    FullySynced,
    /// Queued for replication
    SyncPending,
    /// At least one destination attempt failed
    SyncFailed,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::LocalOnly => write!(f, "local_only"),
            SyncStatus::PrimaryOnly => write!(f, "primary_only"),
            SyncStatus::FullySynced => write!(f, "fully_synced"),
            SyncStatus::SyncPending => write!(f, "sync_pending"),
            SyncStatus::SyncFailed => write!(f, "sync_failed"),
        }
    }
}

/// Opaque reference to an uploaded copy at one destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRef {
    pub remote_id: String,
    pub remote_url: Option<String>,
}

/// A document tracked by the local cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Unique identifier
    pub id: DocumentId,
    /// File name
    pub name: String,
    /// Content length in bytes
    pub size_bytes: u64,
    /// MIME type
    pub mime_type: String,
    /// Document category
    pub category: String,
    /// Which part of the organization profile this belongs to
    pub section_ref: Option<String>,
    /// Owning profile, if any
    pub profile_ref: Option<String>,
    /// Monotonic version, bumped on every content update
    #[serde(default = "default_version")]
    pub version: i64,
    /// Aggregate synchronization state
    #[serde(default)]
    pub sync_status: SyncStatus,
    /// Location id -> remote reference, set once an upload succeeds
    #[serde(default)]
    pub remote_refs: HashMap<LocationId, RemoteRef>,
    /// Last time any destination attempt completed for this document
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Human-readable cause when sync_status is sync_failed
    pub sync_error: Option<String>,
}

fn default_version() -> i64 {
    1
}

/// Compute the aggregate sync status from the set of destinations reached.
///
/// `required_secondaries` is the set of currently-active secondary
/// locations applicable to the document; `fully_synced` holds exactly when
/// the primary and all of them appear in `remote_refs`.
pub fn compute_sync_status(
    remote_refs: &HashMap<LocationId, RemoteRef>,
    required_secondaries: &[LocationId],
    sync_error: Option<&str>,
) -> SyncStatus {
    let has_primary = remote_refs.contains_key(PRIMARY_LOCATION_ID);
    let all_secondaries = required_secondaries
        .iter()
        .all(|id| remote_refs.contains_key(id));

    if has_primary && all_secondaries {
        return SyncStatus::FullySynced;
    }
    if sync_error.is_some() {
        return SyncStatus::SyncFailed;
    }
    if has_primary {
        return SyncStatus::PrimaryOnly;
    }
    SyncStatus::LocalOnly
}

/// A cloud-drive account descriptor in the admin configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveAccount {
    pub email: String,
    #[serde(default)]
    pub is_workspace_account: bool,
    pub remote_folder_ref: Option<String>,
}

/// Which payload kinds are replicated to secondary destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupTypeToggles {
    pub documents: bool,
    pub profile: bool,
    pub configuration: bool,
    pub logs: bool,
}

impl Default for BackupTypeToggles {
    fn default() -> Self {
        Self {
            documents: true,
            profile: true,
            configuration: true,
            logs: false,
        }
    }
}

/// Admin-level backup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminBackupConfig {
    /// Primary cloud-drive account (optional; the object store needs none)
    pub primary_account: Option<DriveAccount>,
    /// Secondary cloud-drive accounts, at most [`MAX_SECONDARY_ACCOUNTS`]
    #[serde(default)]
    pub secondary_accounts: Vec<DriveAccount>,
    /// Scheduler firing interval
    pub auto_backup_interval_minutes: u32,
    /// Snapshot retention window
    pub retention_days: u32,
    /// Master switch for the periodic scheduler
    pub enable_real_time_sync: bool,
    #[serde(default)]
    pub backup_types: BackupTypeToggles,
}

impl Default for AdminBackupConfig {
    fn default() -> Self {
        Self {
            primary_account: None,
            secondary_accounts: Vec::new(),
            auto_backup_interval_minutes: 60,
            retention_days: 30,
            enable_real_time_sync: false,
            backup_types: BackupTypeToggles::default(),
        }
    }
}

/// Maximum number of secondary cloud-drive accounts
pub const MAX_SECONDARY_ACCOUNTS: usize = 4;

/// Organization profile data handed in for snapshot backups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileData {
    pub id: String,
    /// Whether periodic snapshots should include this profile
    #[serde(default = "default_true")]
    pub backup_enabled: bool,
    /// Opaque profile content
    pub data: serde_json::Value,
}

fn default_true() -> bool {
    true
}

/// Kind of work carried by a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    Document,
    ProfileSnapshot,
    ConfigurationSnapshot,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Document => write!(f, "document"),
            TaskKind::ProfileSnapshot => write!(f, "profile-snapshot"),
            TaskKind::ConfigurationSnapshot => write!(f, "configuration-snapshot"),
        }
    }
}

/// Queue priority class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    High,
    Normal,
}

/// What a task carries to the destinations
#[derive(Debug, Clone)]
pub enum TaskPayload {
    /// Reference into the document store
    Document { document_id: DocumentId },
    /// Serialized snapshot, uploaded as-is
    Snapshot { name: String, bytes: Vec<u8> },
}

/// An entry in the replication queue. Ephemeral: consumed once every
/// applicable destination attempt has completed; never persisted.
#[derive(Debug, Clone)]
pub struct BackupTask {
    pub id: Uuid,
    pub kind: TaskKind,
    pub priority: TaskPriority,
    pub payload: TaskPayload,
}

impl BackupTask {
    pub fn document(document_id: DocumentId, priority: TaskPriority) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: TaskKind::Document,
            priority,
            payload: TaskPayload::Document { document_id },
        }
    }

    pub fn profile_snapshot(name: String, bytes: Vec<u8>, priority: TaskPriority) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: TaskKind::ProfileSnapshot,
            priority,
            payload: TaskPayload::Snapshot { name, bytes },
        }
    }

    pub fn configuration_snapshot(name: String, bytes: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: TaskKind::ConfigurationSnapshot,
            priority: TaskPriority::High,
            payload: TaskPayload::Snapshot { name, bytes },
        }
    }

    /// Reference string identifying the payload
    pub fn payload_ref(&self) -> &str {
        match &self.payload {
            TaskPayload::Document { document_id } => document_id,
            TaskPayload::Snapshot { name, .. } => name,
        }
    }
}

/// Summary statistics for operator dashboards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupStats {
    pub total_locations: usize,
    pub active_locations: usize,
    /// Max over all locations' last_backup_time
    pub last_backup_time: Option<DateTime<Utc>>,
    /// Sum over active locations' space_used
    pub total_bytes: u64,
    pub queue_depth: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(ids: &[&str]) -> HashMap<LocationId, RemoteRef> {
        ids.iter()
            .map(|id| {
                (
                    id.to_string(),
                    RemoteRef {
                        remote_id: format!("r-{}", id),
                        remote_url: None,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn fully_synced_requires_primary_and_all_secondaries() {
        let secondaries = vec!["drive:a".to_string(), "drive:b".to_string()];

        let all = refs(&[PRIMARY_LOCATION_ID, "drive:a", "drive:b"]);
        assert_eq!(
            compute_sync_status(&all, &secondaries, None),
            SyncStatus::FullySynced
        );

        let partial = refs(&[PRIMARY_LOCATION_ID, "drive:a"]);
        assert_ne!(
            compute_sync_status(&partial, &secondaries, None),
            SyncStatus::FullySynced
        );
    }

    #[test]
    fn no_secondaries_means_primary_is_enough() {
        let only_primary = refs(&[PRIMARY_LOCATION_ID]);
        assert_eq!(
            compute_sync_status(&only_primary, &[], None),
            SyncStatus::FullySynced
        );
    }

    #[test]
    fn error_with_missing_destinations_is_sync_failed() {
        let partial = refs(&[PRIMARY_LOCATION_ID]);
        let secondaries = vec!["drive:a".to_string()];
        assert_eq!(
            compute_sync_status(&partial, &secondaries, Some("quota exceeded")),
            SyncStatus::SyncFailed
        );
    }

    #[test]
    fn primary_only_when_secondaries_outstanding_without_error() {
        let partial = refs(&[PRIMARY_LOCATION_ID]);
        let secondaries = vec!["drive:a".to_string()];
        assert_eq!(
            compute_sync_status(&partial, &secondaries, None),
            SyncStatus::PrimaryOnly
        );
    }

    #[test]
    fn nothing_uploaded_is_local_only() {
        assert_eq!(
            compute_sync_status(&HashMap::new(), &[], None),
            SyncStatus::LocalOnly
        );
    }

    #[test]
    fn location_status_round_trips_through_strings() {
        for status in [
            LocationStatus::Active,
            LocationStatus::Inactive,
            LocationStatus::Error,
        ] {
            let parsed: LocationStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }
}
