//! Property-based tests for custodian
//!
//! Invariants that must hold for all inputs:
//! - Aggregate sync status is exactly determined by the destinations reached
//! - Queue ordering: FIFO within a class, high priority drains first
//! - Config validation never accepts a zero interval or malformed account
//!
//! Run with: cargo test --test property_tests

use proptest::prelude::*;

// ============================================================================
// SYNC STATUS COMPUTATION
// ============================================================================

mod sync_status_props {
    use super::*;
    use std::collections::HashMap;

    use custodian::types::{
        compute_sync_status, LocationId, RemoteRef, SyncStatus, PRIMARY_LOCATION_ID,
    };

    fn remote(n: usize) -> RemoteRef {
        RemoteRef {
            remote_id: format!("r{}", n),
            remote_url: None,
        }
    }

    proptest! {
        /// fully_synced holds exactly when the primary and every required
        /// secondary appear in remote_refs
        #[test]
        fn fully_synced_iff_all_destinations_reached(
            n_secondaries in 0usize..4,
            reached_mask in 0u8..16,
            has_primary in any::<bool>(),
            error in proptest::option::of("[a-z ]{1,20}"),
        ) {
            let required: Vec<LocationId> =
                (0..n_secondaries).map(|i| format!("drive:{}", i)).collect();

            let mut refs: HashMap<LocationId, RemoteRef> = HashMap::new();
            if has_primary {
                refs.insert(PRIMARY_LOCATION_ID.to_string(), remote(99));
            }
            for (i, id) in required.iter().enumerate() {
                if reached_mask & (1 << i) != 0 {
                    refs.insert(id.clone(), remote(i));
                }
            }

            let status = compute_sync_status(&refs, &required, error.as_deref());
            let all_reached =
                has_primary && required.iter().all(|id| refs.contains_key(id));

            prop_assert_eq!(status == SyncStatus::FullySynced, all_reached);
            if !all_reached {
                match (&error, has_primary) {
                    (Some(_), _) => prop_assert_eq!(status, SyncStatus::SyncFailed),
                    (None, true) => prop_assert_eq!(status, SyncStatus::PrimaryOnly),
                    (None, false) => prop_assert_eq!(status, SyncStatus::LocalOnly),
                }
            }
        }

        /// Adding a remote ref never moves the status away from fully_synced
        #[test]
        fn extra_refs_never_hurt(n_secondaries in 0usize..4) {
            let required: Vec<LocationId> =
                (0..n_secondaries).map(|i| format!("drive:{}", i)).collect();

            let mut refs: HashMap<LocationId, RemoteRef> = HashMap::new();
            refs.insert(PRIMARY_LOCATION_ID.to_string(), remote(99));
            for (i, id) in required.iter().enumerate() {
                refs.insert(id.clone(), remote(i));
            }
            refs.insert("drive:extra".to_string(), remote(100));

            prop_assert_eq!(
                compute_sync_status(&refs, &required, None),
                SyncStatus::FullySynced
            );
        }
    }
}

// ============================================================================
// QUEUE ORDERING
// ============================================================================

mod queue_props {
    use super::*;

    use custodian::replication::ReplicationQueue;
    use custodian::types::{BackupTask, TaskPriority};

    fn priority_strategy() -> impl Strategy<Value = TaskPriority> {
        prop_oneof![Just(TaskPriority::High), Just(TaskPriority::Normal)]
    }

    proptest! {
        /// Drain order: high-priority tasks first (most recent high at the
        /// very front), then normal tasks in FIFO order
        #[test]
        fn drain_order_matches_priority_model(
            priorities in proptest::collection::vec(priority_strategy(), 0..12),
        ) {
            let queue = ReplicationQueue::new();
            for (i, priority) in priorities.iter().enumerate() {
                queue.push(BackupTask::document(format!("d{}", i), *priority));
            }

            // Reference model: push_front for high, push_back for normal
            let mut highs: Vec<String> = Vec::new();
            let mut normals: Vec<String> = Vec::new();
            for (i, priority) in priorities.iter().enumerate() {
                match priority {
                    TaskPriority::High => highs.insert(0, format!("d{}", i)),
                    TaskPriority::Normal => normals.push(format!("d{}", i)),
                }
            }
            let expected: Vec<String> = highs.into_iter().chain(normals).collect();

            let mut drained = Vec::new();
            while let Some(task) = queue.pop() {
                drained.push(task.payload_ref().to_string());
                queue.task_done();
            }

            prop_assert_eq!(drained, expected);
            prop_assert_eq!(queue.outstanding(), 0);
        }
    }
}

// ============================================================================
// CONFIG VALIDATION
// ============================================================================

mod config_props {
    use super::*;

    use custodian::config::validate_admin_config;
    use custodian::types::{AdminBackupConfig, DriveAccount};

    proptest! {
        /// A zero interval is always rejected, whatever else is set
        #[test]
        fn zero_interval_always_rejected(retention in 0u32..1000) {
            let config = AdminBackupConfig {
                auto_backup_interval_minutes: 0,
                retention_days: retention,
                ..Default::default()
            };
            prop_assert!(validate_admin_config(&config).is_err());
        }

        /// Well-formed accounts within the limit always validate
        #[test]
        fn well_formed_configs_accepted(
            interval in 1u32..10_000,
            retention in 1u32..1000,
            n_accounts in 0usize..=4,
        ) {
            let config = AdminBackupConfig {
                auto_backup_interval_minutes: interval,
                retention_days: retention,
                secondary_accounts: (0..n_accounts)
                    .map(|i| DriveAccount {
                        email: format!("backup{}@org.test", i),
                        is_workspace_account: i % 2 == 0,
                        remote_folder_ref: None,
                    })
                    .collect(),
                ..Default::default()
            };
            prop_assert!(validate_admin_config(&config).is_ok());
        }

        /// Emails without an '@' never validate
        #[test]
        fn malformed_emails_rejected(email in "[a-z0-9.]{0,20}") {
            let config = AdminBackupConfig {
                secondary_accounts: vec![DriveAccount {
                    email,
                    is_workspace_account: false,
                    remote_folder_ref: None,
                }],
                ..Default::default()
            };
            prop_assert!(validate_admin_config(&config).is_err());
        }
    }
}
