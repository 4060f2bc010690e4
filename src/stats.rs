//! Status/stats aggregation
//!
//! Pure function over the current registry and queue. Recomputed on
//! demand, never cached, so it is always consistent with the latest
//! mutation.

use crate::types::{BackupLocation, BackupStats, LocationStatus};

pub fn compute_stats(locations: &[BackupLocation], queue_depth: usize) -> BackupStats {
    let active: Vec<&BackupLocation> = locations
        .iter()
        .filter(|l| l.status == LocationStatus::Active)
        .collect();

    BackupStats {
        total_locations: locations.len(),
        active_locations: active.len(),
        last_backup_time: locations.iter().filter_map(|l| l.last_backup_time).max(),
        total_bytes: active.iter().filter_map(|l| l.space_used).sum(),
        queue_depth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DriveAccount, LocationStatus};
    use chrono::{Duration, Utc};

    fn drive(email: &str) -> BackupLocation {
        BackupLocation::cloud_drive(
            format!("drive:{}", email),
            &DriveAccount {
                email: email.to_string(),
                is_workspace_account: false,
                remote_folder_ref: None,
            },
        )
    }

    #[test]
    fn empty_registry_yields_zeroes() {
        let stats = compute_stats(&[], 0);
        assert_eq!(stats.total_locations, 0);
        assert_eq!(stats.active_locations, 0);
        assert_eq!(stats.last_backup_time, None);
        assert_eq!(stats.total_bytes, 0);
    }

    #[test]
    fn bytes_only_counted_for_active_locations() {
        let now = Utc::now();
        let mut primary = BackupLocation::primary();
        primary.space_used = Some(1000);
        primary.last_backup_time = Some(now - Duration::hours(1));

        let mut errored = drive("a@org.test");
        errored.status = LocationStatus::Error;
        errored.space_used = Some(500);
        errored.last_backup_time = Some(now);

        let stats = compute_stats(&[primary, errored], 3);
        assert_eq!(stats.total_locations, 2);
        assert_eq!(stats.active_locations, 1);
        assert_eq!(stats.total_bytes, 1000);
        // Staleness is visible through the max over all locations
        assert_eq!(stats.last_backup_time, Some(now));
        assert_eq!(stats.queue_depth, 3);
    }
}
