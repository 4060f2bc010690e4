//! Durable configuration storage
//!
//! The registry and admin config persist themselves through the
//! [`ConfigStore`] collaborator as opaque JSON. Two implementations ship
//! with the crate: a JSON-file store for real deployments and an in-memory
//! store for tests.

mod store;

pub use store::{ConfigStore, JsonFileConfigStore, MemoryConfigStore};

use crate::error::{CustodianError, Result};
use crate::types::{AdminBackupConfig, DriveAccount, MAX_SECONDARY_ACCOUNTS};

/// Config-store key holding the serialized location registry
pub const LOCATIONS_KEY: &str = "backup.locations";

/// Config-store key holding the serialized admin backup configuration
pub const ADMIN_CONFIG_KEY: &str = "backup.admin_config";

/// Validate an admin configuration before it is applied.
///
/// Rejects the whole config on any violation so no partial state lands.
pub fn validate_admin_config(config: &AdminBackupConfig) -> Result<()> {
    if config.auto_backup_interval_minutes == 0 {
        return Err(CustodianError::InvalidInput(
            "auto_backup_interval_minutes must be greater than zero".to_string(),
        ));
    }
    if config.retention_days == 0 {
        return Err(CustodianError::InvalidInput(
            "retention_days must be greater than zero".to_string(),
        ));
    }
    if config.secondary_accounts.len() > MAX_SECONDARY_ACCOUNTS {
        return Err(CustodianError::InvalidInput(format!(
            "at most {} secondary accounts are supported",
            MAX_SECONDARY_ACCOUNTS
        )));
    }
    if let Some(account) = &config.primary_account {
        validate_account(account)?;
    }
    for account in &config.secondary_accounts {
        validate_account(account)?;
    }
    Ok(())
}

/// Validate a cloud-drive account descriptor
pub fn validate_account(account: &DriveAccount) -> Result<()> {
    let email = account.email.trim();
    if email.is_empty() {
        return Err(CustodianError::Config(
            "cloud-drive account is missing an email".to_string(),
        ));
    }
    if !email.contains('@') {
        return Err(CustodianError::Config(format!(
            "'{}' is not a valid account email",
            email
        )));
    }
    Ok(())
}

/// Stable location id for a secondary cloud-drive account
pub fn drive_location_id(email: &str) -> String {
    format!("drive:{}", email.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(email: &str) -> DriveAccount {
        DriveAccount {
            email: email.to_string(),
            is_workspace_account: false,
            remote_folder_ref: None,
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_admin_config(&AdminBackupConfig::default()).is_ok());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = AdminBackupConfig {
            auto_backup_interval_minutes: 0,
            ..Default::default()
        };
        assert!(matches!(
            validate_admin_config(&config),
            Err(CustodianError::InvalidInput(_))
        ));
    }

    #[test]
    fn too_many_secondaries_are_rejected() {
        let config = AdminBackupConfig {
            secondary_accounts: (0..5).map(|i| account(&format!("a{}@org.test", i))).collect(),
            ..Default::default()
        };
        assert!(validate_admin_config(&config).is_err());
    }

    #[test]
    fn missing_email_is_a_config_error() {
        let config = AdminBackupConfig {
            secondary_accounts: vec![account("  ")],
            ..Default::default()
        };
        assert!(matches!(
            validate_admin_config(&config),
            Err(CustodianError::Config(_))
        ));
    }

    #[test]
    fn drive_location_ids_are_case_insensitive() {
        assert_eq!(
            drive_location_id("Ops@Org.Test"),
            drive_location_id("ops@org.test")
        );
    }
}
