//! Backup location registry
//!
//! Holds the set of known storage destinations and their live status. Every
//! mutation persists the full location set through the config store; a
//! persistence failure is logged and does not block the in-memory update,
//! so in-process state stays authoritative for the current lifetime.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::{ConfigStore, LOCATIONS_KEY};
use crate::error::{CustodianError, Result};
use crate::events::{BackupEvent, EventBroadcaster};
use crate::types::{BackupLocation, LocationId, LocationStatus, PRIMARY_LOCATION_ID};

pub struct LocationRegistry {
    // BTreeMap keeps list() output stable for operators and tests
    locations: BTreeMap<LocationId, BackupLocation>,
    config_store: Arc<dyn ConfigStore>,
    events: EventBroadcaster,
}

impl LocationRegistry {
    /// Load the registry from the config store, creating the primary
    /// object-store location if it is absent.
    pub fn load(config_store: Arc<dyn ConfigStore>, events: EventBroadcaster) -> Result<Self> {
        let mut locations = BTreeMap::new();

        if let Some(value) = config_store.get(LOCATIONS_KEY)? {
            let stored: Vec<BackupLocation> = serde_json::from_value(value)?;
            for location in stored {
                locations.insert(location.id.clone(), location);
            }
        }

        let mut registry = Self {
            locations,
            config_store,
            events,
        };

        if !registry.locations.contains_key(PRIMARY_LOCATION_ID) {
            registry
                .locations
                .insert(PRIMARY_LOCATION_ID.to_string(), BackupLocation::primary());
            registry.persist();
        }

        Ok(registry)
    }

    pub fn list(&self) -> Vec<BackupLocation> {
        self.locations.values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<&BackupLocation> {
        self.locations.get(id)
    }

    /// Secondary locations eligible for replication, filtered by predicate.
    /// `inactive` means operator-disabled and is excluded; `error` locations
    /// stay eligible so reconnect retries can reach them again.
    pub fn secondary_targets<F>(&self, mut keep: F) -> Vec<LocationId>
    where
        F: FnMut(&BackupLocation) -> bool,
    {
        self.locations
            .values()
            .filter(|l| !l.is_primary() && l.status != LocationStatus::Inactive && keep(l))
            .map(|l| l.id.clone())
            .collect()
    }

    /// Insert or replace a location
    pub fn upsert(&mut self, location: BackupLocation) {
        self.locations.insert(location.id.clone(), location);
        self.persist();
    }

    /// Remove a secondary location. The primary is never removable.
    pub fn remove(&mut self, id: &str) -> Result<()> {
        if id == PRIMARY_LOCATION_ID {
            return Err(CustodianError::InvalidInput(
                "the primary object-store location cannot be removed".to_string(),
            ));
        }
        if self.locations.remove(id).is_none() {
            return Err(CustodianError::LocationNotFound(id.to_string()));
        }
        self.persist();
        Ok(())
    }

    pub fn set_status(&mut self, id: &str, status: LocationStatus) -> Result<()> {
        let location = self
            .locations
            .get_mut(id)
            .ok_or_else(|| CustodianError::LocationNotFound(id.to_string()))?;

        if location.status != status {
            location.status = status;
            self.events
                .emit(BackupEvent::location_status_changed(id, &status.to_string()));
            self.persist();
        }
        Ok(())
    }

    /// Record a successful backup landing at a location
    pub fn record_backup(&mut self, id: &str, timestamp: DateTime<Utc>, bytes: u64) -> Result<()> {
        let location = self
            .locations
            .get_mut(id)
            .ok_or_else(|| CustodianError::LocationNotFound(id.to_string()))?;

        location.last_backup_time = Some(timestamp);
        location.space_used = Some(location.space_used.unwrap_or(0) + bytes);
        self.persist();
        Ok(())
    }

    /// Update reported quota numbers for a location
    pub fn record_quota(&mut self, id: &str, used: u64, limit: Option<u64>) -> Result<()> {
        let location = self
            .locations
            .get_mut(id)
            .ok_or_else(|| CustodianError::LocationNotFound(id.to_string()))?;

        location.space_used = Some(used);
        location.space_limit = limit;
        self.persist();
        Ok(())
    }

    fn persist(&self) {
        let snapshot: Vec<&BackupLocation> = self.locations.values().collect();
        let value = match serde_json::to_value(&snapshot) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Failed to serialize location registry: {}", e);
                return;
            }
        };
        if let Err(e) = self.config_store.set(LOCATIONS_KEY, value) {
            tracing::warn!("Failed to persist location registry: {}", e);
        }
    }
}
