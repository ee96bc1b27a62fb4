//! Scout Registry
//!
//! Tracks known scouts, their reputation and liveness. Scouts are created
//! on first registration and never destroyed, only deactivated. The map is
//! read-mostly; writes serialize behind the exclusive lock.

pub mod scoring;

use crate::types::{Scout, ScoutId, TimestampMs, Value};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown scout {0}")]
    UnknownScout(ScoutId),
}

/// Registry of all scouts the operator has ever seen
pub struct ScoutRegistry {
    scouts: RwLock<HashMap<ScoutId, Scout>>,
}

impl ScoutRegistry {
    pub fn new() -> Self {
        Self { scouts: RwLock::new(HashMap::new()) }
    }

    /// Register a scout. Returns true for a first registration.
    ///
    /// Re-registration refreshes `last_seen`; an inactive identity may also
    /// rotate its public key, an active one keeps the key it registered with.
    pub fn register(&self, scout: Scout) -> bool {
        let mut scouts = self.scouts.write().expect("scout registry poisoned");

        match scouts.get_mut(&scout.scout_id) {
            Some(existing) => {
                existing.last_seen = scout.last_seen;
                if !existing.active {
                    existing.public_key = scout.public_key;
                    existing.active = true;
                    info!("🔁 Reactivated scout {}", existing.scout_id);
                }
                false
            }
            None => {
                info!("🆕 Registered scout {}", scout.scout_id);
                scouts.insert(scout.scout_id.clone(), scout);
                true
            }
        }
    }

    pub fn get(&self, scout_id: &ScoutId) -> Option<Scout> {
        self.scouts
            .read()
            .expect("scout registry poisoned")
            .get(scout_id)
            .cloned()
    }

    pub fn contains(&self, scout_id: &ScoutId) -> bool {
        self.scouts
            .read()
            .expect("scout registry poisoned")
            .contains_key(scout_id)
    }

    /// Apply a reputation delta, clamped to [0, 1]. Returns the new value.
    pub fn update_reputation(&self, scout_id: &ScoutId, delta: f64) -> Result<f64, RegistryError> {
        let mut scouts = self.scouts.write().expect("scout registry poisoned");
        let scout = scouts
            .get_mut(scout_id)
            .ok_or_else(|| RegistryError::UnknownScout(scout_id.clone()))?;

        let updated = scout.adjust_reputation(delta);
        debug!("Reputation of {} now {:.3} ({:+.3})", scout_id, updated, delta);
        Ok(updated)
    }

    pub fn set_active(&self, scout_id: &ScoutId, active: bool) -> Result<(), RegistryError> {
        let mut scouts = self.scouts.write().expect("scout registry poisoned");
        let scout = scouts
            .get_mut(scout_id)
            .ok_or_else(|| RegistryError::UnknownScout(scout_id.clone()))?;
        scout.active = active;
        Ok(())
    }

    /// Snapshot of all active scouts
    pub fn iter_active(&self) -> Vec<Scout> {
        self.scouts
            .read()
            .expect("scout registry poisoned")
            .values()
            .filter(|s| s.active)
            .cloned()
            .collect()
    }

    /// Record an accepted submission against the owning scout
    pub fn record_submission(
        &self,
        scout_id: &ScoutId,
        value: Value,
        now: TimestampMs,
    ) -> Result<(), RegistryError> {
        let mut scouts = self.scouts.write().expect("scout registry poisoned");
        let scout = scouts
            .get_mut(scout_id)
            .ok_or_else(|| RegistryError::UnknownScout(scout_id.clone()))?;
        scout.record_submission(value, now);
        Ok(())
    }

    /// Record a bundle committed into a block
    pub fn record_success(&self, scout_id: &ScoutId, now: TimestampMs) -> Result<(), RegistryError> {
        let mut scouts = self.scouts.write().expect("scout registry poisoned");
        let scout = scouts
            .get_mut(scout_id)
            .ok_or_else(|| RegistryError::UnknownScout(scout_id.clone()))?;
        scout.record_success(now);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.scouts.read().expect("scout registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ScoutRegistry {
    fn default() -> Self {
        Self::new()
    }
}
