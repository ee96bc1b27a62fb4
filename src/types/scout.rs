// Scout - external searcher agents that discover and submit MEV bundles
use super::primitives::{ScoutId, TimestampMs, Value};
use crate::registry::scoring::{clamp_reputation, INITIAL_REPUTATION};
use serde::{Deserialize, Serialize};

/// Serde helper for 32-byte public keys (hex on the wire)
mod pubkey_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(key: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        hex::encode(key).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        if bytes.len() != 32 {
            return Err(serde::de::Error::custom("public key must be 32 bytes"));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(arr)
    }
}

/// A registered searcher agent.
///
/// Created on first registration, mutated by negotiation outcomes,
/// never destroyed (deactivated only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scout {
    /// Stable identity
    pub scout_id: ScoutId,

    /// Ed25519 verifying key used to check reveal signatures
    #[serde(with = "pubkey_serde")]
    pub public_key: [u8; 32],

    /// Reputation in [0, 1]
    pub reputation: f64,

    /// Bundles accepted into the pending pool
    pub submitted: u64,

    /// Bundles committed into a negotiated block
    pub successful: u64,

    /// Total promised value across submitted bundles
    #[serde(with = "super::primitives::amount_serde")]
    pub total_value: Value,

    /// Rolling average promised value per submission (native smallest units)
    pub avg_value: f64,

    /// Last activity timestamp (engine clock, ms)
    pub last_seen: TimestampMs,

    /// Deactivated scouts cannot submit
    pub active: bool,

    /// Where this scout's profit shares are paid out
    pub payout_address: Option<String>,
}

impl Scout {
    pub fn new(scout_id: ScoutId, public_key: [u8; 32], now: TimestampMs) -> Self {
        Self {
            scout_id,
            public_key,
            reputation: INITIAL_REPUTATION,
            submitted: 0,
            successful: 0,
            total_value: 0,
            avg_value: 0.0,
            last_seen: now,
            active: true,
            payout_address: None,
        }
    }

    pub fn with_payout_address(mut self, address: impl Into<String>) -> Self {
        self.payout_address = Some(address.into());
        self
    }

    /// Record an accepted submission
    pub fn record_submission(&mut self, value: Value, now: TimestampMs) {
        self.submitted += 1;
        self.total_value = self.total_value.saturating_add(value);
        self.avg_value = self.total_value as f64 / self.submitted as f64;
        self.last_seen = now;
    }

    /// Record a bundle committed into a block
    pub fn record_success(&mut self, now: TimestampMs) {
        self.successful += 1;
        self.last_seen = now;
    }

    /// Apply a reputation delta, clamped to [0, 1]
    pub fn adjust_reputation(&mut self, delta: f64) -> f64 {
        self.reputation = clamp_reputation(self.reputation + delta);
        self.reputation
    }

    /// Fraction of submitted bundles that made it into a block
    pub fn success_rate(&self) -> f64 {
        if self.submitted == 0 {
            0.0
        } else {
            self.successful as f64 / self.submitted as f64
        }
    }
}
