// Bundle model - sealed (commit) and revealed (payload-bearing) MEV bundles
//
// Scouts submit sealed bundles carrying only a commitment fingerprint, then
// reveal the transaction payloads once the operator has accepted the bundle.
// The commit-then-reveal protocol keeps the operator from front-running its
// own scouts.

use super::primitives::{amount_serde, BundleId, GasUnits, Hash, ScoutId, TimestampMs, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Bundle strategy families
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleKind {
    Arbitrage,
    Liquidation,
    Backrun,
    Sandwich,
    FlashLoan,
    MevBoost,
    Custom,
}

impl BundleKind {
    pub fn all() -> &'static [BundleKind] {
        &[
            BundleKind::Arbitrage,
            BundleKind::Liquidation,
            BundleKind::Backrun,
            BundleKind::Sandwich,
            BundleKind::FlashLoan,
            BundleKind::MevBoost,
            BundleKind::Custom,
        ]
    }
}

impl fmt::Display for BundleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BundleKind::Arbitrage => "arbitrage",
            BundleKind::Liquidation => "liquidation",
            BundleKind::Backrun => "backrun",
            BundleKind::Sandwich => "sandwich",
            BundleKind::FlashLoan => "flash-loan",
            BundleKind::MevBoost => "mev-boost",
            BundleKind::Custom => "custom",
        };
        write!(f, "{}", s)
    }
}

/// Structured description of an arbitrage opportunity, revealed with the payloads.
///
/// Token and pool sets drive semantic conflict detection between bundles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    /// Token addresses touched by the route
    pub tokens: BTreeSet<String>,

    /// Pool addresses touched by the route
    pub pools: BTreeSet<String>,

    /// Expected profit in native smallest units
    #[serde(with = "amount_serde")]
    pub expected_profit: Value,
}

/// A sealed bundle: the commitment half of the commit-then-reveal protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBundle {
    /// Unique bundle identifier
    pub bundle_id: BundleId,

    /// Owning scout
    pub scout_id: ScoutId,

    /// Strategy family
    pub kind: BundleKind,

    /// Blake3 fingerprint of the ordered payload bytes
    pub commit_hash: Hash,

    /// Promised extractable value (native smallest units)
    #[serde(with = "amount_serde")]
    pub promised_value: Value,

    /// Ordered transaction references
    pub tx_ids: Vec<String>,

    /// Combined gas estimate
    pub gas_estimate: GasUnits,

    /// Creation timestamp (engine clock, ms)
    pub created_at: TimestampMs,

    /// Expiry timestamp; non-revealed bundles are swept after this
    pub expires_at: TimestampMs,
}

impl SealedBundle {
    /// Check structural invariants: `expires_at > created_at`
    pub fn is_well_formed(&self) -> bool {
        self.expires_at > self.created_at
    }

    pub fn is_expired(&self, now: TimestampMs) -> bool {
        self.expires_at <= now
    }
}

// Pool ordering: oldest first, bundle id breaks ties
impl PartialOrd for SealedBundle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SealedBundle {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.created_at, &self.bundle_id).cmp(&(other.created_at, &other.bundle_id))
    }
}

/// A revealed bundle: sealed header plus the opened payloads.
///
/// Invariant, enforced at reveal time: `fingerprint(tx_payloads) == commit_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealedBundle {
    /// The original sealed header
    pub sealed: SealedBundle,

    /// Opaque transaction payloads, in `tx_ids` order
    pub tx_payloads: Vec<Vec<u8>>,

    /// Ed25519 signature over the reveal, by the scout's registered key
    #[serde(with = "sig_serde")]
    pub signature: [u8; 64],

    /// Structured opportunity, when the scout discloses one
    pub opportunity: Option<ArbitrageOpportunity>,
}

impl RevealedBundle {
    pub fn bundle_id(&self) -> &BundleId {
        &self.sealed.bundle_id
    }

    pub fn scout_id(&self) -> &ScoutId {
        &self.sealed.scout_id
    }

    pub fn promised_value(&self) -> Value {
        self.sealed.promised_value
    }
}

/// Serde helper for 64-byte signatures (hex on the wire)
pub(crate) mod sig_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8; 64], serializer: S) -> Result<S::Ok, S::Error> {
        hex::encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 64], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        if bytes.len() != 64 {
            return Err(serde::de::Error::custom("signature must be 64 bytes"));
        }
        let mut arr = [0u8; 64];
        arr.copy_from_slice(&bytes);
        Ok(arr)
    }
}
