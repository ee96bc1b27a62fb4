// Coalition model - sets of simultaneously-executable bundles and the
// negotiated block assembled from the winning coalition
use super::bundle::RevealedBundle;
use super::challenge::Attestation;
use super::primitives::{amount_serde, CoalitionId, GasUnits, Hash, ScoutId, TimestampMs, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A valid (conflict-free) set of bundles selected for joint execution.
///
/// Ephemeral: owned by the coalition engine for the duration of one
/// negotiation round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coalition {
    pub coalition_id: CoalitionId,

    /// Scouts with at least one member bundle
    pub scouts: BTreeSet<ScoutId>,

    /// Member bundles, in pool order
    pub bundles: Vec<RevealedBundle>,

    /// Sum of member promised values
    #[serde(with = "amount_serde")]
    pub value: Value,

    /// Average marginal contribution per scout over all join orderings
    /// (the Shapley value, aggregated over each scout's bundles)
    pub marginal_contributions: BTreeMap<ScoutId, f64>,

    /// True iff the Shapley allocation lies in the core: no strict
    /// sub-coalition could do better on its own
    pub stable: bool,
}

impl Coalition {
    pub fn member_ids(&self) -> Vec<&super::primitives::BundleId> {
        self.bundles.iter().map(|b| b.bundle_id()).collect()
    }

    pub fn size(&self) -> usize {
        self.bundles.len()
    }
}

/// The emitted result of a successful negotiation round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiatedBlock {
    pub block_id: Hash,

    /// The winning coalition
    pub coalition: Coalition,

    /// Combined transaction list, member bundles concatenated in pool order
    pub tx_ids: Vec<String>,

    /// Aggregate gas estimate
    pub total_gas: GasUnits,

    /// Shapley value per scout (sums to the coalition's characteristic value)
    pub shapley_values: BTreeMap<ScoutId, f64>,

    /// Block assembly timestamp (engine clock, ms)
    pub timestamp: TimestampMs,

    /// Optional operator signature over the block id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    /// Optional enclave attestation, stored and forwarded unverified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<Attestation>,
}

impl NegotiatedBlock {
    /// Attach the operator's signature over the block id
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Attach an enclave attestation. The core forwards it as-is.
    pub fn with_attestation(mut self, attestation: Attestation) -> Self {
        self.attestation = Some(attestation);
        self
    }
}
