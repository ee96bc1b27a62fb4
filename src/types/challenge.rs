// Challenge model - adversarial "break this bundle" analyses and the
// deadline-bounded counter responses they demand
use super::attack::{AttackKind, AttackSeverity};
use super::bundle::BundleKind;
use super::primitives::{amount_serde, BundleId, ChallengeId, CounterId, GasUnits, ScoutId, TimestampMs, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The slice of a bundle the sparring layer reasons about.
///
/// Risk estimates (`mev_risk`, `slippage_risk`, `profit_fraction`) come from
/// the host's market intelligence; the core treats them as given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleView {
    pub bundle_id: BundleId,
    pub scout_id: ScoutId,
    pub kind: BundleKind,

    #[serde(with = "amount_serde")]
    pub value: Value,

    pub gas_estimate: GasUnits,
    pub tx_count: usize,

    /// Net profit as a percentage of the bundle's notional
    pub profit_fraction: f64,

    /// Estimated sandwich/extraction exposure in [0, 1]
    pub mev_risk: f64,

    /// Estimated slippage exposure in [0, 1]
    pub slippage_risk: f64,
}

/// One way the challenger believes the bundle can be broken
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackVector {
    pub kind: AttackKind,
    pub severity: AttackSeverity,

    /// Probability the attack lands, in [0, 1]
    pub probability: f64,

    #[serde(with = "amount_serde")]
    pub estimated_loss: Value,

    /// Suggested counter-measure label, when the challenger has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter_measure: Option<String>,
}

/// A structural weakness independent of any single attack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub category: String,

    /// How easy the weakness is to exploit, in [0, 1]
    pub exploitability: f64,

    /// How bad exploitation would be, in [0, 1]
    pub impact: f64,
}

/// Challenger verdict on whether the bundle should run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Recommendation {
    Proceed,
    Abort,
    Modify,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::Proceed => "proceed",
            Recommendation::Abort => "abort",
            Recommendation::Modify => "modify",
        };
        write!(f, "{}", s)
    }
}

/// What the oracle challenger returns for one prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub attack_vectors: Vec<AttackVector>,
    pub vulnerabilities: Vec<Vulnerability>,

    /// Bundle robustness in [0, 100]; higher is safer
    pub overall_score: f64,

    pub recommendation: Recommendation,
}

/// A recorded challenge awaiting its counter response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub challenge_id: ChallengeId,
    pub bundle_id: BundleId,

    /// Monotonic issue time; the counter deadline counts from here
    pub issued_at: TimestampMs,

    /// The break-this-bundle prompt sent to the challenger
    pub prompt: String,

    pub attack_vectors: Vec<AttackVector>,
    pub vulnerabilities: Vec<Vulnerability>,
    pub overall_score: f64,
    pub recommendation: Recommendation,
}

/// A counter-measure applied against one attack vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterMeasure {
    /// The vector being countered
    pub vector_kind: AttackKind,

    /// Mitigation method label (e.g. "private-mempool")
    pub method: String,

    /// Expected effectiveness in [0, 1]; vectors countered at >= 0.7
    /// count toward the counter rate
    pub effectiveness: f64,

    pub applied: bool,
}

/// Final decision after the counter response is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CounterDecision {
    Proceed,
    Retry,
    Abort,
}

impl fmt::Display for CounterDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CounterDecision::Proceed => "proceed",
            CounterDecision::Retry => "retry",
            CounterDecision::Abort => "abort",
        };
        write!(f, "{}", s)
    }
}

/// The evaluated counter response to a challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    pub counter_id: CounterId,
    pub challenge_id: ChallengeId,

    /// Milliseconds between challenge issue and counter arrival
    pub response_time_ms: u64,

    /// Missing the deadline forces an abort decision
    pub within_deadline: bool,

    pub counter_measures: Vec<CounterMeasure>,

    /// Reworked bundle, when the counter modified it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_bundle: Option<BundleView>,

    pub decision: CounterDecision,

    /// Confidence in the decision, in [0, 1]
    pub confidence: f64,
}

/// Enclave attestation flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttestationKind {
    Sgx,
    Sev,
    Nitro,
    Mock,
}

/// Opaque enclave attestation. The core stores and forwards it; verification
/// belongs to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    pub kind: AttestationKind,

    /// Raw quote bytes, hex on the wire
    #[serde(with = "quote_serde")]
    pub quote: Vec<u8>,

    pub verified: bool,
}

mod quote_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        hex::encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
