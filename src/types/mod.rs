// Data model for the negotiation core
//
// Pure data: construction, invariant checks and serde only. Behavior lives
// in the negotiation, sparring and fuzzing modules. Collections own their
// records; cross-references use ids, never back-pointers.

pub mod attack;
pub mod bundle;
pub mod challenge;
pub mod coalition;
pub mod conflict;
pub mod distribution;
pub mod primitives;
pub mod scout;

pub use attack::{
    AttackDetail, AttackKind, AttackScenario, AttackSeverity, FuzzOutcome, FuzzResult, FuzzerStats,
    KindStats, ScenarioParams,
};
pub use bundle::{ArbitrageOpportunity, BundleKind, RevealedBundle, SealedBundle};
pub use challenge::{
    Attestation, AttestationKind, AttackVector, BundleView, Challenge, ChallengeResponse, Counter,
    CounterDecision, CounterMeasure, Recommendation, Vulnerability,
};
pub use coalition::{Coalition, NegotiatedBlock};
pub use conflict::{Conflict, ConflictKind};
pub use distribution::{AllocationMethod, ProfitDistribution, ScoutShare};
pub use primitives::{
    BundleId, ChallengeId, CoalitionId, CounterId, GasUnits, Hash, ScoutId, TimestampMs, Value,
    GWEI, UNIT,
};
pub use scout::Scout;
