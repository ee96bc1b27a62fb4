// Negotiation pipeline: conflict detection, coalition formation, profit
// distribution, and the orchestrator that drives a round end to end

pub mod coalition;
pub mod conflict;
pub mod distribution;
pub mod negotiator;

pub use coalition::{AdditiveValue, CharacteristicFn, CoalitionEngine, CoalitionOutcome};
pub use conflict::ConflictDetector;
pub use distribution::{DistributionError, ProfitDistributor};
pub use negotiator::{NegotiationError, NegotiationResult, Negotiator};
