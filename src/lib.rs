// mev-negotiator - autonomous MEV bundle negotiation and adversarial
// hardening engine
//
// Library-shaped core embedded by a host process. Scouts submit sealed
// bundles; the negotiator reveals, de-conflicts and coalesces them, pays
// out cooperative-game shares, and gates high-profit bundles through an
// external break-this-bundle challenge with a hard counter deadline. A
// parallel fuzzer floods registered defenses with seeded synthetic attacks
// and measures detection, mitigation and bypass rates.
//
// The host supplies the ports: an OracleChallenger, an EventSink, a Clock,
// and DefenseHandlers. Everything the core tells the world goes out as
// value events.

pub mod clock;
pub mod config;
pub mod crypto;
pub mod events;
pub mod fuzzing;
pub mod negotiation;
pub mod registry;
pub mod sparring;
pub mod types;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig, FuzzerConfig, NegotiationConfig, SparringConfig};
pub use events::{ChannelSink, EventSink, NegotiationEvent, NullSink};
pub use fuzzing::defense::{DefenseHandler, DefenseResponse};
pub use fuzzing::AttackFuzzer;
pub use negotiation::coalition::{AdditiveValue, CharacteristicFn, CoalitionEngine};
pub use negotiation::conflict::ConflictDetector;
pub use negotiation::distribution::ProfitDistributor;
pub use negotiation::negotiator::{NegotiationError, NegotiationResult, Negotiator};
pub use registry::{RegistryError, ScoutRegistry};
pub use sparring::challenger::{ChallengerError, OracleChallenger, SimulatedChallenger};
pub use sparring::{SparringEngine, SparringError, SparringSession, SparringStats};
