//! Engine configuration
//!
//! Configurable parameters for negotiation, sparring and fuzzing.
//! Defaults are chosen for a block-time-scale negotiation loop with a
//! sub-second adversarial response budget.

use crate::types::{AllocationMethod, AttackKind, AttackSeverity};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be a fraction in [0, 1], got {value}")]
    FractionOutOfRange { field: &'static str, value: f64 },

    #[error("max_bundles_per_block must be in 1..=16, got {0}")]
    BadBundleCap(usize),

    #[error("{field} must be non-zero")]
    Zero { field: &'static str },

    #[error("severity_filter must not be empty")]
    EmptySeverityFilter,

    #[error("no attack kinds enabled: enable_all_attacks is false and focus_attacks is empty")]
    NoAttackKinds,
}

/// Negotiation round parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationConfig {
    /// Share of coalition value retained by the operator
    pub operator_fee_fraction: f64,

    /// Fraction of the below-average gap refunded to smaller contributors
    pub redistribution_fraction: f64,

    /// Allocation algorithm for profit shares
    pub allocation_method: AllocationMethod,

    /// Scouts below this reputation cannot submit
    pub min_reputation: f64,

    /// Hard cap on coalition size; enforced before subset enumeration
    pub max_bundles_per_block: usize,

    /// Permit bundles sharing token addresses to co-execute
    pub allow_token_overlap: bool,

    /// Permit bundles sharing pool addresses to co-execute
    pub allow_pool_overlap: bool,

    /// Conflicts above this severity forbid co-membership
    pub max_conflict_severity: f64,

    /// Lifetime of a non-revealed sealed bundle
    pub bundle_expiration_secs: u64,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            operator_fee_fraction: 0.05,
            redistribution_fraction: 0.5,
            allocation_method: AllocationMethod::Shapley,
            min_reputation: 0.5,
            max_bundles_per_block: 10,
            allow_token_overlap: false,
            allow_pool_overlap: false,
            max_conflict_severity: 0.3,
            bundle_expiration_secs: 30,
        }
    }
}

impl NegotiationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("operator_fee_fraction", self.operator_fee_fraction),
            ("redistribution_fraction", self.redistribution_fraction),
            ("min_reputation", self.min_reputation),
            ("max_conflict_severity", self.max_conflict_severity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::FractionOutOfRange { field, value });
            }
        }

        // 16 is the bitmask enumeration limit
        if self.max_bundles_per_block == 0 || self.max_bundles_per_block > 16 {
            return Err(ConfigError::BadBundleCap(self.max_bundles_per_block));
        }

        if self.bundle_expiration_secs == 0 {
            return Err(ConfigError::Zero { field: "bundle_expiration_secs" });
        }

        Ok(())
    }
}

/// Adversarial sparring parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparringConfig {
    /// Net profit percentage at which a bundle must be challenged
    pub profit_threshold: f64,

    /// Hard deadline for the counter response
    pub deadline_ms: u64,

    /// Refuse new challenges above this many in flight
    pub max_concurrent_challenges: usize,

    /// Budget for the external challenger call; on expiry the challenge
    /// degrades to the maximally-pessimistic response
    pub challenger_timeout_ms: u64,
}

impl Default for SparringConfig {
    fn default() -> Self {
        Self {
            profit_threshold: 0.7,
            deadline_ms: 400,
            max_concurrent_challenges: 10,
            challenger_timeout_ms: 10_000,
        }
    }
}

impl SparringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.profit_threshold < 0.0 {
            return Err(ConfigError::FractionOutOfRange {
                field: "profit_threshold",
                value: self.profit_threshold,
            });
        }
        if self.deadline_ms == 0 {
            return Err(ConfigError::Zero { field: "deadline_ms" });
        }
        if self.max_concurrent_challenges == 0 {
            return Err(ConfigError::Zero { field: "max_concurrent_challenges" });
        }
        if self.challenger_timeout_ms == 0 {
            return Err(ConfigError::Zero { field: "challenger_timeout_ms" });
        }
        Ok(())
    }
}

/// Attack fuzzer parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzerConfig {
    /// Scenarios generated per run (before severity filtering)
    pub scenarios_per_run: usize,

    /// Scenarios driven concurrently per batch
    pub max_concurrent: usize,

    /// Per-handler budget; on expiry the scenario counts as bypassed
    pub scenario_timeout_ms: u64,

    /// Seed for the scenario stream; identical seeds reproduce identical runs
    pub random_seed: u64,

    /// Generate every fuzzable attack kind
    pub enable_all_attacks: bool,

    /// Restrict generation to these kinds (overrides enable_all_attacks)
    pub focus_attacks: Vec<AttackKind>,

    /// Only run scenarios at these severities
    pub severity_filter: Vec<AttackSeverity>,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            scenarios_per_run: 100,
            max_concurrent: 10,
            scenario_timeout_ms: 5_000,
            random_seed: seed,
            enable_all_attacks: true,
            focus_attacks: Vec::new(),
            severity_filter: AttackSeverity::all().to_vec(),
        }
    }
}

impl FuzzerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scenarios_per_run == 0 {
            return Err(ConfigError::Zero { field: "scenarios_per_run" });
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::Zero { field: "max_concurrent" });
        }
        if self.scenario_timeout_ms == 0 {
            return Err(ConfigError::Zero { field: "scenario_timeout_ms" });
        }
        if self.severity_filter.is_empty() {
            return Err(ConfigError::EmptySeverityFilter);
        }
        if !self.enable_all_attacks && self.focus_attacks.is_empty() {
            return Err(ConfigError::NoAttackKinds);
        }
        Ok(())
    }

    /// The attack kinds this run will generate
    pub fn active_kinds(&self) -> Vec<AttackKind> {
        if self.focus_attacks.is_empty() {
            AttackKind::fuzzable().to_vec()
        } else {
            self.focus_attacks.clone()
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub negotiation: NegotiationConfig,
    pub sparring: SparringConfig,
    pub fuzzer: FuzzerConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.negotiation.validate()?;
        self.sparring.validate()?;
        self.fuzzer.validate()?;
        Ok(())
    }
}
