// Attack model - synthetic MEV attack scenarios and fuzzing outcomes
//
// Shared vocabulary for the fuzzer and the adversarial sparring layer:
// the same attack kinds appear as generated scenarios and as challenger
// attack vectors.

use super::primitives::{amount_serde, Value, UNIT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Adversarial transaction-ordering strategy families
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttackKind {
    Sandwich,
    Frontrun,
    Backrun,
    TimeBandit,
    GeneralizedFrontrun,
    JitLiquidity,
    ArbitrageInterception,
    /// Challenger-vector only; the fuzzer does not synthesize gas wars
    GasWar,
    /// Challenger-vector only
    Timing,
}

impl AttackKind {
    /// The scenario kinds the fuzzer can synthesize
    pub fn fuzzable() -> &'static [AttackKind] {
        &[
            AttackKind::Sandwich,
            AttackKind::Frontrun,
            AttackKind::Backrun,
            AttackKind::TimeBandit,
            AttackKind::GeneralizedFrontrun,
            AttackKind::JitLiquidity,
            AttackKind::ArbitrageInterception,
        ]
    }

    pub fn description(&self) -> &'static str {
        match self {
            AttackKind::Sandwich => "Surround a victim trade with a buy and a sell",
            AttackKind::Frontrun => "Copy a pending transaction with a higher priority fee",
            AttackKind::Backrun => "Capture the price impact immediately after a target",
            AttackKind::TimeBandit => "Reorganize recent blocks to re-extract settled value",
            AttackKind::GeneralizedFrontrun => "Simulate and replace arbitrary profitable calls",
            AttackKind::JitLiquidity => "Provide single-block liquidity around a large swap",
            AttackKind::ArbitrageInterception => "Steal a discovered arbitrage route before execution",
            AttackKind::GasWar => "Outbid competing bundles on gas for the same slot",
            AttackKind::Timing => "Exploit ordering slack between dependent transactions",
        }
    }
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttackKind::Sandwich => "sandwich",
            AttackKind::Frontrun => "frontrun",
            AttackKind::Backrun => "backrun",
            AttackKind::TimeBandit => "time-bandit",
            AttackKind::GeneralizedFrontrun => "generalized-frontrun",
            AttackKind::JitLiquidity => "jit-liquidity",
            AttackKind::ArbitrageInterception => "arbitrage-interception",
            AttackKind::GasWar => "gas-war",
            AttackKind::Timing => "timing",
        };
        write!(f, "{}", s)
    }
}

/// Scenario and attack-vector severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttackSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AttackSeverity {
    pub fn all() -> &'static [AttackSeverity] {
        &[
            AttackSeverity::Low,
            AttackSeverity::Medium,
            AttackSeverity::High,
            AttackSeverity::Critical,
        ]
    }

    /// Weight used when folding attack vectors into a challenge risk score
    pub fn risk_weight(&self) -> f64 {
        match self {
            AttackSeverity::Low => 0.1,
            AttackSeverity::Medium => 0.25,
            AttackSeverity::High => 0.4,
            AttackSeverity::Critical => 0.6,
        }
    }

    /// Classify a scenario by the value at stake
    pub fn classify_value(value: Value) -> Self {
        if value > 50 * UNIT {
            AttackSeverity::Critical
        } else if value > 10 * UNIT {
            AttackSeverity::High
        } else if value > UNIT {
            AttackSeverity::Medium
        } else {
            AttackSeverity::Low
        }
    }
}

impl fmt::Display for AttackSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttackSeverity::Low => "low",
            AttackSeverity::Medium => "medium",
            AttackSeverity::High => "high",
            AttackSeverity::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Common scenario parameters, drawn from the seeded generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParams {
    /// Value the attacker is targeting
    #[serde(with = "amount_serde")]
    pub target_value: Value,

    /// Target's gas price, Gwei-equivalent
    pub target_gas_price: u64,

    /// Blocks the attacker waits before striking
    pub block_delay: u32,

    /// Attack timing window, milliseconds
    pub timing_window_ms: u64,

    /// Capital the attacker can deploy (2x target value)
    #[serde(with = "amount_serde")]
    pub attacker_budget: Value,

    /// Minimum profit for the attack to be worth mounting
    #[serde(with = "amount_serde")]
    pub min_profit: Value,

    /// Maximum tolerated slippage, percent
    pub max_slippage: f64,

    /// Gas price multiplier over the target
    pub gas_multiplier: f64,

    /// Priority-fee escalation factor
    pub priority_fee_bump: f64,
}

/// Kind-specific scenario payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AttackDetail {
    Sandwich {
        /// Fraction of the budget spent on the front leg
        front_ratio: f64,
    },
    Frontrun {
        priority_fee_bump: f64,
    },
    Backrun,
    TimeBandit {
        reorg_depth: u32,
    },
    GeneralizedFrontrun {
        requires_simulation: bool,
        requires_call_trace: bool,
    },
    JitLiquidity {
        #[serde(with = "amount_serde")]
        liquidity: Value,
        tick_range: u32,
    },
    ArbitrageInterception {
        #[serde(with = "amount_serde")]
        original_profit: Value,
        #[serde(with = "amount_serde")]
        interceptor_profit: Value,
    },
}

/// One synthetic attack scenario, value-copied before dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackScenario {
    pub scenario_id: String,
    pub kind: AttackKind,
    pub severity: AttackSeverity,
    pub params: ScenarioParams,
    pub detail: AttackDetail,
    pub expected_outcome: FuzzOutcome,
}

/// What the defense layer achieved against a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FuzzOutcome {
    /// Seen and neutralized
    Mitigated,
    /// Seen but not neutralized
    Detected,
    /// Neutralized without being recognized
    Partial,
    /// Neither seen nor neutralized
    Bypassed,
}

impl fmt::Display for FuzzOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FuzzOutcome::Mitigated => "mitigated",
            FuzzOutcome::Detected => "detected",
            FuzzOutcome::Partial => "partial",
            FuzzOutcome::Bypassed => "bypassed",
        };
        write!(f, "{}", s)
    }
}

/// Per-scenario fuzzing result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzResult {
    pub scenario_id: String,
    pub kind: AttackKind,
    pub severity: AttackSeverity,
    pub outcome: FuzzOutcome,

    /// How long the defense took to respond
    pub detection_time_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation_applied: Option<String>,

    /// Value the attack would have extracted
    #[serde(with = "amount_serde")]
    pub damage_estimate: Value,

    /// Value the defense kept out of the attacker's hands
    #[serde(with = "amount_serde")]
    pub damage_avoided: Value,

    pub vulnerability_found: bool,

    pub detail: String,

    pub recommendations: Vec<String>,
}

/// Per-kind outcome counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindStats {
    pub total: u64,
    pub detected: u64,
    pub mitigated: u64,
    pub partial: u64,
    pub bypassed: u64,
}

/// Aggregate statistics for one fuzzing run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FuzzerStats {
    pub total_scenarios: u64,
    pub detected: u64,
    pub mitigated: u64,
    pub partial: u64,
    pub bypassed: u64,
    pub vulnerabilities: u64,
    pub avg_detection_time_ms: f64,

    #[serde(with = "amount_serde")]
    pub total_damage_avoided: Value,

    pub by_kind: BTreeMap<AttackKind, KindStats>,

    /// Per-scenario results, in generation order
    pub results: Vec<FuzzResult>,
}
