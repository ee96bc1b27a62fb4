// Profit distribution model - per-scout shares of a coalition's value
use super::primitives::{amount_serde, ScoutId, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cooperative-game allocation algorithms.
///
/// `Shapley` and `RobinHood` are implemented; the rest are extension points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationMethod {
    Shapley,
    Nucleolus,
    Core,
    Proportional,
    Equal,
    RobinHood,
}

impl fmt::Display for AllocationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AllocationMethod::Shapley => "shapley",
            AllocationMethod::Nucleolus => "nucleolus",
            AllocationMethod::Core => "core",
            AllocationMethod::Proportional => "proportional",
            AllocationMethod::Equal => "equal",
            AllocationMethod::RobinHood => "robin-hood",
        };
        write!(f, "{}", s)
    }
}

/// One scout's share of the distributed profit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoutShare {
    pub scout_id: ScoutId,

    /// Raw promised value this scout's bundles brought in
    #[serde(with = "amount_serde")]
    pub contributed: Value,

    /// Average marginal contribution over join orderings
    pub marginal: f64,

    /// Shapley value
    pub shapley: f64,

    /// Base allocation, proportional to Shapley after the operator fee
    pub base: f64,

    /// Redistribution bonus for below-average contributors
    pub bonus: f64,

    /// Final payout (base + bonus, post-normalization)
    pub total: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_address: Option<String>,
}

/// The full allocation for one negotiated block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfitDistribution {
    /// Coalition value being distributed
    #[serde(with = "amount_serde")]
    pub total_profit: Value,

    /// Operator's cut, including any normalization excess
    pub operator_fee: f64,

    pub shares: Vec<ScoutShare>,

    /// Bonus granted to below-average contributors, before normalization
    pub redistribution_amount: f64,

    /// Fraction of the below-average gap that was refunded
    pub redistribution_fraction: f64,

    pub method: AllocationMethod,
}

impl ProfitDistribution {
    /// Conservation check: no negative share, and shares plus fee never
    /// exceed the distributed value
    pub fn is_conserving(&self) -> bool {
        let paid: f64 = self.shares.iter().map(|s| s.total).sum();
        self.shares.iter().all(|s| s.total >= 0.0 && s.base >= 0.0 && s.bonus >= 0.0)
            && paid + self.operator_fee <= self.total_profit as f64 + 1e-6
    }
}
