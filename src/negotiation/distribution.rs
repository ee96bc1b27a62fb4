// Profit Distributor - turns a coalition's value into per-scout payouts
//
// Pipeline: operator fee off the top, base shares proportional to Shapley,
// then a robin-hood pass refunding part of the below-average gap to smaller
// contributors. A final normalization keeps the payout within the coalition
// value; anything normalization frees up stays with the operator fee.

use crate::config::NegotiationConfig;
use crate::types::{
    AllocationMethod, Coalition, ProfitDistribution, ScoutId, ScoutShare, Value,
};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum DistributionError {
    #[error("allocation method {0} is not implemented")]
    NotImplemented(AllocationMethod),

    #[error("cannot distribute over an empty coalition")]
    EmptyCoalition,
}

pub struct ProfitDistributor {
    operator_fee_fraction: f64,
    redistribution_fraction: f64,
    method: AllocationMethod,
}

impl ProfitDistributor {
    pub fn new(config: &NegotiationConfig) -> Self {
        Self {
            operator_fee_fraction: config.operator_fee_fraction,
            redistribution_fraction: config.redistribution_fraction,
            method: config.allocation_method,
        }
    }

    /// Distribute the coalition's value across its scouts.
    ///
    /// `shapley` is the per-scout Shapley vector from the coalition engine.
    pub fn distribute(
        &self,
        coalition: &Coalition,
        shapley: &BTreeMap<ScoutId, f64>,
    ) -> Result<ProfitDistribution, DistributionError> {
        if coalition.scouts.is_empty() {
            return Err(DistributionError::EmptyCoalition);
        }

        match self.method {
            AllocationMethod::Shapley | AllocationMethod::RobinHood => {
                Ok(self.shapley_robin_hood(coalition, shapley))
            }
            AllocationMethod::Proportional => Ok(self.proportional(coalition, shapley)),
            AllocationMethod::Equal => Ok(self.equal(coalition, shapley)),
            method @ (AllocationMethod::Nucleolus | AllocationMethod::Core) => {
                Err(DistributionError::NotImplemented(method))
            }
        }
    }

    fn shapley_robin_hood(
        &self,
        coalition: &Coalition,
        shapley: &BTreeMap<ScoutId, f64>,
    ) -> ProfitDistribution {
        let total = coalition.value as f64;
        let operator_fee = total * self.operator_fee_fraction;
        let remaining = total - operator_fee;

        let phi_sum: f64 = shapley.values().sum();
        let n = coalition.scouts.len() as f64;

        let mut shares: Vec<ScoutShare> = coalition
            .scouts
            .iter()
            .map(|scout_id| {
                let phi = shapley.get(scout_id).copied().unwrap_or(0.0);
                // Degenerate phi vector falls back to an equal split
                let base = if phi_sum > 0.0 { phi / phi_sum * remaining } else { remaining / n };
                ScoutShare {
                    scout_id: scout_id.clone(),
                    contributed: contributed(coalition, scout_id),
                    marginal: phi,
                    shapley: phi,
                    base,
                    bonus: 0.0,
                    total: 0.0,
                    payout_address: None,
                }
            })
            .collect();

        // Robin-hood pass: refund part of the below-average gap
        let average = remaining / n;
        let mut redistribution_amount = 0.0;
        for share in &mut shares {
            if share.base < average {
                share.bonus = (average - share.base) * self.redistribution_fraction;
                redistribution_amount += share.bonus;
            }
        }
        for share in &mut shares {
            share.total = share.base + share.bonus;
        }

        self.finish(coalition.value, shares, redistribution_amount)
    }

    fn proportional(
        &self,
        coalition: &Coalition,
        shapley: &BTreeMap<ScoutId, f64>,
    ) -> ProfitDistribution {
        let total = coalition.value as f64;
        let operator_fee = total * self.operator_fee_fraction;
        let remaining = total - operator_fee;

        let contributed_sum: f64 =
            coalition.scouts.iter().map(|s| contributed(coalition, s) as f64).sum();
        let n = coalition.scouts.len() as f64;

        let shares = coalition
            .scouts
            .iter()
            .map(|scout_id| {
                let c = contributed(coalition, scout_id);
                let base = if contributed_sum > 0.0 {
                    c as f64 / contributed_sum * remaining
                } else {
                    remaining / n
                };
                ScoutShare {
                    scout_id: scout_id.clone(),
                    contributed: c,
                    marginal: shapley.get(scout_id).copied().unwrap_or(0.0),
                    shapley: shapley.get(scout_id).copied().unwrap_or(0.0),
                    base,
                    bonus: 0.0,
                    total: base,
                    payout_address: None,
                }
            })
            .collect();

        self.finish(coalition.value, shares, 0.0)
    }

    fn equal(
        &self,
        coalition: &Coalition,
        shapley: &BTreeMap<ScoutId, f64>,
    ) -> ProfitDistribution {
        let total = coalition.value as f64;
        let operator_fee = total * self.operator_fee_fraction;
        let per_scout = (total - operator_fee) / coalition.scouts.len() as f64;

        let shares = coalition
            .scouts
            .iter()
            .map(|scout_id| ScoutShare {
                scout_id: scout_id.clone(),
                contributed: contributed(coalition, scout_id),
                marginal: shapley.get(scout_id).copied().unwrap_or(0.0),
                shapley: shapley.get(scout_id).copied().unwrap_or(0.0),
                base: per_scout,
                bonus: 0.0,
                total: per_scout,
                payout_address: None,
            })
            .collect();

        self.finish(coalition.value, shares, 0.0)
    }

    /// Normalize so that shares plus fee never exceed the coalition value;
    /// the operator retains whatever normalization frees up.
    fn finish(
        &self,
        total_profit: Value,
        mut shares: Vec<ScoutShare>,
        redistribution_amount: f64,
    ) -> ProfitDistribution {
        let value = total_profit as f64;
        let paid: f64 = shares.iter().map(|s| s.total).sum();
        let budget = value * (1.0 - self.operator_fee_fraction);

        if paid > budget && paid > 0.0 {
            let scale = budget / paid;
            for share in &mut shares {
                share.base *= scale;
                share.bonus *= scale;
                share.total *= scale;
            }
        }

        let paid: f64 = shares.iter().map(|s| s.total).sum();
        ProfitDistribution {
            total_profit,
            operator_fee: value - paid,
            shares,
            redistribution_amount,
            redistribution_fraction: self.redistribution_fraction,
            method: self.method,
        }
    }
}

fn contributed(coalition: &Coalition, scout_id: &ScoutId) -> Value {
    coalition
        .bundles
        .iter()
        .filter(|b| b.scout_id() == scout_id)
        .map(|b| b.promised_value())
        .sum()
}
