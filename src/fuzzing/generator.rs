// Seeded scenario generation
//
// The generator runs on a fixed linear-congruential PRNG so that a given
// seed always yields the identical scenario stream; the regression suite
// depends on this. Host randomness sources must never be substituted here.

use crate::types::{
    AttackDetail, AttackKind, AttackScenario, AttackSeverity, FuzzOutcome, ScenarioParams, Value,
    UNIT,
};

/// Deterministic linear-congruential generator.
///
/// state' = (state * 1103515245 + 12345) mod 2^31
pub struct Lcg {
    state: u64,
}

impl Lcg {
    const MULTIPLIER: u64 = 1_103_515_245;
    const INCREMENT: u64 = 12_345;
    const MASK: u64 = 0x7FFF_FFFF;

    pub fn new(seed: u64) -> Self {
        Self { state: seed & Self::MASK }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT)
            & Self::MASK;
        self.state as u32
    }

    /// Uniform float in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / (Self::MASK + 1) as f64
    }

    pub fn range_f64(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_f64() * (hi - lo)
    }

    /// Uniform integer in [lo, hi]
    pub fn range_u64(&mut self, lo: u64, hi: u64) -> u64 {
        lo + (self.next_f64() * (hi - lo + 1) as f64) as u64
    }
}

/// Produces value-copied attack scenarios from the seeded stream
pub struct ScenarioGenerator {
    rng: Lcg,
    counter: u64,
}

impl ScenarioGenerator {
    pub fn new(seed: u64) -> Self {
        Self { rng: Lcg::new(seed), counter: 0 }
    }

    /// Generate the next scenario, drawing the kind from `kinds`
    pub fn generate(&mut self, kinds: &[AttackKind]) -> AttackScenario {
        let kind = kinds[self.rng.next_u32() as usize % kinds.len()];

        let target_units = self.rng.range_f64(0.0, 100.0);
        let target_value = to_value(target_units);

        let mut params = ScenarioParams {
            target_value,
            target_gas_price: self.rng.range_u64(0, 200),
            block_delay: self.rng.range_u64(0, 2) as u32,
            timing_window_ms: self.rng.range_u64(100, 2_100),
            attacker_budget: target_value.saturating_mul(2),
            min_profit: target_value / 100,
            max_slippage: self.rng.range_f64(0.0, 5.0),
            gas_multiplier: self.rng.range_f64(1.0, 1.5),
            priority_fee_bump: self.rng.range_f64(1.0, 3.0),
        };

        let detail = self.elaborate(kind, &mut params);

        let severity = if kind == AttackKind::TimeBandit {
            // Reorgs re-extract settled value; always critical
            AttackSeverity::Critical
        } else {
            AttackSeverity::classify_value(target_value)
        };

        let expected_outcome = match severity {
            AttackSeverity::Critical | AttackSeverity::High => FuzzOutcome::Mitigated,
            AttackSeverity::Medium | AttackSeverity::Low => FuzzOutcome::Detected,
        };

        self.counter += 1;
        AttackScenario {
            scenario_id: format!("scenario-{:04}-{}", self.counter, kind),
            kind,
            severity,
            params,
            detail,
            expected_outcome,
        }
    }

    fn elaborate(&mut self, kind: AttackKind, params: &mut ScenarioParams) -> AttackDetail {
        match kind {
            AttackKind::Sandwich => AttackDetail::Sandwich {
                front_ratio: self.rng.range_f64(0.3, 0.7),
            },
            AttackKind::Frontrun => {
                params.priority_fee_bump = self.rng.range_f64(1.5, 4.0);
                AttackDetail::Frontrun { priority_fee_bump: params.priority_fee_bump }
            }
            AttackKind::Backrun => {
                // Backruns land in the same block as the target
                params.block_delay = 0;
                AttackDetail::Backrun
            }
            AttackKind::TimeBandit => AttackDetail::TimeBandit {
                reorg_depth: self.rng.range_u64(1, 3) as u32,
            },
            AttackKind::GeneralizedFrontrun => AttackDetail::GeneralizedFrontrun {
                requires_simulation: true,
                requires_call_trace: true,
            },
            AttackKind::JitLiquidity => AttackDetail::JitLiquidity {
                liquidity: params.target_value.saturating_mul(10),
                tick_range: self.rng.range_u64(0, 100) as u32,
            },
            AttackKind::ArbitrageInterception => {
                let original_profit = params.target_value / 10;
                let interceptor_profit = scale(original_profit, self.rng.range_f64(0.5, 1.2));
                AttackDetail::ArbitrageInterception { original_profit, interceptor_profit }
            }
            AttackKind::GasWar | AttackKind::Timing => {
                // Not a fuzzable kind; callers draw from AttackKind::fuzzable()
                unreachable!("{} is not a synthesizable scenario kind", kind)
            }
        }
    }
}

fn to_value(units: f64) -> Value {
    (units * UNIT as f64) as Value
}

fn scale(value: Value, factor: f64) -> Value {
    (value as f64 * factor).max(0.0) as Value
}
