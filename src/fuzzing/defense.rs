// Defense handler port and outcome classification
//
// A defense handler is the host-supplied capability under test: given a
// scenario it reports whether the attack was detected and whether it was
// mitigated. Classification of the combined answer is fixed here so every
// handler is graded identically.

use crate::types::{AttackScenario, AttackSeverity, FuzzOutcome, Value};
use async_trait::async_trait;

/// What a defense handler reports for one scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefenseResponse {
    pub detected: bool,
    pub mitigated: bool,

    /// Label of the mitigation that fired, when one did
    pub mitigation_method: Option<String>,

    pub response_time_ms: u64,
}

/// Host-registered defense capability, one per attack kind.
///
/// Calls are bounded by the configured scenario timeout; a handler that
/// exceeds it is graded as bypassed.
#[async_trait]
pub trait DefenseHandler: Send + Sync {
    async fn handle(&self, scenario: &AttackScenario) -> DefenseResponse;
}

/// Fold a handler's answer into the outcome taxonomy
pub fn classify_outcome(detected: bool, mitigated: bool) -> FuzzOutcome {
    match (detected, mitigated) {
        (true, true) => FuzzOutcome::Mitigated,
        (true, false) => FuzzOutcome::Detected,
        (false, true) => FuzzOutcome::Partial,
        (false, false) => FuzzOutcome::Bypassed,
    }
}

/// A bypass is always a vulnerability; so is a critical attack that was
/// seen but not stopped
pub fn vulnerability_found(outcome: FuzzOutcome, severity: AttackSeverity) -> bool {
    match outcome {
        FuzzOutcome::Bypassed => true,
        FuzzOutcome::Detected => severity == AttackSeverity::Critical,
        FuzzOutcome::Mitigated | FuzzOutcome::Partial => false,
    }
}

/// Value the attack would extract if it landed
pub fn damage_estimate(scenario: &AttackScenario) -> Value {
    let factor = scenario.severity.risk_weight();
    (scenario.params.target_value as f64 * factor) as Value
}

/// Value the defense kept away from the attacker
pub fn damage_avoided(outcome: FuzzOutcome, estimate: Value) -> Value {
    match outcome {
        FuzzOutcome::Mitigated => estimate,
        FuzzOutcome::Partial => estimate / 2,
        FuzzOutcome::Detected | FuzzOutcome::Bypassed => 0,
    }
}
