// Oracle challenger port and the deterministic simulated challenger
//
// The port wraps whatever external reasoning service the host wires in.
// The simulated implementation is rule-driven and fully deterministic so
// the sparring decision logic can be tested bit-for-bit.

use crate::types::{
    AttackKind, AttackSeverity, AttackVector, BundleKind, BundleView, ChallengeResponse,
    Recommendation, Value, Vulnerability,
};
use async_trait::async_trait;

/// Gas level above which a bundle invites a bidding war
const GAS_WAR_THRESHOLD: u64 = 500_000;

#[derive(Debug, thiserror::Error)]
pub enum ChallengerError {
    #[error("challenger unavailable: {0}")]
    Unavailable(String),
}

/// External "break this bundle" analysis port.
///
/// Implementations must honour the caller's timeout; the sparring engine
/// degrades to a maximally-pessimistic response when the call runs long.
#[async_trait]
pub trait OracleChallenger: Send + Sync {
    async fn challenge(
        &self,
        prompt: &str,
        view: &BundleView,
    ) -> Result<ChallengeResponse, ChallengerError>;
}

/// Rule-based challenger for tests and offline operation
pub struct SimulatedChallenger;

impl SimulatedChallenger {
    /// Derive attack vectors from the bundle's risk profile
    fn attack_vectors(view: &BundleView) -> Vec<AttackVector> {
        let mut vectors = Vec::new();

        if view.mev_risk > 0.3 {
            let severity = if view.mev_risk > 0.6 {
                AttackSeverity::Critical
            } else {
                AttackSeverity::High
            };
            vectors.push(AttackVector {
                kind: AttackKind::Sandwich,
                severity,
                probability: view.mev_risk,
                estimated_loss: scale(view.value, view.mev_risk),
                counter_measure: Some("private-mempool".to_string()),
            });
        }

        if view.slippage_risk > 0.2 {
            let probability = view.slippage_risk * 0.8;
            vectors.push(AttackVector {
                kind: AttackKind::Frontrun,
                severity: AttackSeverity::Medium,
                probability,
                estimated_loss: scale(view.value, probability * 0.5),
                counter_measure: None,
            });
        }

        if view.gas_estimate > GAS_WAR_THRESHOLD {
            vectors.push(AttackVector {
                kind: AttackKind::GasWar,
                severity: AttackSeverity::Medium,
                probability: 0.4,
                estimated_loss: scale(view.value, 0.05),
                counter_measure: None,
            });
        }

        if view.kind == BundleKind::Arbitrage {
            vectors.push(AttackVector {
                kind: AttackKind::Backrun,
                severity: AttackSeverity::Low,
                probability: 0.5,
                estimated_loss: scale(view.value, 0.05),
                counter_measure: None,
            });
        }

        vectors
    }

    fn vulnerabilities(view: &BundleView) -> Vec<Vulnerability> {
        let mut vulnerabilities = Vec::new();
        if view.tx_count > 2 {
            vulnerabilities.push(Vulnerability {
                category: "timing".to_string(),
                exploitability: 0.4,
                impact: 0.6,
            });
        }
        vulnerabilities
    }

    /// Fold vectors into a robustness score and a verdict
    fn score(vectors: &[AttackVector]) -> (f64, Recommendation) {
        let risk: f64 = vectors
            .iter()
            .map(|v| v.severity.risk_weight() * v.probability)
            .sum();
        let score = (100.0 - 100.0 * risk).clamp(0.0, 100.0);

        let recommendation = if score >= 70.0 {
            Recommendation::Proceed
        } else if score >= 40.0 {
            Recommendation::Modify
        } else {
            Recommendation::Abort
        };
        (score, recommendation)
    }
}

#[async_trait]
impl OracleChallenger for SimulatedChallenger {
    async fn challenge(
        &self,
        _prompt: &str,
        view: &BundleView,
    ) -> Result<ChallengeResponse, ChallengerError> {
        let attack_vectors = Self::attack_vectors(view);
        let vulnerabilities = Self::vulnerabilities(view);
        let (overall_score, recommendation) = Self::score(&attack_vectors);

        Ok(ChallengeResponse { attack_vectors, vulnerabilities, overall_score, recommendation })
    }
}

fn scale(value: Value, factor: f64) -> Value {
    (value as f64 * factor).max(0.0) as Value
}

/// The response substituted when the challenger exceeds its budget:
/// every plausible vector at critical severity, recommendation abort.
pub fn pessimistic_response(view: &BundleView) -> ChallengeResponse {
    let attack_vectors = AttackKind::fuzzable()
        .iter()
        .map(|&kind| AttackVector {
            kind,
            severity: AttackSeverity::Critical,
            probability: 1.0,
            estimated_loss: view.value,
            counter_measure: None,
        })
        .collect();

    ChallengeResponse {
        attack_vectors,
        vulnerabilities: vec![Vulnerability {
            category: "challenger-timeout".to_string(),
            exploitability: 1.0,
            impact: 1.0,
        }],
        overall_score: 0.0,
        recommendation: Recommendation::Abort,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BundleId, ScoutId, UNIT};

    fn view(kind: BundleKind, mev_risk: f64, slippage_risk: f64, tx_count: usize, gas: u64) -> BundleView {
        BundleView {
            bundle_id: BundleId::new("b1"),
            scout_id: ScoutId::new("s1"),
            kind,
            value: 10 * UNIT,
            gas_estimate: gas,
            tx_count,
            profit_fraction: 1.2,
            mev_risk,
            slippage_risk,
        }
    }

    #[tokio::test]
    async fn test_low_risk_swap_proceeds() {
        let view = view(BundleKind::Liquidation, 0.1, 0.1, 1, 100_000);
        let response = SimulatedChallenger.challenge("", &view).await.unwrap();

        assert!(response.attack_vectors.is_empty());
        assert_eq!(response.overall_score, 100.0);
        assert_eq!(response.recommendation, Recommendation::Proceed);
    }

    #[tokio::test]
    async fn test_high_mev_risk_emits_critical_sandwich() {
        let view = view(BundleKind::Liquidation, 0.7, 0.0, 1, 100_000);
        let response = SimulatedChallenger.challenge("", &view).await.unwrap();

        let sandwich = &response.attack_vectors[0];
        assert_eq!(sandwich.kind, AttackKind::Sandwich);
        assert_eq!(sandwich.severity, AttackSeverity::Critical);
        assert!((sandwich.probability - 0.7).abs() < 1e-9);
        assert_eq!(sandwich.counter_measure.as_deref(), Some("private-mempool"));

        // risk = 0.6 * 0.7 = 0.42 -> score 58 -> modify
        assert!((response.overall_score - 58.0).abs() < 1e-9);
        assert_eq!(response.recommendation, Recommendation::Modify);
    }

    #[tokio::test]
    async fn test_moderate_mev_risk_is_high_severity() {
        let view = view(BundleKind::Liquidation, 0.5, 0.0, 1, 100_000);
        let response = SimulatedChallenger.challenge("", &view).await.unwrap();
        assert_eq!(response.attack_vectors[0].severity, AttackSeverity::High);
    }

    #[tokio::test]
    async fn test_arbitrage_always_draws_backrun() {
        let view = view(BundleKind::Arbitrage, 0.0, 0.0, 1, 100_000);
        let response = SimulatedChallenger.challenge("", &view).await.unwrap();

        assert_eq!(response.attack_vectors.len(), 1);
        let backrun = &response.attack_vectors[0];
        assert_eq!(backrun.kind, AttackKind::Backrun);
        assert_eq!(backrun.severity, AttackSeverity::Low);
        assert!((backrun.probability - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_slippage_and_gas_vectors() {
        let view = view(BundleKind::Liquidation, 0.0, 0.5, 1, 600_000);
        let response = SimulatedChallenger.challenge("", &view).await.unwrap();

        let kinds: Vec<AttackKind> = response.attack_vectors.iter().map(|v| v.kind).collect();
        assert_eq!(kinds, vec![AttackKind::Frontrun, AttackKind::GasWar]);
        assert!((response.attack_vectors[0].probability - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_many_tx_flags_timing_vulnerability() {
        let view = view(BundleKind::Liquidation, 0.0, 0.0, 3, 100_000);
        let response = SimulatedChallenger.challenge("", &view).await.unwrap();

        assert_eq!(response.vulnerabilities.len(), 1);
        let vuln = &response.vulnerabilities[0];
        assert_eq!(vuln.category, "timing");
        assert!((vuln.exploitability - 0.4).abs() < 1e-9);
        assert!((vuln.impact - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_pessimistic_response_aborts() {
        let view = view(BundleKind::Arbitrage, 0.0, 0.0, 1, 100_000);
        let response = pessimistic_response(&view);

        assert_eq!(response.overall_score, 0.0);
        assert_eq!(response.recommendation, Recommendation::Abort);
        assert!(response
            .attack_vectors
            .iter()
            .all(|v| v.severity == AttackSeverity::Critical && v.probability == 1.0));
    }
}
