// Adversarial Sparring - gates high-profit bundles through an external
// "break this bundle" challenge with a hard counter-response deadline
//
// Any bundle whose net profit fraction reaches the configured threshold
// must survive a challenge before execution: the oracle proposes attack
// vectors, and an in-deadline counter response decides proceed/retry/abort.
// A missed deadline always aborts; a challenger that exceeds its own budget
// is replaced by the maximally-pessimistic response, never ignored.

pub mod challenger;

use crate::clock::Clock;
use crate::config::SparringConfig;
use crate::events::{EventSink, NegotiationEvent};
use crate::types::{
    BundleView, Challenge, ChallengeId, ChallengeResponse, Counter, CounterDecision,
    CounterId, CounterMeasure, Hash, TimestampMs, Value,
};
use challenger::{pessimistic_response, ChallengerError, OracleChallenger};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Counters with effectiveness at or above this count toward the counter rate
const EFFECTIVE_COUNTER: f64 = 0.7;

#[derive(Debug, thiserror::Error)]
pub enum SparringError {
    #[error("profit fraction {fraction:.2}% below challenge threshold {threshold:.2}%")]
    BelowThreshold { fraction: f64, threshold: f64 },

    #[error("{active} challenges already in flight (limit {max})")]
    TooManyConcurrent { active: usize, max: usize },

    #[error("challenger unavailable: {0}")]
    ChallengerUnavailable(String),

    #[error("unknown challenge {0}")]
    UnknownChallenge(ChallengeId),
}

/// One full challenge/counter exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparringSession {
    pub challenge: Challenge,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<Counter>,
}

/// Aggregated sparring counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SparringStats {
    pub challenges_issued: u64,
    pub challenger_timeouts: u64,
    pub counters_processed: u64,
    pub proceed_decisions: u64,
    pub retry_decisions: u64,
    pub abort_decisions: u64,
    pub deadline_misses: u64,
    pub total_response_ms: u64,

    /// Sum of estimated losses across all issued attack vectors
    #[serde(with = "crate::types::primitives::amount_serde")]
    pub total_estimated_loss: Value,
}

impl SparringStats {
    pub fn avg_response_ms(&self) -> f64 {
        if self.counters_processed == 0 {
            0.0
        } else {
            self.total_response_ms as f64 / self.counters_processed as f64
        }
    }
}

struct SparringState {
    active: HashMap<ChallengeId, Challenge>,

    /// Slots reserved for challenges still waiting on the oracle
    in_flight: usize,

    sessions: Vec<SparringSession>,
    stats: SparringStats,
}

pub struct SparringEngine {
    config: SparringConfig,
    challenger: Arc<dyn OracleChallenger>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    state: RwLock<SparringState>,
    sequence: AtomicU64,
}

impl SparringEngine {
    pub fn new(
        config: SparringConfig,
        challenger: Arc<dyn OracleChallenger>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            challenger,
            clock,
            events,
            state: RwLock::new(SparringState {
                active: HashMap::new(),
                in_flight: 0,
                sessions: Vec::new(),
                stats: SparringStats::default(),
            }),
            sequence: AtomicU64::new(0),
        }
    }

    /// Whether this bundle's profit obliges a challenge
    pub fn should_challenge(&self, view: &BundleView) -> bool {
        view.profit_fraction >= self.config.profit_threshold
    }

    /// Issue a break-this-bundle challenge for a high-profit bundle.
    ///
    /// The oracle call is bounded by `challenger_timeout_ms`; on expiry the
    /// challenge is recorded with the maximally-pessimistic response. The
    /// counter deadline starts when the challenge is recorded, not when the
    /// oracle is called.
    pub async fn challenge(&self, view: &BundleView) -> Result<Challenge, SparringError> {
        if !self.should_challenge(view) {
            return Err(SparringError::BelowThreshold {
                fraction: view.profit_fraction,
                threshold: self.config.profit_threshold,
            });
        }

        // Reserve a slot before suspending on the oracle
        {
            let mut state = self.state.write().await;
            let active = state.active.len() + state.in_flight;
            if active >= self.config.max_concurrent_challenges {
                return Err(SparringError::TooManyConcurrent {
                    active,
                    max: self.config.max_concurrent_challenges,
                });
            }
            state.in_flight += 1;
        }

        let prompt = build_prompt(view);
        let deadline = Duration::from_millis(self.config.challenger_timeout_ms);
        let response = match tokio::time::timeout(
            deadline,
            self.challenger.challenge(&prompt, view),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(ChallengerError::Unavailable(reason))) => {
                let mut state = self.state.write().await;
                state.in_flight -= 1;
                return Err(SparringError::ChallengerUnavailable(reason));
            }
            Err(_elapsed) => {
                warn!(
                    "⏰ Challenger exceeded {}ms for bundle {}; recording pessimistic response",
                    self.config.challenger_timeout_ms, view.bundle_id
                );
                let mut state = self.state.write().await;
                state.stats.challenger_timeouts += 1;
                drop(state);
                pessimistic_response(view)
            }
        };

        let challenge = self.record_challenge(view, prompt, response).await;
        Ok(challenge)
    }

    async fn record_challenge(
        &self,
        view: &BundleView,
        prompt: String,
        response: ChallengeResponse,
    ) -> Challenge {
        let issued_at: TimestampMs = self.clock.now_ms();
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);

        let mut id_data = Vec::new();
        id_data.extend_from_slice(view.bundle_id.as_str().as_bytes());
        id_data.extend_from_slice(&issued_at.to_le_bytes());
        id_data.extend_from_slice(&seq.to_le_bytes());
        let challenge_id = ChallengeId::from_hash(&Hash::hash(&id_data));

        let challenge = Challenge {
            challenge_id: challenge_id.clone(),
            bundle_id: view.bundle_id.clone(),
            issued_at,
            prompt,
            attack_vectors: response.attack_vectors,
            vulnerabilities: response.vulnerabilities,
            overall_score: response.overall_score,
            recommendation: response.recommendation,
        };

        let mut state = self.state.write().await;
        state.in_flight -= 1;
        state.stats.challenges_issued += 1;
        state.stats.total_estimated_loss = challenge
            .attack_vectors
            .iter()
            .fold(state.stats.total_estimated_loss, |acc, v| {
                acc.saturating_add(v.estimated_loss)
            });
        state.active.insert(challenge_id.clone(), challenge.clone());
        state.sessions.push(SparringSession { challenge: challenge.clone(), counter: None });

        info!(
            "⚔️ Challenge {} issued for {}: {} vectors, score {:.0}, {}",
            challenge_id,
            challenge.bundle_id,
            challenge.attack_vectors.len(),
            challenge.overall_score,
            challenge.recommendation
        );
        self.events.emit(NegotiationEvent::ChallengeIssued {
            challenge_id,
            bundle_id: challenge.bundle_id.clone(),
            attack_vector_count: challenge.attack_vectors.len(),
            overall_score: challenge.overall_score,
            recommendation: challenge.recommendation,
        });

        challenge
    }

    /// Evaluate the counter response to an active challenge.
    ///
    /// Decision rule, in order: a missed deadline aborts; countering at
    /// least 80% of the vectors with a score of 50+ proceeds; countering
    /// half of them, or supplying a modified bundle, retries; anything
    /// weaker aborts.
    pub async fn process_counter(
        &self,
        challenge_id: &ChallengeId,
        counter_measures: Vec<CounterMeasure>,
        modified_bundle: Option<BundleView>,
    ) -> Result<Counter, SparringError> {
        let now = self.clock.now_ms();
        let mut state = self.state.write().await;

        let challenge = state
            .active
            .remove(challenge_id)
            .ok_or_else(|| SparringError::UnknownChallenge(challenge_id.clone()))?;

        let response_time_ms = now.saturating_sub(challenge.issued_at);
        let within_deadline = response_time_ms <= self.config.deadline_ms;

        let vector_count = challenge.attack_vectors.len().max(1);
        let countered = counter_measures
            .iter()
            .filter(|c| c.effectiveness >= EFFECTIVE_COUNTER)
            .count();
        let counter_rate = countered as f64 / vector_count as f64;

        let decision = if !within_deadline {
            CounterDecision::Abort
        } else if counter_rate >= 0.8 && challenge.overall_score >= 50.0 {
            CounterDecision::Proceed
        } else if counter_rate >= 0.5 || modified_bundle.is_some() {
            CounterDecision::Retry
        } else {
            CounterDecision::Abort
        };

        let confidence = if within_deadline {
            let avg_effectiveness = if counter_measures.is_empty() {
                0.0
            } else {
                counter_measures.iter().map(|c| c.effectiveness).sum::<f64>()
                    / counter_measures.len() as f64
            };
            (0.5 * counter_rate + 0.5 * avg_effectiveness).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let mut id_data = Vec::new();
        id_data.extend_from_slice(challenge_id.as_str().as_bytes());
        id_data.extend_from_slice(&now.to_le_bytes());
        let counter = Counter {
            counter_id: CounterId::from_hash(&Hash::hash(&id_data)),
            challenge_id: challenge_id.clone(),
            response_time_ms,
            within_deadline,
            counter_measures,
            modified_bundle,
            decision,
            confidence,
        };

        state.stats.counters_processed += 1;
        state.stats.total_response_ms += response_time_ms;
        if !within_deadline {
            state.stats.deadline_misses += 1;
        }
        match decision {
            CounterDecision::Proceed => state.stats.proceed_decisions += 1,
            CounterDecision::Retry => state.stats.retry_decisions += 1,
            CounterDecision::Abort => state.stats.abort_decisions += 1,
        }

        if let Some(session) = state
            .sessions
            .iter_mut()
            .rev()
            .find(|s| &s.challenge.challenge_id == challenge_id)
        {
            session.counter = Some(counter.clone());
        }

        debug!(
            "🛡️ Counter for {} in {}ms (deadline {}ms): {}",
            challenge_id, response_time_ms, self.config.deadline_ms, decision
        );
        self.events.emit(NegotiationEvent::CounterProcessed {
            counter_id: counter.counter_id.clone(),
            challenge_id: challenge_id.clone(),
            response_time_ms,
            within_deadline,
            decision,
            confidence,
        });

        Ok(counter)
    }

    /// Generate and process a plausible counter for every vector.
    ///
    /// Test and offline aid: effectiveness is drawn from [0.6, 0.95] and a
    /// small internal delay stands in for real counter computation.
    pub async fn auto_counter(&self, challenge: &Challenge) -> Result<Counter, SparringError> {
        let (delay_ms, measures) = {
            let mut rng = rand::thread_rng();
            let delay_ms: u64 = rng.gen_range(5..=25);
            let measures: Vec<CounterMeasure> = challenge
                .attack_vectors
                .iter()
                .map(|vector| CounterMeasure {
                    vector_kind: vector.kind,
                    method: vector
                        .counter_measure
                        .clone()
                        .unwrap_or_else(|| format!("generic-{}-defense", vector.kind)),
                    effectiveness: rng.gen_range(0.6..=0.95),
                    applied: true,
                })
                .collect();
            (delay_ms, measures)
        };

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        self.process_counter(&challenge.challenge_id, measures, None).await
    }

    pub async fn active_challenges(&self) -> usize {
        let state = self.state.read().await;
        state.active.len() + state.in_flight
    }

    pub async fn stats(&self) -> SparringStats {
        self.state.read().await.stats.clone()
    }

    /// Export the full session log as a JSON document.
    ///
    /// Large amounts are decimal strings throughout; the layout is stable
    /// for cross-language consumers.
    pub async fn export_sessions(&self) -> serde_json::Value {
        let state = self.state.read().await;
        serde_json::json!({
            "export_timestamp": chrono::Utc::now().to_rfc3339(),
            "config": self.config,
            "stats": state.stats,
            "sessions": state.sessions,
        })
    }
}

fn build_prompt(view: &BundleView) -> String {
    format!(
        "Break this bundle: kind={} value={} gas={} txs={} profit={:.2}% mev_risk={:.2} slippage_risk={:.2}. \
         List every attack vector that could extract value from it, with severity, \
         probability and estimated loss, and score its overall robustness.",
        view.kind,
        view.value,
        view.gas_estimate,
        view.tx_count,
        view.profit_fraction,
        view.mev_risk,
        view.slippage_risk,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::NullSink;
    use crate::types::{AttackKind, AttackSeverity, BundleId, BundleKind, ScoutId, UNIT};
    use async_trait::async_trait;

    fn view(profit_fraction: f64) -> BundleView {
        BundleView {
            bundle_id: BundleId::new("b1"),
            scout_id: ScoutId::new("s1"),
            kind: BundleKind::Arbitrage,
            value: 10 * UNIT,
            gas_estimate: 200_000,
            tx_count: 2,
            profit_fraction,
            mev_risk: 0.5,
            slippage_risk: 0.3,
        }
    }

    fn measures(count: usize, effectiveness: f64) -> Vec<CounterMeasure> {
        (0..count)
            .map(|_| CounterMeasure {
                vector_kind: AttackKind::Sandwich,
                method: "private-mempool".to_string(),
                effectiveness,
                applied: true,
            })
            .collect()
    }

    fn engine(clock: Arc<ManualClock>) -> SparringEngine {
        SparringEngine::new(
            SparringConfig::default(),
            Arc::new(challenger::SimulatedChallenger),
            clock,
            Arc::new(NullSink),
        )
    }

    #[tokio::test]
    async fn test_below_threshold_refused() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock);

        assert!(!engine.should_challenge(&view(0.5)));
        assert!(matches!(
            engine.challenge(&view(0.5)).await,
            Err(SparringError::BelowThreshold { .. })
        ));
    }

    #[tokio::test]
    async fn test_deadline_miss_aborts() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock.clone());

        let challenge = engine.challenge(&view(1.2)).await.unwrap();
        clock.advance(500);

        let counter = engine
            .process_counter(&challenge.challenge_id, measures(3, 0.9), None)
            .await
            .unwrap();

        assert_eq!(counter.response_time_ms, 500);
        assert!(!counter.within_deadline);
        assert_eq!(counter.decision, CounterDecision::Abort);
        assert_eq!(counter.confidence, 0.0);

        let stats = engine.stats().await;
        assert_eq!(stats.deadline_misses, 1);
        assert_eq!(stats.avg_response_ms(), 500.0);
    }

    #[tokio::test]
    async fn test_strong_counter_in_deadline_proceeds() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock.clone());

        let challenge = engine.challenge(&view(1.2)).await.unwrap();
        // SimulatedChallenger yields sandwich + frontrun + backrun, score >= 50
        assert_eq!(challenge.attack_vectors.len(), 3);
        assert!(challenge.overall_score >= 50.0);

        clock.advance(250);
        let counter = engine
            .process_counter(&challenge.challenge_id, measures(3, 0.9), None)
            .await
            .unwrap();

        assert!(counter.within_deadline);
        assert_eq!(counter.decision, CounterDecision::Proceed);
        assert!(counter.confidence > 0.8);
    }

    #[tokio::test]
    async fn test_partial_counter_retries() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock.clone());

        let challenge = engine.challenge(&view(1.2)).await.unwrap();
        clock.advance(100);

        // 2 of 3 vectors countered effectively: rate 0.66 -> retry
        let counter = engine
            .process_counter(&challenge.challenge_id, measures(2, 0.9), None)
            .await
            .unwrap();
        assert_eq!(counter.decision, CounterDecision::Retry);
    }

    #[tokio::test]
    async fn test_modified_bundle_rescues_weak_counter() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock.clone());

        let challenge = engine.challenge(&view(1.2)).await.unwrap();
        clock.advance(100);

        let counter = engine
            .process_counter(&challenge.challenge_id, vec![], Some(view(0.4)))
            .await
            .unwrap();
        assert_eq!(counter.decision, CounterDecision::Retry);
    }

    #[tokio::test]
    async fn test_weak_counter_aborts() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock.clone());

        let challenge = engine.challenge(&view(1.2)).await.unwrap();
        clock.advance(100);

        let counter = engine
            .process_counter(&challenge.challenge_id, measures(3, 0.4), None)
            .await
            .unwrap();
        assert_eq!(counter.decision, CounterDecision::Abort);
    }

    #[tokio::test]
    async fn test_unknown_challenge() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock);

        assert!(matches!(
            engine.process_counter(&ChallengeId::new("ghost"), vec![], None).await,
            Err(SparringError::UnknownChallenge(_))
        ));
    }

    #[tokio::test]
    async fn test_counter_consumes_challenge() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock.clone());

        let challenge = engine.challenge(&view(1.2)).await.unwrap();
        engine
            .process_counter(&challenge.challenge_id, measures(3, 0.9), None)
            .await
            .unwrap();

        assert!(matches!(
            engine.process_counter(&challenge.challenge_id, vec![], None).await,
            Err(SparringError::UnknownChallenge(_))
        ));
        assert_eq!(engine.active_challenges().await, 0);
    }

    #[tokio::test]
    async fn test_concurrency_cap() {
        let clock = Arc::new(ManualClock::new(0));
        let config = SparringConfig { max_concurrent_challenges: 2, ..SparringConfig::default() };
        let engine = SparringEngine::new(
            config,
            Arc::new(challenger::SimulatedChallenger),
            clock,
            Arc::new(NullSink),
        );

        let mut ids = Vec::new();
        for _ in 0..2 {
            ids.push(engine.challenge(&view(1.2)).await.unwrap().challenge_id);
        }
        assert!(matches!(
            engine.challenge(&view(1.2)).await,
            Err(SparringError::TooManyConcurrent { active: 2, max: 2 })
        ));

        // Resolving one frees a slot
        engine.process_counter(&ids[0], measures(3, 0.9), None).await.unwrap();
        assert!(engine.challenge(&view(1.2)).await.is_ok());
    }

    struct HangingChallenger;

    #[async_trait]
    impl OracleChallenger for HangingChallenger {
        async fn challenge(
            &self,
            _prompt: &str,
            _view: &BundleView,
        ) -> Result<ChallengeResponse, ChallengerError> {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            unreachable!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_challenger_timeout_degrades_to_pessimistic() {
        let clock = Arc::new(ManualClock::new(0));
        let config = SparringConfig { challenger_timeout_ms: 50, ..SparringConfig::default() };
        let engine = SparringEngine::new(
            config,
            Arc::new(HangingChallenger),
            clock,
            Arc::new(NullSink),
        );

        let challenge = engine.challenge(&view(1.2)).await.unwrap();
        assert_eq!(challenge.overall_score, 0.0);
        assert_eq!(challenge.recommendation, crate::types::Recommendation::Abort);
        assert!(challenge
            .attack_vectors
            .iter()
            .all(|v| v.severity == AttackSeverity::Critical));
        assert_eq!(engine.stats().await.challenger_timeouts, 1);
    }

    struct DownChallenger;

    #[async_trait]
    impl OracleChallenger for DownChallenger {
        async fn challenge(
            &self,
            _prompt: &str,
            _view: &BundleView,
        ) -> Result<ChallengeResponse, ChallengerError> {
            Err(ChallengerError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_unavailable_challenger_releases_slot() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = SparringEngine::new(
            SparringConfig::default(),
            Arc::new(DownChallenger),
            clock,
            Arc::new(NullSink),
        );

        assert!(matches!(
            engine.challenge(&view(1.2)).await,
            Err(SparringError::ChallengerUnavailable(_))
        ));
        assert_eq!(engine.active_challenges().await, 0);
    }

    #[tokio::test]
    async fn test_auto_counter_covers_every_vector() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock);

        let challenge = engine.challenge(&view(1.2)).await.unwrap();
        let counter = engine.auto_counter(&challenge).await.unwrap();

        assert_eq!(counter.counter_measures.len(), challenge.attack_vectors.len());
        assert!(counter
            .counter_measures
            .iter()
            .all(|m| (0.6..=0.95).contains(&m.effectiveness) && m.applied));
    }

    #[tokio::test]
    async fn test_export_sessions_layout() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock.clone());

        let challenge = engine.challenge(&view(1.2)).await.unwrap();
        clock.advance(100);
        engine
            .process_counter(&challenge.challenge_id, measures(3, 0.9), None)
            .await
            .unwrap();

        let export = engine.export_sessions().await;
        assert!(export["export_timestamp"].is_string());
        assert_eq!(export["stats"]["challenges_issued"], 1);
        assert_eq!(export["sessions"].as_array().unwrap().len(), 1);

        // Amounts export as decimal strings
        let loss = &export["sessions"][0]["challenge"]["attack_vectors"][0]["estimated_loss"];
        assert!(loss.is_string());
        assert!(export["stats"]["total_estimated_loss"].is_string());
    }

    #[tokio::test]
    async fn test_deadline_boundary_is_inclusive() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock.clone());

        let challenge = engine.challenge(&view(1.2)).await.unwrap();
        clock.advance(400);

        let counter = engine
            .process_counter(&challenge.challenge_id, measures(3, 0.9), None)
            .await
            .unwrap();
        assert!(counter.within_deadline);
        assert_ne!(counter.decision, CounterDecision::Abort);
    }

    #[tokio::test]
    async fn test_zero_vector_challenge_counters_trivially() {
        // A challenge with no vectors: counter rate divides by one, not zero
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock.clone());

        let quiet = BundleView {
            kind: BundleKind::Liquidation,
            mev_risk: 0.0,
            slippage_risk: 0.0,
            ..view(1.2)
        };
        let challenge = engine.challenge(&quiet).await.unwrap();
        assert!(challenge.attack_vectors.is_empty());

        clock.advance(10);
        let counter = engine
            .process_counter(&challenge.challenge_id, vec![], None)
            .await
            .unwrap();
        // rate 0/1 = 0, no modified bundle -> abort
        assert_eq!(counter.decision, CounterDecision::Abort);
    }
}
