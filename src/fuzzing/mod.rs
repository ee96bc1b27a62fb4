// Attack Fuzzer - drives the defense layer with a reproducible, seeded,
// concurrent stream of synthetic attack scenarios
//
// Scenarios are generated up front from the seeded stream, filtered by the
// severity whitelist, then dispatched in batches of `max_concurrent`.
// Within a batch results keep generation order; progress is emitted after
// each batch. A kind with no registered handler is an automatic bypass and
// a flagged vulnerability.

pub mod defense;
pub mod generator;

use crate::config::FuzzerConfig;
use crate::events::{EventSink, NegotiationEvent};
use crate::types::{AttackKind, AttackScenario, FuzzOutcome, FuzzResult, FuzzerStats, KindStats};
use defense::{classify_outcome, damage_avoided, damage_estimate, vulnerability_found, DefenseHandler};
use futures::future::join_all;
use generator::ScenarioGenerator;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub struct AttackFuzzer {
    config: FuzzerConfig,
    handlers: RwLock<HashMap<AttackKind, Arc<dyn DefenseHandler>>>,
    events: Arc<dyn EventSink>,
}

impl AttackFuzzer {
    pub fn new(config: FuzzerConfig, events: Arc<dyn EventSink>) -> Self {
        Self { config, handlers: RwLock::new(HashMap::new()), events }
    }

    /// Register the defense capability for one attack kind
    pub fn register_defense(&self, kind: AttackKind, handler: Arc<dyn DefenseHandler>) {
        debug!("🛡️ Defense registered for {}", kind);
        self.handlers
            .write()
            .expect("defense handler map poisoned")
            .insert(kind, handler);
    }

    /// Run one full fuzzing campaign and return aggregate statistics.
    ///
    /// Two runs with the same seed, config and deterministic handlers
    /// produce identical result lists.
    pub async fn run(&self) -> FuzzerStats {
        let kinds = self.config.active_kinds();
        let mut generator = ScenarioGenerator::new(self.config.random_seed);

        let scenarios: Vec<AttackScenario> = (0..self.config.scenarios_per_run)
            .map(|_| generator.generate(&kinds))
            .filter(|s| self.config.severity_filter.contains(&s.severity))
            .collect();

        let total = scenarios.len();
        let dropped = self.config.scenarios_per_run - total;
        if dropped > 0 {
            info!("🔬 Severity filter dropped {} of {} scenarios", dropped, self.config.scenarios_per_run);
        }
        info!(
            "🔬 Fuzzing {} scenarios across {} kinds (seed {})",
            total,
            kinds.len(),
            self.config.random_seed
        );

        // Snapshot the handler map; registrations during a run apply to
        // the next run
        let handlers = self
            .handlers
            .read()
            .expect("defense handler map poisoned")
            .clone();

        let mut stats = FuzzerStats::default();
        let mut completed = 0usize;

        for batch in scenarios.chunks(self.config.max_concurrent) {
            let futures = batch.iter().map(|scenario| self.run_scenario(scenario, &handlers));
            let results = join_all(futures).await;

            completed += results.len();
            for result in results {
                accumulate(&mut stats, result);
            }

            self.events.emit(NegotiationEvent::FuzzProgress {
                completed,
                total,
                vulnerabilities_so_far: stats.vulnerabilities,
            });
        }

        finalize(&mut stats);
        info!(
            "🏁 Fuzzing complete: {}/{} mitigated, {} bypassed, {} vulnerabilities",
            stats.mitigated, stats.total_scenarios, stats.bypassed, stats.vulnerabilities
        );
        self.events.emit(NegotiationEvent::FuzzCompleted { stats: Box::new(stats.clone()) });
        stats
    }

    async fn run_scenario(
        &self,
        scenario: &AttackScenario,
        handlers: &HashMap<AttackKind, Arc<dyn DefenseHandler>>,
    ) -> FuzzResult {
        let estimate = damage_estimate(scenario);

        let handler = match handlers.get(&scenario.kind) {
            Some(handler) => handler.clone(),
            None => {
                return FuzzResult {
                    scenario_id: scenario.scenario_id.clone(),
                    kind: scenario.kind,
                    severity: scenario.severity,
                    outcome: FuzzOutcome::Bypassed,
                    detection_time_ms: 0,
                    mitigation_applied: None,
                    damage_estimate: estimate,
                    damage_avoided: 0,
                    vulnerability_found: true,
                    detail: "no defense registered for this attack kind".to_string(),
                    recommendations: vec![format!("register a {} defense handler", scenario.kind)],
                };
            }
        };

        let budget = Duration::from_millis(self.config.scenario_timeout_ms);
        match timeout(budget, handler.handle(scenario)).await {
            Ok(response) => {
                let outcome = classify_outcome(response.detected, response.mitigated);
                let vulnerability = vulnerability_found(outcome, scenario.severity);
                let avoided = damage_avoided(outcome, estimate);

                let mut recommendations = Vec::new();
                if vulnerability {
                    recommendations.push(format!(
                        "harden the {} defense; {} severity attack got through",
                        scenario.kind, scenario.severity
                    ));
                }

                FuzzResult {
                    scenario_id: scenario.scenario_id.clone(),
                    kind: scenario.kind,
                    severity: scenario.severity,
                    outcome,
                    detection_time_ms: response.response_time_ms,
                    mitigation_applied: response.mitigation_method,
                    damage_estimate: estimate,
                    damage_avoided: avoided,
                    vulnerability_found: vulnerability,
                    detail: format!("detected={} mitigated={}", response.detected, response.mitigated),
                    recommendations,
                }
            }
            Err(_elapsed) => {
                warn!(
                    "⏰ Defense for {} timed out after {}ms",
                    scenario.kind, self.config.scenario_timeout_ms
                );
                FuzzResult {
                    scenario_id: scenario.scenario_id.clone(),
                    kind: scenario.kind,
                    severity: scenario.severity,
                    outcome: FuzzOutcome::Bypassed,
                    detection_time_ms: self.config.scenario_timeout_ms,
                    mitigation_applied: None,
                    damage_estimate: estimate,
                    damage_avoided: 0,
                    vulnerability_found: true,
                    detail: "defense timeout".to_string(),
                    recommendations: vec![format!(
                        "{} defense must answer within {}ms",
                        scenario.kind, self.config.scenario_timeout_ms
                    )],
                }
            }
        }
    }
}

fn accumulate(stats: &mut FuzzerStats, result: FuzzResult) {
    stats.total_scenarios += 1;
    let kind = stats.by_kind.entry(result.kind).or_insert_with(KindStats::default);
    kind.total += 1;

    match result.outcome {
        FuzzOutcome::Detected => {
            stats.detected += 1;
            kind.detected += 1;
        }
        FuzzOutcome::Mitigated => {
            stats.mitigated += 1;
            kind.mitigated += 1;
        }
        FuzzOutcome::Partial => {
            stats.partial += 1;
            kind.partial += 1;
        }
        FuzzOutcome::Bypassed => {
            stats.bypassed += 1;
            kind.bypassed += 1;
        }
    }

    if result.vulnerability_found {
        stats.vulnerabilities += 1;
    }
    stats.total_damage_avoided = stats.total_damage_avoided.saturating_add(result.damage_avoided);

    // Temporarily a running sum; finalize() divides it out
    stats.avg_detection_time_ms += result.detection_time_ms as f64;
    stats.results.push(result);
}

fn finalize(stats: &mut FuzzerStats) {
    if stats.total_scenarios > 0 {
        stats.avg_detection_time_ms /= stats.total_scenarios as f64;
    }
}
