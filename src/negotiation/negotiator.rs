// Negotiator Orchestrator - drives the accept -> reveal -> negotiate ->
// distribute lifecycle
//
// Bundle state machine:
//   Pending -> Revealed -> Committed-in-block | Rejected-this-round
//   Pending -> Expired (automatic on expire_tick)
// Committed is terminal; a rejected bundle may be resubmitted. Failed
// validation never mutates state: a bad reveal leaves the bundle pending.
//
// Pools are exclusively owned here. A negotiation round runs in a single
// critical section over a consistent snapshot of the revealed pool; reveals
// arriving during a round land in the next one.

use crate::clock::Clock;
use crate::config::NegotiationConfig;
use crate::crypto;
use crate::events::{EventSink, NegotiationEvent};
use crate::negotiation::coalition::{
    AdditiveValue, CharacteristicFn, CoalitionEngine, CoalitionError, CoalitionOutcome,
};
use crate::negotiation::conflict::ConflictDetector;
use crate::negotiation::distribution::{DistributionError, ProfitDistributor};
use crate::registry::{scoring, ScoutRegistry};
use crate::types::{
    ArbitrageOpportunity, BundleId, Hash, NegotiatedBlock, ProfitDistribution, RevealedBundle,
    ScoutId, SealedBundle, TimestampMs,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    #[error("unknown scout {0}")]
    UnknownScout(ScoutId),

    #[error("scout {0} is deactivated")]
    InactiveScout(ScoutId),

    #[error("scout {scout_id} reputation {reputation:.2} below minimum {minimum:.2}")]
    InsufficientReputation { scout_id: ScoutId, reputation: f64, minimum: f64 },

    #[error("bundle {0} is expired or malformed")]
    BundleExpired(BundleId),

    #[error("duplicate bundle id {0}")]
    DuplicateBundle(BundleId),

    #[error("bundle {0} is not pending")]
    NotPending(BundleId),

    #[error("revealed payloads do not match the commitment of bundle {0}")]
    FingerprintMismatch(BundleId),

    #[error("reveal signature invalid for bundle {0}")]
    SignatureInvalid(BundleId),

    #[error(transparent)]
    Coalition(#[from] CoalitionError),

    #[error(transparent)]
    Distribution(#[from] DistributionError),
}

/// Outcome of one negotiation round
#[derive(Debug, Clone)]
pub struct NegotiationResult {
    pub success: bool,

    /// The assembled block, present iff `success`
    pub block: Option<NegotiatedBlock>,

    pub distribution: Option<ProfitDistribution>,

    /// Bundles revealed this round but left out of the winning coalition
    pub rejected_bundle_ids: Vec<BundleId>,

    pub coalitions_considered: u64,

    pub exec_time_ms: u64,
}

impl NegotiationResult {
    fn empty() -> Self {
        Self {
            success: false,
            block: None,
            distribution: None,
            rejected_bundle_ids: Vec::new(),
            coalitions_considered: 0,
            exec_time_ms: 0,
        }
    }
}

struct Pools {
    pending: HashMap<BundleId, SealedBundle>,

    /// FIFO by reveal order; order feeds deterministic tie-breaking
    revealed: Vec<RevealedBundle>,

    /// Terminal ids; duplicates are refused forever
    committed: HashSet<BundleId>,

    /// Bundles that already cost their scout a reveal-failure penalty;
    /// a bundle influences reputation at most once
    penalized: HashSet<BundleId>,

    rounds_completed: u64,
}

pub struct Negotiator {
    config: NegotiationConfig,
    registry: Arc<ScoutRegistry>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    detector: ConflictDetector,
    engine: CoalitionEngine,
    distributor: ProfitDistributor,
    characteristic: Box<dyn CharacteristicFn>,
    pools: RwLock<Pools>,
}

impl Negotiator {
    pub fn new(
        config: NegotiationConfig,
        registry: Arc<ScoutRegistry>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let detector = ConflictDetector::new(&config);
        let engine = CoalitionEngine::new(config.max_bundles_per_block, config.max_conflict_severity);
        let distributor = ProfitDistributor::new(&config);

        Self {
            config,
            registry,
            clock,
            events,
            detector,
            engine,
            distributor,
            characteristic: Box::new(AdditiveValue),
            pools: RwLock::new(Pools {
                pending: HashMap::new(),
                revealed: Vec::new(),
                committed: HashSet::new(),
                penalized: HashSet::new(),
                rounds_completed: 0,
            }),
        }
    }

    /// Override the characteristic function driving coalition selection
    pub fn with_characteristic(mut self, v: Box<dyn CharacteristicFn>) -> Self {
        self.characteristic = v;
        self
    }

    /// Accept a sealed bundle into the pending pool.
    ///
    /// Admission requires a known, active scout at or above the reputation
    /// floor, an unexpired well-formed bundle, and a fresh bundle id. The
    /// stored expiry is capped at the configured bundle lifetime.
    pub fn accept_sealed(&self, mut bundle: SealedBundle) -> Result<(), NegotiationError> {
        let scout = self
            .registry
            .get(&bundle.scout_id)
            .ok_or_else(|| NegotiationError::UnknownScout(bundle.scout_id.clone()))?;

        if !scout.active {
            return Err(NegotiationError::InactiveScout(bundle.scout_id.clone()));
        }
        if scout.reputation < self.config.min_reputation {
            return Err(NegotiationError::InsufficientReputation {
                scout_id: bundle.scout_id.clone(),
                reputation: scout.reputation,
                minimum: self.config.min_reputation,
            });
        }

        let now = self.clock.now_ms();
        if !bundle.is_well_formed() || bundle.is_expired(now) {
            return Err(NegotiationError::BundleExpired(bundle.bundle_id.clone()));
        }
        let max_expiry = now + self.config.bundle_expiration_secs * 1_000;
        bundle.expires_at = bundle.expires_at.min(max_expiry);

        let mut pools = self.pools.write().expect("bundle pools poisoned");
        if pools.pending.contains_key(&bundle.bundle_id)
            || pools.committed.contains(&bundle.bundle_id)
            || pools.revealed.iter().any(|r| r.bundle_id() == &bundle.bundle_id)
        {
            return Err(NegotiationError::DuplicateBundle(bundle.bundle_id.clone()));
        }

        debug!(
            "📥 Accepted sealed bundle {} from {} ({} promised)",
            bundle.bundle_id, bundle.scout_id, bundle.promised_value
        );
        self.events.emit(NegotiationEvent::BundleSealedAccepted {
            bundle_id: bundle.bundle_id.clone(),
            scout_id: bundle.scout_id.clone(),
            kind: bundle.kind,
            promised_value: bundle.promised_value,
            created_at: bundle.created_at,
            expires_at: bundle.expires_at,
        });

        let _ = self
            .registry
            .record_submission(&bundle.scout_id, bundle.promised_value, now);
        let _ = self
            .registry
            .update_reputation(&bundle.scout_id, scoring::adjustments::BUNDLE_ACCEPTED);

        pools.pending.insert(bundle.bundle_id.clone(), bundle);
        Ok(())
    }

    /// Reveal a pending bundle's payloads.
    ///
    /// Verification failure leaves the bundle pending; the scout may retry
    /// with the correct payloads before expiry, but the first failure costs
    /// the reveal-failure reputation penalty.
    pub fn reveal(
        &self,
        bundle_id: &BundleId,
        tx_payloads: Vec<Vec<u8>>,
        signature: [u8; 64],
        opportunity: Option<ArbitrageOpportunity>,
    ) -> Result<(), NegotiationError> {
        let mut pools = self.pools.write().expect("bundle pools poisoned");

        let (scout_id, commit_hash) = {
            let sealed = pools
                .pending
                .get(bundle_id)
                .ok_or_else(|| NegotiationError::NotPending(bundle_id.clone()))?;
            (sealed.scout_id.clone(), sealed.commit_hash)
        };

        if !crypto::verify_commit(&commit_hash, &tx_payloads) {
            warn!("❌ Fingerprint mismatch on reveal of {}", bundle_id);
            self.penalize_reveal_failure(&mut pools, bundle_id, &scout_id);
            return Err(NegotiationError::FingerprintMismatch(bundle_id.clone()));
        }

        let scout = self
            .registry
            .get(&scout_id)
            .ok_or_else(|| NegotiationError::UnknownScout(scout_id.clone()))?;
        if crypto::verify_reveal(&scout.public_key, &commit_hash, &signature).is_err() {
            warn!("❌ Bad reveal signature on {}", bundle_id);
            self.penalize_reveal_failure(&mut pools, bundle_id, &scout_id);
            return Err(NegotiationError::SignatureInvalid(bundle_id.clone()));
        }

        let sealed = pools
            .pending
            .remove(bundle_id)
            .ok_or_else(|| NegotiationError::NotPending(bundle_id.clone()))?;

        pools.penalized.remove(bundle_id);
        pools.revealed.push(RevealedBundle { sealed, tx_payloads, signature, opportunity });

        debug!("🔓 Bundle {} revealed by {}", bundle_id, scout_id);
        self.events.emit(NegotiationEvent::BundleRevealed {
            bundle_id: bundle_id.clone(),
            scout_id,
        });
        Ok(())
    }

    /// Sweep expired pending bundles. Returns the expired ids.
    pub fn expire_tick(&self, now: TimestampMs) -> Vec<BundleId> {
        let mut pools = self.pools.write().expect("bundle pools poisoned");

        let expired: Vec<(BundleId, ScoutId)> = pools
            .pending
            .values()
            .filter(|b| b.is_expired(now))
            .map(|b| (b.bundle_id.clone(), b.scout_id.clone()))
            .collect();

        for (bundle_id, scout_id) in &expired {
            pools.pending.remove(bundle_id);

            // A bundle already penalized for a failed reveal does not get
            // charged a second time on expiry
            if !pools.penalized.remove(bundle_id) {
                let _ = self
                    .registry
                    .update_reputation(scout_id, scoring::adjustments::BUNDLE_EXPIRED);
            }

            self.events.emit(NegotiationEvent::BundleExpired {
                bundle_id: bundle_id.clone(),
                reason: format!("not revealed before {}", now),
            });
        }

        if !expired.is_empty() {
            info!("⏱️ Expired {} pending bundles", expired.len());
        }
        expired.into_iter().map(|(bundle_id, _)| bundle_id).collect()
    }

    /// Run one negotiation round over a snapshot of the revealed pool.
    ///
    /// On success the winning bundles are consumed (terminal); the rest of
    /// the snapshot is rejected for this round and may be resubmitted. With
    /// nothing revealed, or no valid coalition, returns `success = false`
    /// without consuming anything.
    pub fn negotiate(&self) -> Result<NegotiationResult, NegotiationError> {
        let started = self.clock.now_ms();
        let mut pools = self.pools.write().expect("bundle pools poisoned");

        if pools.revealed.is_empty() {
            return Ok(NegotiationResult::empty());
        }

        // Round snapshot: the oldest reveals up to the block cap; anything
        // beyond the cap stays revealed for the next round.
        let take = pools.revealed.len().min(self.config.max_bundles_per_block);
        let snapshot: Vec<RevealedBundle> = pools.revealed.drain(..take).collect();

        let conflicts = self.detector.classify_all(&snapshot);
        let outcome = match self
            .engine
            .select(&snapshot, &conflicts, self.characteristic.as_ref())
        {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                // Unreachable with a non-empty snapshot; restore and bail
                pools.revealed.splice(0..0, snapshot);
                return Ok(NegotiationResult::empty());
            }
            Err(e) => {
                pools.revealed.splice(0..0, snapshot);
                return Err(e.into());
            }
        };

        let winner_ids: HashSet<&BundleId> =
            outcome.coalition.bundles.iter().map(|b| b.bundle_id()).collect();
        let rejected_bundle_ids: Vec<BundleId> = snapshot
            .iter()
            .map(|b| b.bundle_id())
            .filter(|id| !winner_ids.contains(*id))
            .cloned()
            .collect();

        let mut distribution = match self
            .distributor
            .distribute(&outcome.coalition, &outcome.coalition.marginal_contributions)
        {
            Ok(distribution) => distribution,
            Err(e) => {
                // Misconfigured allocation method; nothing is consumed
                pools.revealed.splice(0..0, snapshot);
                return Err(e.into());
            }
        };
        for share in &mut distribution.shares {
            share.payout_address =
                self.registry.get(&share.scout_id).and_then(|s| s.payout_address);
        }

        let now = self.clock.now_ms();
        let block = self.assemble_block(&outcome, now);

        // Bookkeeping integrity: a committed id must never reappear. The
        // insert doubles as the once-per-bundle guard for the commit reward.
        for bundle in &outcome.coalition.bundles {
            let fresh = pools.committed.insert(bundle.bundle_id().clone());
            assert!(fresh, "bundle {} committed twice", bundle.bundle_id());
            let _ = self.registry.record_success(bundle.scout_id(), now);
            let _ = self
                .registry
                .update_reputation(bundle.scout_id(), scoring::adjustments::BUNDLE_COMMITTED);
        }
        pools.rounds_completed += 1;

        let exec_time_ms = now.saturating_sub(started);
        info!(
            "🤝 Round {} complete: {} bundles, value {}, {} rejected, {}ms",
            pools.rounds_completed,
            outcome.coalition.size(),
            outcome.coalition.value,
            rejected_bundle_ids.len(),
            exec_time_ms
        );

        self.events.emit(NegotiationEvent::NegotiationCompleted {
            block_id: block.block_id,
            coalition_members: outcome.coalition.scouts.iter().cloned().collect(),
            total_value: outcome.coalition.value,
            shapley_values: block.shapley_values.clone(),
            rejected_bundle_ids: rejected_bundle_ids.clone(),
            exec_time_ms,
        });

        Ok(NegotiationResult {
            success: true,
            block: Some(block),
            distribution: Some(distribution),
            rejected_bundle_ids,
            coalitions_considered: outcome.coalitions_considered,
            exec_time_ms,
        })
    }

    fn assemble_block(&self, outcome: &CoalitionOutcome, now: TimestampMs) -> NegotiatedBlock {
        let coalition = &outcome.coalition;

        let tx_ids: Vec<String> = coalition
            .bundles
            .iter()
            .flat_map(|b| b.sealed.tx_ids.iter().cloned())
            .collect();
        let total_gas = coalition.bundles.iter().map(|b| b.sealed.gas_estimate).sum();

        let mut id_data = Vec::new();
        id_data.extend_from_slice(coalition.coalition_id.as_str().as_bytes());
        id_data.extend_from_slice(&now.to_le_bytes());

        NegotiatedBlock {
            block_id: Hash::hash(&id_data),
            coalition: coalition.clone(),
            tx_ids,
            total_gas,
            shapley_values: coalition.marginal_contributions.clone(),
            timestamp: now,
            signature: None,
            attestation: None,
        }
    }

    /// Charge the reveal-failure penalty on the bundle's first failure only
    fn penalize_reveal_failure(&self, pools: &mut Pools, bundle_id: &BundleId, scout_id: &ScoutId) {
        if pools.penalized.insert(bundle_id.clone()) {
            let _ = self
                .registry
                .update_reputation(scout_id, scoring::adjustments::REVEAL_FAILURE);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pools.read().expect("bundle pools poisoned").pending.len()
    }

    pub fn revealed_count(&self) -> usize {
        self.pools.read().expect("bundle pools poisoned").revealed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::NullSink;
    use crate::types::{BundleKind, Scout};
    use ed25519_dalek::SigningKey;

    struct Fixture {
        negotiator: Negotiator,
        clock: Arc<ManualClock>,
        keys: HashMap<ScoutId, SigningKey>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(ScoutRegistry::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let mut keys = HashMap::new();

        for name in ["s1", "s2"] {
            let key = crypto::generate_keypair();
            let id = ScoutId::new(name);
            let mut scout = Scout::new(id.clone(), key.verifying_key().to_bytes(), 1_000);
            scout.reputation = 0.9;
            registry.register(scout);
            keys.insert(id, key);
        }

        let negotiator = Negotiator::new(
            NegotiationConfig::default(),
            registry,
            clock.clone(),
            Arc::new(NullSink),
        );
        Fixture { negotiator, clock, keys }
    }

    fn sealed(fix: &Fixture, id: &str, scout: &str, payloads: &[&[u8]]) -> SealedBundle {
        let payloads: Vec<Vec<u8>> = payloads.iter().map(|p| p.to_vec()).collect();
        SealedBundle {
            bundle_id: BundleId::new(id),
            scout_id: ScoutId::new(scout),
            kind: BundleKind::Arbitrage,
            commit_hash: crypto::fingerprint(&payloads),
            promised_value: 100,
            tx_ids: (0..payloads.len()).map(|i| format!("tx-{}-{}", id, i)).collect(),
            gas_estimate: 100_000,
            created_at: fix.clock.now_ms(),
            expires_at: fix.clock.now_ms() + 30_000,
        }
    }

    fn reveal_ok(fix: &Fixture, bundle: &SealedBundle, payloads: &[&[u8]]) {
        let payloads: Vec<Vec<u8>> = payloads.iter().map(|p| p.to_vec()).collect();
        let key = &fix.keys[&bundle.scout_id];
        let sig = crypto::sign_reveal(key, &bundle.commit_hash);
        fix.negotiator
            .reveal(&bundle.bundle_id, payloads, sig, None)
            .unwrap();
    }

    #[test]
    fn test_accept_requires_known_scout() {
        let fix = fixture();
        let mut bundle = sealed(&fix, "b1", "s1", &[b"p1"]);
        bundle.scout_id = ScoutId::new("ghost");

        assert!(matches!(
            fix.negotiator.accept_sealed(bundle),
            Err(NegotiationError::UnknownScout(_))
        ));
    }

    #[test]
    fn test_accept_rejects_duplicates() {
        let fix = fixture();
        let bundle = sealed(&fix, "b1", "s1", &[b"p1"]);

        fix.negotiator.accept_sealed(bundle.clone()).unwrap();
        assert!(matches!(
            fix.negotiator.accept_sealed(bundle),
            Err(NegotiationError::DuplicateBundle(_))
        ));
    }

    #[test]
    fn test_accept_rejects_expired() {
        let fix = fixture();
        let bundle = sealed(&fix, "b1", "s1", &[b"p1"]);
        fix.clock.advance(60_000);

        assert!(matches!(
            fix.negotiator.accept_sealed(bundle),
            Err(NegotiationError::BundleExpired(_))
        ));
    }

    #[test]
    fn test_reveal_moves_to_revealed_pool() {
        let fix = fixture();
        let bundle = sealed(&fix, "b1", "s1", &[b"p1", b"p2"]);
        fix.negotiator.accept_sealed(bundle.clone()).unwrap();

        reveal_ok(&fix, &bundle, &[b"p1", b"p2"]);
        assert_eq!(fix.negotiator.pending_count(), 0);
        assert_eq!(fix.negotiator.revealed_count(), 1);
    }

    #[test]
    fn test_reveal_mismatch_keeps_bundle_pending() {
        let fix = fixture();
        let bundle = sealed(&fix, "b1", "s1", &[b"p1", b"p2"]);
        fix.negotiator.accept_sealed(bundle.clone()).unwrap();

        let key = &fix.keys[&bundle.scout_id];
        let sig = crypto::sign_reveal(key, &bundle.commit_hash);
        let wrong = vec![b"p1".to_vec(), b"p2-tampered".to_vec()];

        assert!(matches!(
            fix.negotiator.reveal(&bundle.bundle_id, wrong, sig, None),
            Err(NegotiationError::FingerprintMismatch(_))
        ));
        assert_eq!(fix.negotiator.pending_count(), 1);

        // The honest reveal still goes through afterwards
        reveal_ok(&fix, &bundle, &[b"p1", b"p2"]);
    }

    #[test]
    fn test_reveal_bad_signature() {
        let fix = fixture();
        let bundle = sealed(&fix, "b1", "s1", &[b"p1"]);
        fix.negotiator.accept_sealed(bundle.clone()).unwrap();

        // Signed with the wrong scout's key
        let sig = crypto::sign_reveal(&fix.keys[&ScoutId::new("s2")], &bundle.commit_hash);
        assert!(matches!(
            fix.negotiator.reveal(&bundle.bundle_id, vec![b"p1".to_vec()], sig, None),
            Err(NegotiationError::SignatureInvalid(_))
        ));
        assert_eq!(fix.negotiator.pending_count(), 1);
    }

    #[test]
    fn test_reveal_idempotence() {
        let fix = fixture();
        let bundle = sealed(&fix, "b1", "s1", &[b"p1"]);
        fix.negotiator.accept_sealed(bundle.clone()).unwrap();
        reveal_ok(&fix, &bundle, &[b"p1"]);

        let sig = crypto::sign_reveal(&fix.keys[&bundle.scout_id], &bundle.commit_hash);
        assert!(matches!(
            fix.negotiator.reveal(&bundle.bundle_id, vec![b"p1".to_vec()], sig, None),
            Err(NegotiationError::NotPending(_))
        ));
    }

    #[test]
    fn test_expiry_capped_at_configured_lifetime() {
        let fix = fixture();
        let mut bundle = sealed(&fix, "b1", "s1", &[b"p1"]);
        bundle.expires_at = fix.clock.now_ms() + 600_000;
        fix.negotiator.accept_sealed(bundle).unwrap();

        // Default lifetime is 30s; the oversized expiry does not survive it
        let expired = fix.negotiator.expire_tick(fix.clock.now_ms() + 30_001);
        assert_eq!(expired, vec![BundleId::new("b1")]);
    }

    #[test]
    fn test_expire_tick_monotonicity() {
        let fix = fixture();
        let bundle = sealed(&fix, "b1", "s1", &[b"p1"]);
        fix.negotiator.accept_sealed(bundle).unwrap();

        assert!(fix.negotiator.expire_tick(2_000).is_empty());

        let expired = fix.negotiator.expire_tick(31_000);
        assert_eq!(expired, vec![BundleId::new("b1")]);
        assert_eq!(fix.negotiator.pending_count(), 0);
    }

    #[test]
    fn test_negotiate_empty_pool() {
        let fix = fixture();
        let result = fix.negotiator.negotiate().unwrap();
        assert!(!result.success);
        assert!(result.rejected_bundle_ids.is_empty());
    }

    #[test]
    fn test_negotiate_consumes_winners() {
        let fix = fixture();
        for (id, scout) in [("b1", "s1"), ("b2", "s2")] {
            let bundle = sealed(&fix, id, scout, &[id.as_bytes()]);
            fix.negotiator.accept_sealed(bundle.clone()).unwrap();
            reveal_ok(&fix, &bundle, &[id.as_bytes()]);
        }

        let result = fix.negotiator.negotiate().unwrap();
        assert!(result.success);
        assert_eq!(result.block.as_ref().unwrap().coalition.size(), 2);
        assert_eq!(fix.negotiator.revealed_count(), 0);

        // Committed ids are terminal
        let again = sealed(&fix, "b1", "s1", &[b"fresh"]);
        assert!(matches!(
            fix.negotiator.accept_sealed(again),
            Err(NegotiationError::DuplicateBundle(_))
        ));
    }

    #[test]
    fn test_negotiate_updates_success_counters() {
        let fix = fixture();
        let bundle = sealed(&fix, "b1", "s1", &[b"p1"]);
        fix.negotiator.accept_sealed(bundle.clone()).unwrap();
        reveal_ok(&fix, &bundle, &[b"p1"]);
        fix.negotiator.negotiate().unwrap();

        let scout = fix.negotiator.registry.get(&ScoutId::new("s1")).unwrap();
        assert_eq!(scout.submitted, 1);
        assert_eq!(scout.successful, 1);

        // 0.9 at registration, +0.01 on accept, +0.05 on commit
        assert!((scout.reputation - 0.96).abs() < 1e-9);
    }

    #[test]
    fn test_reveal_failure_penalty_applied_once() {
        let fix = fixture();
        let bundle = sealed(&fix, "b1", "s1", &[b"p1"]);
        fix.negotiator.accept_sealed(bundle.clone()).unwrap();

        let sig = crypto::sign_reveal(&fix.keys[&bundle.scout_id], &bundle.commit_hash);
        for _ in 0..2 {
            let wrong = vec![b"tampered".to_vec()];
            assert!(fix
                .negotiator
                .reveal(&bundle.bundle_id, wrong, sig, None)
                .is_err());
        }

        // +0.01 on accept, -0.10 once; the retry does not charge again
        let scout = fix.negotiator.registry.get(&ScoutId::new("s1")).unwrap();
        assert!((scout.reputation - 0.81).abs() < 1e-9);

        // An honest reveal still goes through and clears the penalty marker
        reveal_ok(&fix, &bundle, &[b"p1"]);
    }

    #[test]
    fn test_expiry_penalty() {
        let fix = fixture();
        let bundle = sealed(&fix, "b1", "s1", &[b"p1"]);
        fix.negotiator.accept_sealed(bundle).unwrap();
        fix.negotiator.expire_tick(60_000);

        // +0.01 on accept, -0.02 on expiry
        let scout = fix.negotiator.registry.get(&ScoutId::new("s1")).unwrap();
        assert!((scout.reputation - 0.89).abs() < 1e-9);
    }

    #[test]
    fn test_failed_then_expired_bundle_charged_once() {
        let fix = fixture();
        let bundle = sealed(&fix, "b1", "s1", &[b"p1"]);
        fix.negotiator.accept_sealed(bundle.clone()).unwrap();

        let sig = crypto::sign_reveal(&fix.keys[&bundle.scout_id], &bundle.commit_hash);
        assert!(fix
            .negotiator
            .reveal(&bundle.bundle_id, vec![b"tampered".to_vec()], sig, None)
            .is_err());
        fix.negotiator.expire_tick(60_000);

        // The reveal failure already charged this bundle; expiry adds nothing
        let scout = fix.negotiator.registry.get(&ScoutId::new("s1")).unwrap();
        assert!((scout.reputation - 0.81).abs() < 1e-9);
    }
}
