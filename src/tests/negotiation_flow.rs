// End-to-end negotiation rounds: accept -> reveal -> negotiate -> distribute

use crate::clock::{Clock, ManualClock};
use crate::config::NegotiationConfig;
use crate::crypto;
use crate::events::{ChannelSink, NegotiationEvent};
use crate::negotiation::negotiator::{NegotiationError, Negotiator};
use crate::registry::ScoutRegistry;
use crate::types::{
    ArbitrageOpportunity, BundleId, BundleKind, Scout, ScoutId, SealedBundle, Value,
};
use ed25519_dalek::SigningKey;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

struct Harness {
    negotiator: Negotiator,
    clock: Arc<ManualClock>,
    keys: HashMap<ScoutId, SigningKey>,
    events: mpsc::UnboundedReceiver<NegotiationEvent>,
}

fn harness(config: NegotiationConfig, scouts: &[(&str, f64)]) -> Harness {
    super::init_tracing();
    let registry = Arc::new(ScoutRegistry::new());
    let clock = Arc::new(ManualClock::new(1_000));
    let (sink, events) = ChannelSink::new();
    let mut keys = HashMap::new();

    for (name, reputation) in scouts {
        let key = crypto::generate_keypair();
        let id = ScoutId::new(*name);
        let mut scout = Scout::new(id.clone(), key.verifying_key().to_bytes(), 1_000)
            .with_payout_address(format!("0x{}", name));
        scout.reputation = *reputation;
        registry.register(scout);
        keys.insert(id, key);
    }

    let negotiator = Negotiator::new(config, registry, clock.clone(), Arc::new(sink));
    Harness { negotiator, clock, keys, events }
}

struct BundleSpec<'a> {
    id: &'a str,
    scout: &'a str,
    value: Value,
    tokens: &'a [&'a str],
    pools: &'a [&'a str],
}

fn submit_and_reveal(harness: &Harness, spec: &BundleSpec<'_>) {
    let payloads = vec![format!("payload-{}", spec.id).into_bytes()];
    let now = harness.clock.now_ms();
    let sealed = SealedBundle {
        bundle_id: BundleId::new(spec.id),
        scout_id: ScoutId::new(spec.scout),
        kind: BundleKind::Arbitrage,
        commit_hash: crypto::fingerprint(&payloads),
        promised_value: spec.value,
        tx_ids: vec![format!("tx-{}", spec.id)],
        gas_estimate: 150_000,
        created_at: now,
        expires_at: now + 30_000,
    };

    harness.negotiator.accept_sealed(sealed.clone()).unwrap();

    let signature = crypto::sign_reveal(&harness.keys[&sealed.scout_id], &sealed.commit_hash);
    let opportunity = ArbitrageOpportunity {
        tokens: spec.tokens.iter().map(|s| s.to_string()).collect(),
        pools: spec.pools.iter().map(|s| s.to_string()).collect(),
        expected_profit: spec.value / 100,
    };
    harness
        .negotiator
        .reveal(&sealed.bundle_id, payloads, signature, Some(opportunity))
        .unwrap();
}

#[test]
fn two_bundle_no_conflict_coalition() {
    let harness = harness(NegotiationConfig::default(), &[("A", 0.9), ("B", 0.9)]);

    submit_and_reveal(
        &harness,
        &BundleSpec { id: "bundle-a", scout: "A", value: 100, tokens: &["T1"], pools: &["P1"] },
    );
    submit_and_reveal(
        &harness,
        &BundleSpec { id: "bundle-b", scout: "B", value: 40, tokens: &["T2"], pools: &["P2"] },
    );

    let result = harness.negotiator.negotiate().unwrap();
    assert!(result.success);

    let block = result.block.unwrap();
    assert_eq!(block.coalition.size(), 2);
    assert_eq!(block.coalition.value, 140);
    assert!(block.coalition.stable);
    assert!(result.rejected_bundle_ids.is_empty());

    // Additive v: Shapley equals each scout's promised value
    assert!((block.shapley_values[&ScoutId::new("A")] - 100.0).abs() < 1e-9);
    assert!((block.shapley_values[&ScoutId::new("B")] - 40.0).abs() < 1e-9);

    let dist = result.distribution.unwrap();
    assert!((dist.operator_fee - 7.0).abs() < 1e-6);

    let share_a = dist.shares.iter().find(|s| s.scout_id == ScoutId::new("A")).unwrap();
    let share_b = dist.shares.iter().find(|s| s.scout_id == ScoutId::new("B")).unwrap();

    // Base proportional to Shapley over the 133 remainder
    assert!((share_a.base - 95.0).abs() < 1e-9);
    assert!((share_b.base - 38.0).abs() < 1e-9);

    // Only the smaller contributor draws a bonus
    assert_eq!(share_a.bonus, 0.0);
    assert!(share_b.bonus > 0.0);
    assert_eq!(share_a.payout_address.as_deref(), Some("0xA"));

    let paid: f64 = dist.shares.iter().map(|s| s.total).sum();
    assert!(paid + dist.operator_fee <= 140.0 + 1e-6);
    assert!(dist.is_conserving());
}

#[test]
fn token_overlap_excludes_weaker_bundle() {
    let harness = harness(NegotiationConfig::default(), &[("A", 0.9), ("B", 0.9)]);

    submit_and_reveal(
        &harness,
        &BundleSpec { id: "bundle-a", scout: "A", value: 100, tokens: &["T1", "T2"], pools: &[] },
    );
    submit_and_reveal(
        &harness,
        &BundleSpec { id: "bundle-b", scout: "B", value: 40, tokens: &["T2", "T3"], pools: &[] },
    );

    let result = harness.negotiator.negotiate().unwrap();
    assert!(result.success);

    let block = result.block.unwrap();
    assert_eq!(block.coalition.size(), 1);
    assert_eq!(block.coalition.value, 100);
    assert_eq!(result.rejected_bundle_ids, vec![BundleId::new("bundle-b")]);
}

#[test]
fn token_overlap_tolerated_when_allowed() {
    let config = NegotiationConfig { allow_token_overlap: true, ..NegotiationConfig::default() };
    let harness = harness(config, &[("A", 0.9), ("B", 0.9)]);

    submit_and_reveal(
        &harness,
        &BundleSpec { id: "bundle-a", scout: "A", value: 100, tokens: &["T1", "T2"], pools: &[] },
    );
    submit_and_reveal(
        &harness,
        &BundleSpec { id: "bundle-b", scout: "B", value: 40, tokens: &["T2", "T3"], pools: &[] },
    );

    let result = harness.negotiator.negotiate().unwrap();
    assert_eq!(result.block.unwrap().coalition.value, 140);
}

#[test]
fn reveal_mismatch_keeps_bundle_pending() {
    let harness = harness(NegotiationConfig::default(), &[("A", 0.9)]);

    let p1 = b"p1".to_vec();
    let p2 = b"p2".to_vec();
    let commit = crypto::fingerprint(&[p1.clone(), p2.clone()]);
    let now = harness.clock.now_ms();
    let sealed = SealedBundle {
        bundle_id: BundleId::new("bundle-a"),
        scout_id: ScoutId::new("A"),
        kind: BundleKind::Arbitrage,
        commit_hash: commit,
        promised_value: 100,
        tx_ids: vec!["tx-1".to_string(), "tx-2".to_string()],
        gas_estimate: 150_000,
        created_at: now,
        expires_at: now + 30_000,
    };
    harness.negotiator.accept_sealed(sealed.clone()).unwrap();

    let signature = crypto::sign_reveal(&harness.keys[&sealed.scout_id], &commit);
    let tampered = vec![p1, b"p2-tampered".to_vec()];

    let err = harness
        .negotiator
        .reveal(&sealed.bundle_id, tampered, signature, None)
        .unwrap_err();
    assert!(matches!(err, NegotiationError::FingerprintMismatch(_)));
    assert_eq!(harness.negotiator.pending_count(), 1);
    assert_eq!(harness.negotiator.revealed_count(), 0);
}

#[test]
fn min_reputation_gates_submission() {
    let harness = harness(NegotiationConfig::default(), &[("A", 0.4)]);

    let payloads = vec![b"p".to_vec()];
    let now = harness.clock.now_ms();
    let sealed = SealedBundle {
        bundle_id: BundleId::new("bundle-a"),
        scout_id: ScoutId::new("A"),
        kind: BundleKind::Arbitrage,
        commit_hash: crypto::fingerprint(&payloads),
        promised_value: 100,
        tx_ids: vec!["tx-1".to_string()],
        gas_estimate: 150_000,
        created_at: now,
        expires_at: now + 30_000,
    };

    assert!(matches!(
        harness.negotiator.accept_sealed(sealed),
        Err(NegotiationError::InsufficientReputation { .. })
    ));
}

#[test]
fn rejection_set_covers_non_members() {
    // Three mutually-overlapping bundles: only the strongest survives, the
    // other two land in the rejection set
    let harness = harness(NegotiationConfig::default(), &[("A", 0.9), ("B", 0.9), ("C", 0.9)]);

    for (id, scout, value) in
        [("bundle-a", "A", 100u128), ("bundle-b", "B", 40), ("bundle-c", "C", 10)]
    {
        submit_and_reveal(
            &harness,
            &BundleSpec { id, scout, value, tokens: &["T1"], pools: &[] },
        );
    }

    let result = harness.negotiator.negotiate().unwrap();
    let block = result.block.unwrap();
    assert_eq!(block.coalition.value, 100);

    let mut rejected = result.rejected_bundle_ids.clone();
    rejected.sort();
    assert_eq!(rejected, vec![BundleId::new("bundle-b"), BundleId::new("bundle-c")]);
}

#[test]
fn rejected_bundles_may_resubmit() {
    let harness = harness(NegotiationConfig::default(), &[("A", 0.9), ("B", 0.9)]);

    submit_and_reveal(
        &harness,
        &BundleSpec { id: "bundle-a", scout: "A", value: 100, tokens: &["T1"], pools: &[] },
    );
    submit_and_reveal(
        &harness,
        &BundleSpec { id: "bundle-b", scout: "B", value: 40, tokens: &["T1"], pools: &[] },
    );

    let first = harness.negotiator.negotiate().unwrap();
    assert_eq!(first.rejected_bundle_ids, vec![BundleId::new("bundle-b")]);

    // Same id comes back and wins its own round
    submit_and_reveal(
        &harness,
        &BundleSpec { id: "bundle-b", scout: "B", value: 40, tokens: &["T1"], pools: &[] },
    );
    let second = harness.negotiator.negotiate().unwrap();
    assert!(second.success);
    assert_eq!(second.block.unwrap().coalition.value, 40);
}

#[test]
fn expiration_sweep_is_total() {
    let harness = harness(NegotiationConfig::default(), &[("A", 0.9)]);

    for i in 0..5 {
        let payloads = vec![format!("p{}", i).into_bytes()];
        let now = harness.clock.now_ms();
        let sealed = SealedBundle {
            bundle_id: BundleId::new(format!("bundle-{}", i)),
            scout_id: ScoutId::new("A"),
            kind: BundleKind::Backrun,
            commit_hash: crypto::fingerprint(&payloads),
            promised_value: 10,
            tx_ids: vec![format!("tx-{}", i)],
            gas_estimate: 90_000,
            created_at: now,
            expires_at: now + 10_000 + i * 1_000,
        };
        harness.negotiator.accept_sealed(sealed).unwrap();
    }

    // Sweep at a point that catches the first three deadlines
    let expired = harness.negotiator.expire_tick(13_001);
    assert_eq!(expired.len(), 3);
    assert_eq!(harness.negotiator.pending_count(), 2);

    // A later sweep leaves nothing behind its cutoff
    harness.negotiator.expire_tick(60_000);
    assert_eq!(harness.negotiator.pending_count(), 0);
}

#[test]
fn round_emits_lifecycle_events() {
    let mut harness = harness(NegotiationConfig::default(), &[("A", 0.9)]);

    submit_and_reveal(
        &harness,
        &BundleSpec { id: "bundle-a", scout: "A", value: 100, tokens: &["T1"], pools: &[] },
    );
    harness.negotiator.negotiate().unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = harness.events.try_recv() {
        kinds.push(match event {
            NegotiationEvent::BundleSealedAccepted { .. } => "accepted",
            NegotiationEvent::BundleRevealed { .. } => "revealed",
            NegotiationEvent::NegotiationCompleted { .. } => "completed",
            _ => "other",
        });
    }
    assert_eq!(kinds, vec!["accepted", "revealed", "completed"]);
}

#[test]
fn pool_cap_defers_overflow_to_next_round() {
    let config = NegotiationConfig { max_bundles_per_block: 2, ..NegotiationConfig::default() };
    let harness = harness(config, &[("A", 0.9)]);

    for i in 0..3 {
        submit_and_reveal(
            &harness,
            &BundleSpec {
                id: &format!("bundle-{}", i),
                scout: "A",
                value: 10 + i as Value,
                tokens: &[],
                pools: &[],
            },
        );
    }

    let first = harness.negotiator.negotiate().unwrap();
    assert_eq!(first.block.unwrap().coalition.size(), 2);
    // The overflow bundle was not part of this round's inputs
    assert!(first.rejected_bundle_ids.is_empty());
    assert_eq!(harness.negotiator.revealed_count(), 1);

    let second = harness.negotiator.negotiate().unwrap();
    assert_eq!(second.block.unwrap().coalition.size(), 1);
}
