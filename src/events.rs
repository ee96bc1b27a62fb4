// Event emission - the message-passing contract with downstream consumers
//
// Events are values, never references into engine state: a consumer can
// store or forward them without holding anything alive. Transport is the
// host's choice; the core only knows the EventSink port.

use crate::types::{
    BundleId, BundleKind, ChallengeId, CounterDecision, CounterId, FuzzerStats, Hash,
    Recommendation, ScoutId, TimestampMs, Value,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::debug;

/// Everything the core tells the outside world
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NegotiationEvent {
    BundleSealedAccepted {
        bundle_id: BundleId,
        scout_id: ScoutId,
        kind: BundleKind,
        #[serde(with = "crate::types::primitives::amount_serde")]
        promised_value: Value,
        created_at: TimestampMs,
        expires_at: TimestampMs,
    },

    BundleRevealed {
        bundle_id: BundleId,
        scout_id: ScoutId,
    },

    BundleExpired {
        bundle_id: BundleId,
        reason: String,
    },

    NegotiationCompleted {
        block_id: Hash,
        coalition_members: Vec<ScoutId>,
        #[serde(with = "crate::types::primitives::amount_serde")]
        total_value: Value,
        shapley_values: BTreeMap<ScoutId, f64>,
        rejected_bundle_ids: Vec<BundleId>,
        exec_time_ms: u64,
    },

    ChallengeIssued {
        challenge_id: ChallengeId,
        bundle_id: BundleId,
        attack_vector_count: usize,
        overall_score: f64,
        recommendation: Recommendation,
    },

    CounterProcessed {
        counter_id: CounterId,
        challenge_id: ChallengeId,
        response_time_ms: u64,
        within_deadline: bool,
        decision: CounterDecision,
        confidence: f64,
    },

    FuzzProgress {
        completed: usize,
        total: usize,
        vulnerabilities_so_far: u64,
    },

    FuzzCompleted {
        stats: Box<FuzzerStats>,
    },
}

/// Port through which the core publishes events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: NegotiationEvent);
}

/// Sink that forwards events into a tokio channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<NegotiationEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NegotiationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: NegotiationEvent) {
        if self.tx.send(event).is_err() {
            debug!("event receiver dropped; event discarded");
        }
    }
}

/// Sink that drops everything; for hosts that do not consume events
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: NegotiationEvent) {}
}
