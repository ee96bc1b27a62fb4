// Conflict Detector - pairwise semantic conflict classification
//
// Pure and deterministic: the same bundle pair always classifies to the
// same kind and severity, and classification is symmetric in its arguments.
// Rules are evaluated in order; the first match wins.

use crate::config::NegotiationConfig;
use crate::types::{Conflict, ConflictKind, RevealedBundle};
use std::collections::BTreeSet;

pub struct ConflictDetector {
    allow_token_overlap: bool,
    allow_pool_overlap: bool,
}

impl ConflictDetector {
    pub fn new(config: &NegotiationConfig) -> Self {
        Self {
            allow_token_overlap: config.allow_token_overlap,
            allow_pool_overlap: config.allow_pool_overlap,
        }
    }

    /// Classify one unordered bundle pair
    pub fn classify(&self, a: &RevealedBundle, b: &RevealedBundle) -> Conflict {
        let pair = (a.bundle_id().clone(), b.bundle_id().clone());

        // Rule 1: any shared transaction means hard state dependency
        if let Some(tx) = shared_tx(a, b) {
            return Conflict {
                a: pair.0,
                b: pair.1,
                kind: ConflictKind::StateDependency,
                severity: 1.0,
                reason: format!("transaction {} appears in both bundles", tx),
            };
        }

        let opp_a = a.opportunity.as_ref();
        let opp_b = b.opportunity.as_ref();

        // Rule 2: token overlap between disclosed opportunities
        if !self.allow_token_overlap {
            if let (Some(oa), Some(ob)) = (opp_a, opp_b) {
                if let Some((severity, shared)) = overlap(&oa.tokens, &ob.tokens) {
                    return Conflict {
                        a: pair.0,
                        b: pair.1,
                        kind: ConflictKind::TokenOverlap,
                        severity,
                        reason: format!("shared tokens: {}", shared.join(", ")),
                    };
                }
            }
        }

        // Rule 3: pool overlap between disclosed opportunities
        if !self.allow_pool_overlap {
            if let (Some(oa), Some(ob)) = (opp_a, opp_b) {
                if let Some((severity, shared)) = overlap(&oa.pools, &ob.pools) {
                    return Conflict {
                        a: pair.0,
                        b: pair.1,
                        kind: ConflictKind::PoolOverlap,
                        severity,
                        reason: format!("shared pools: {}", shared.join(", ")),
                    };
                }
            }
        }

        Conflict::none(pair.0, pair.1)
    }

    /// Classify every unordered pair. O(n^2 * k) over the pool snapshot,
    /// trivial at the block-level bundle cap.
    pub fn classify_all(&self, bundles: &[RevealedBundle]) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        for i in 0..bundles.len() {
            for j in (i + 1)..bundles.len() {
                let c = self.classify(&bundles[i], &bundles[j]);
                if c.kind != ConflictKind::None {
                    conflicts.push(c);
                }
            }
        }
        conflicts
    }
}

fn shared_tx<'a>(a: &'a RevealedBundle, b: &RevealedBundle) -> Option<&'a str> {
    let b_ids: BTreeSet<&str> = b.sealed.tx_ids.iter().map(String::as_str).collect();
    a.sealed
        .tx_ids
        .iter()
        .map(String::as_str)
        .find(|tx| b_ids.contains(tx))
}

/// Severity of a set overlap: |intersection| / min(|A|, |B|)
fn overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> Option<(f64, Vec<String>)> {
    if a.is_empty() || b.is_empty() {
        return None;
    }

    let shared: Vec<String> = a.intersection(b).cloned().collect();
    if shared.is_empty() {
        return None;
    }

    let severity = shared.len() as f64 / a.len().min(b.len()) as f64;
    Some((severity, shared))
}
