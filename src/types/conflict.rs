// Conflict model - pairwise semantic incompatibility between revealed bundles
use super::primitives::BundleId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How two bundles can interfere with each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    /// Shared token address between the bundles' opportunity token sets
    TokenOverlap,

    /// Shared pool address between the bundles' opportunity pool sets
    PoolOverlap,

    /// Same account nonce consumed by both bundles
    NonceConflict,

    /// One bundle reads or writes state the other produces (shared tx)
    StateDependency,

    /// Both bundles bid for the same block position via gas escalation
    GasWar,

    /// Execution windows overlap too tightly to order safely
    Timing,

    /// No interference detected
    None,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictKind::TokenOverlap => "token-overlap",
            ConflictKind::PoolOverlap => "pool-overlap",
            ConflictKind::NonceConflict => "nonce-conflict",
            ConflictKind::StateDependency => "state-dependency",
            ConflictKind::GasWar => "gas-war",
            ConflictKind::Timing => "timing",
            ConflictKind::None => "none",
        };
        write!(f, "{}", s)
    }
}

/// Classified conflict between an ordered bundle pair. Symmetric by construction:
/// classifying (b, a) yields the same kind and severity as (a, b).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub a: BundleId,
    pub b: BundleId,
    pub kind: ConflictKind,

    /// Severity in [0, 1]; 1.0 means the bundles can never co-execute
    pub severity: f64,

    pub reason: String,
}

impl Conflict {
    pub fn none(a: BundleId, b: BundleId) -> Self {
        Self {
            a,
            b,
            kind: ConflictKind::None,
            severity: 0.0,
            reason: String::new(),
        }
    }

    /// Whether this conflict forbids co-membership under the given threshold
    pub fn is_blocking(&self, max_severity: f64) -> bool {
        self.kind != ConflictKind::None && self.severity > max_severity
    }

    pub fn involves(&self, id: &BundleId) -> bool {
        &self.a == id || &self.b == id
    }
}
