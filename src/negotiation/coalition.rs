// Coalition Engine - valid-coalition enumeration, optimal selection, and
// Shapley allocation
//
// Coalitions are subsets of the round's revealed bundles that form an
// independent set in the blocking-conflict graph. Enumeration is bitmask
// subset walking, hard-capped at 16 bundles; the cap is enforced before
// enumeration so the 2^n work stays bounded.
//
// The Shapley value uses the subset-weighted marginal form
//   phi_i = sum over S not containing i of |S|!(n-|S|-1)!/n! * (v(S+i) - v(S))
// which needs 2^(n-1) terms per member instead of n! permutations. The same
// characteristic function drives enumeration, allocation and the core
// stability check, so superadditive overrides stay consistent throughout.

use crate::types::{BundleId, Coalition, CoalitionId, Conflict, Hash, RevealedBundle, ScoutId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Enumeration is bitmask-based; more members would need an independent-set
/// algorithm and the permutation-free Shapley form alone will not save it
const MAX_ENUMERABLE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum CoalitionError {
    #[error("{got} bundles exceed the enumerable coalition limit of {max}")]
    TooManyBundles { got: usize, max: usize },
}

/// Characteristic function v(S): the joint value of a bundle coalition.
///
/// The default is additive (the sum of promised values); hosts may supply a
/// superadditive or synergistic function and every computation downstream
/// of it (selection, Shapley, stability) uses the override.
pub trait CharacteristicFn: Send + Sync {
    fn value(&self, members: &[&RevealedBundle]) -> f64;
}

/// v(S) = sum of promised values
pub struct AdditiveValue;

impl CharacteristicFn for AdditiveValue {
    fn value(&self, members: &[&RevealedBundle]) -> f64 {
        members.iter().map(|b| b.promised_value() as f64).sum()
    }
}

/// The engine's answer for one round
#[derive(Debug, Clone)]
pub struct CoalitionOutcome {
    pub coalition: Coalition,

    /// Shapley value per member bundle (scout-level aggregation lives on
    /// the coalition)
    pub bundle_shapley: BTreeMap<BundleId, f64>,

    /// Valid coalitions examined during selection
    pub coalitions_considered: u64,
}

pub struct CoalitionEngine {
    max_size: usize,
    max_conflict_severity: f64,
}

impl CoalitionEngine {
    pub fn new(max_size: usize, max_conflict_severity: f64) -> Self {
        Self { max_size, max_conflict_severity }
    }

    /// Select the optimal coalition among the round's bundles.
    ///
    /// Returns `None` for an empty input. At least one valid coalition
    /// exists otherwise: singletons never conflict with themselves.
    pub fn select(
        &self,
        bundles: &[RevealedBundle],
        conflicts: &[Conflict],
        v: &dyn CharacteristicFn,
    ) -> Result<Option<CoalitionOutcome>, CoalitionError> {
        let n = bundles.len();
        if n == 0 {
            return Ok(None);
        }
        if n > MAX_ENUMERABLE {
            return Err(CoalitionError::TooManyBundles { got: n, max: MAX_ENUMERABLE });
        }

        let adjacency = self.build_adjacency(bundles, conflicts);

        // Walk every non-empty subset, keeping the best valid one.
        // Ties: larger coalition first, then lexicographic bundle-id order.
        let mut best: Option<(u32, f64, Vec<&BundleId>)> = None;
        let mut considered: u64 = 0;

        for mask in 1u32..(1u32 << n) {
            if mask.count_ones() as usize > self.max_size {
                continue;
            }
            if !is_independent(mask, &adjacency) {
                continue;
            }
            considered += 1;

            let members = members_of(bundles, mask);
            let value = v.value(&members);
            let ids = sorted_ids(&members);

            let better = match &best {
                None => true,
                Some((best_mask, best_value, best_ids)) => {
                    if (value - best_value).abs() > 1e-9 {
                        value > *best_value
                    } else if mask.count_ones() != best_mask.count_ones() {
                        mask.count_ones() > best_mask.count_ones()
                    } else {
                        ids < *best_ids
                    }
                }
            };
            if better {
                best = Some((mask, value, ids));
            }
        }

        // Singletons are always valid, so a best subset must exist
        let (winner_mask, winner_value, _) = best.expect("non-empty pool yields a coalition");

        let members = members_of(bundles, winner_mask);
        let bundle_shapley = shapley(&members, v);
        let stable = in_core(&members, &bundle_shapley, v);

        debug!(
            "⚖️ Coalition of {}/{} bundles, v(S)={:.0}, {} subsets considered, stable={}",
            members.len(),
            n,
            winner_value,
            considered,
            stable
        );

        let mut scouts = BTreeSet::new();
        let mut marginal_contributions: BTreeMap<ScoutId, f64> = BTreeMap::new();
        for b in &members {
            scouts.insert(b.scout_id().clone());
            *marginal_contributions.entry(b.scout_id().clone()).or_insert(0.0) +=
                bundle_shapley[b.bundle_id()];
        }

        let coalition = Coalition {
            coalition_id: coalition_id(&members),
            scouts,
            value: members.iter().map(|b| b.promised_value()).sum(),
            bundles: members.iter().map(|b| (*b).clone()).collect(),
            marginal_contributions,
            stable,
        };

        Ok(Some(CoalitionOutcome { coalition, bundle_shapley, coalitions_considered: considered }))
    }

    /// Undirected blocking-conflict adjacency as per-bundle bitmasks
    fn build_adjacency(&self, bundles: &[RevealedBundle], conflicts: &[Conflict]) -> Vec<u32> {
        let index: BTreeMap<&BundleId, usize> = bundles
            .iter()
            .enumerate()
            .map(|(i, b)| (b.bundle_id(), i))
            .collect();

        let mut adjacency = vec![0u32; bundles.len()];
        for conflict in conflicts {
            if !conflict.is_blocking(self.max_conflict_severity) {
                continue;
            }
            if let (Some(&i), Some(&j)) = (index.get(&conflict.a), index.get(&conflict.b)) {
                adjacency[i] |= 1 << j;
                adjacency[j] |= 1 << i;
            }
        }
        adjacency
    }
}

fn is_independent(mask: u32, adjacency: &[u32]) -> bool {
    let mut rest = mask;
    while rest != 0 {
        let i = rest.trailing_zeros() as usize;
        rest &= rest - 1;
        if adjacency[i] & mask != 0 {
            return false;
        }
    }
    true
}

fn members_of<'a>(bundles: &'a [RevealedBundle], mask: u32) -> Vec<&'a RevealedBundle> {
    bundles
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(_, b)| b)
        .collect()
}

fn sorted_ids<'a>(members: &[&'a RevealedBundle]) -> Vec<&'a BundleId> {
    let mut ids: Vec<&BundleId> = members.iter().map(|b| b.bundle_id()).collect();
    ids.sort();
    ids
}

fn coalition_id(members: &[&RevealedBundle]) -> CoalitionId {
    let mut data = Vec::new();
    for id in sorted_ids(members) {
        data.extend_from_slice(id.as_str().as_bytes());
        data.push(0);
    }
    CoalitionId::from_hash(&Hash::hash(&data))
}

/// Shapley values over the coalition members, subset-weighted form
fn shapley(members: &[&RevealedBundle], v: &dyn CharacteristicFn) -> BTreeMap<BundleId, f64> {
    let m = members.len();
    let subset_values = subset_value_table(members, v);

    // w[s] = s! * (m-1-s)! / m!
    let fact = factorials(m);
    let weights: Vec<f64> = (0..m).map(|s| fact[s] * fact[m - 1 - s] / fact[m]).collect();

    let mut values = BTreeMap::new();
    for (i, member) in members.iter().enumerate() {
        let bit = 1u32 << i;
        let mut phi = 0.0;
        for mask in 0..(1u32 << m) {
            if mask & bit != 0 {
                continue;
            }
            let s = mask.count_ones() as usize;
            phi += weights[s] * (subset_values[(mask | bit) as usize] - subset_values[mask as usize]);
        }
        values.insert(member.bundle_id().clone(), phi);
    }
    values
}

/// Core condition: no strict non-empty sub-coalition is paid less than it
/// could earn alone
fn in_core(
    members: &[&RevealedBundle],
    shapley: &BTreeMap<BundleId, f64>,
    v: &dyn CharacteristicFn,
) -> bool {
    let m = members.len();
    let subset_values = subset_value_table(members, v);
    let epsilon = 1e-6 * subset_values[(1usize << m) - 1].abs().max(1.0);

    for mask in 1u32..((1u32 << m) - 1) {
        let paid: f64 = members
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, b)| shapley[b.bundle_id()])
            .sum();
        if paid + epsilon < subset_values[mask as usize] {
            return false;
        }
    }
    true
}

fn subset_value_table(members: &[&RevealedBundle], v: &dyn CharacteristicFn) -> Vec<f64> {
    let m = members.len();
    (0..(1u32 << m))
        .map(|mask| {
            let subset: Vec<&RevealedBundle> = members
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, b)| *b)
                .collect();
            v.value(&subset)
        })
        .collect()
}

fn factorials(n: usize) -> Vec<f64> {
    let mut fact = vec![1.0; n + 1];
    for i in 1..=n {
        fact[i] = fact[i - 1] * i as f64;
    }
    fact
}
