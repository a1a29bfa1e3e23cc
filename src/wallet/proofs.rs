//! Proof selection and bookkeeping
//!
//! Pure local computation over proof sets: selecting proofs to cover an
//! outgoing amount, summing balances with overflow checks, and deduplicating
//! by secret. Selection prefers an exact match so a send can complete without
//! a mint round trip; otherwise it picks a minimal cover for the swap path.

use std::collections::HashSet;

use super::types::Proof;

/// Outcome of proof selection for an outgoing amount
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The selected proofs sum to exactly the requested amount; no mint
    /// round trip is needed.
    Exact(Vec<Proof>),
    /// The selected proofs overshoot the amount; they must be swapped at the
    /// mint for a payment-amount proof plus change.
    NeedsSwap { inputs: Vec<Proof>, amount: u64 },
}

/// Checked sum over a proof slice; `None` on overflow
pub fn total_amount(proofs: &[Proof]) -> Option<u64> {
    proofs
        .iter()
        .map(|p| p.amount)
        .try_fold(0u64, |acc, amount| acc.checked_add(amount))
}

/// Select proofs covering `amount` from `available`.
///
/// Order of preference:
/// 1. a single proof of exactly `amount`
/// 2. an exact subset (bounded search over the smallest proofs)
/// 3. a greedy smallest-first cover that overshoots and needs a swap
///
/// Returns `None` when the available proofs cannot cover `amount`.
pub fn select_proofs(available: &[Proof], amount: u64) -> Option<Selection> {
    if amount == 0 {
        return Some(Selection::Exact(Vec::new()));
    }
    let total = total_amount(available)?;
    if total < amount {
        return None;
    }

    if let Some(exact) = available.iter().find(|p| p.amount == amount) {
        return Some(Selection::Exact(vec![exact.clone()]));
    }

    let mut sorted: Vec<Proof> = available.to_vec();
    sorted.sort_by_key(|p| p.amount);

    if let Some(subset) = exact_subset(&sorted, amount) {
        return Some(Selection::Exact(subset));
    }

    // Greedy cover, smallest first, so large proofs survive for later sends
    let mut inputs = Vec::new();
    let mut covered = 0u64;
    for proof in sorted {
        covered = covered.saturating_add(proof.amount);
        inputs.push(proof);
        if covered >= amount {
            break;
        }
    }
    Some(Selection::NeedsSwap { inputs, amount })
}

/// Bounded exact-subset search over sorted proofs.
///
/// Proof sets here are small (a mobile wallet holds tens of proofs), but the
/// search still caps the explored combinations so a pathological set cannot
/// stall a send.
fn exact_subset(sorted: &[Proof], amount: u64) -> Option<Vec<Proof>> {
    const MAX_STEPS: usize = 10_000;

    fn walk(
        sorted: &[Proof],
        start: usize,
        remaining: u64,
        picked: &mut Vec<Proof>,
        steps: &mut usize,
    ) -> bool {
        if remaining == 0 {
            return true;
        }
        for idx in start..sorted.len() {
            if *steps >= MAX_STEPS {
                return false;
            }
            *steps += 1;
            let proof = &sorted[idx];
            if proof.amount > remaining {
                break; // sorted ascending, nothing further fits
            }
            picked.push(proof.clone());
            if walk(sorted, idx + 1, remaining - proof.amount, picked, steps) {
                return true;
            }
            picked.pop();
        }
        false
    }

    let mut picked = Vec::new();
    let mut steps = 0usize;
    if walk(sorted, 0, amount, &mut picked, &mut steps) {
        Some(picked)
    } else {
        None
    }
}

/// Remove `consumed` proofs from `held`, matching by secret
pub fn remove_proofs(held: &[Proof], consumed: &[Proof]) -> Vec<Proof> {
    let consumed_secrets: HashSet<&str> = consumed.iter().map(|p| p.secret.as_str()).collect();
    held.iter()
        .filter(|p| !consumed_secrets.contains(p.secret.as_str()))
        .cloned()
        .collect()
}

/// Append `incoming` proofs to `held`, skipping secrets already present.
///
/// Returns the merged set and the amount actually added, so double-redeemed
/// proofs never inflate the balance.
pub fn merge_proofs(held: &[Proof], incoming: Vec<Proof>) -> (Vec<Proof>, u64) {
    let mut secrets: HashSet<String> = held.iter().map(|p| p.secret.clone()).collect();
    let mut merged = held.to_vec();
    let mut added = 0u64;
    for proof in incoming {
        if secrets.insert(proof.secret.clone()) {
            added = added.saturating_add(proof.amount);
            merged.push(proof);
        }
    }
    (merged, added)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proof(amount: u64, secret: &str) -> Proof {
        Proof::new("ks1", amount, secret, format!("C-{}", secret))
    }

    #[test]
    fn single_exact_proof_wins() {
        let held = vec![proof(100, "a"), proof(400, "b")];
        match select_proofs(&held, 100).unwrap() {
            Selection::Exact(picked) => {
                assert_eq!(picked.len(), 1);
                assert_eq!(picked[0].amount, 100);
            }
            other => panic!("expected exact selection, got {:?}", other),
        }
    }

    #[test]
    fn exact_subset_avoids_swap() {
        let held = vec![proof(1, "a"), proof(2, "b"), proof(8, "c"), proof(32, "d")];
        match select_proofs(&held, 10).unwrap() {
            Selection::Exact(picked) => {
                assert_eq!(total_amount(&picked), Some(10));
            }
            other => panic!("expected exact subset, got {:?}", other),
        }
    }

    #[test]
    fn overshoot_requests_swap() {
        let held = vec![proof(1000, "a")];
        match select_proofs(&held, 300).unwrap() {
            Selection::NeedsSwap { inputs, amount } => {
                assert_eq!(amount, 300);
                assert_eq!(total_amount(&inputs), Some(1000));
            }
            other => panic!("expected swap selection, got {:?}", other),
        }
    }

    #[test]
    fn insufficient_funds_selects_nothing() {
        let held = vec![proof(100, "a")];
        assert!(select_proofs(&held, 300).is_none());
    }

    #[test]
    fn merge_skips_duplicate_secrets() {
        let held = vec![proof(100, "a")];
        let (merged, added) = merge_proofs(&held, vec![proof(100, "a"), proof(50, "b")]);
        assert_eq!(added, 50);
        assert_eq!(total_amount(&merged), Some(150));
    }

    #[test]
    fn remove_matches_by_secret() {
        let held = vec![proof(100, "a"), proof(400, "b")];
        let rest = remove_proofs(&held, &[proof(100, "a")]);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].secret, "b");
    }
}
