//! Set and multiset similarity measures shared by the class, method and field matchers.
//!
//! Every measure lies in [0, 1]. Two empty inputs are considered identical (1.0); one empty
//! input against a non-empty one scores 0.

use std::collections::{BTreeMap, BTreeSet};

/// `|a ∩ b| / |a ∪ b|`.
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(b).count();
    let union = a.len() + b.len() - shared;
    shared as f64 / union as f64
}

/// Jaccard where every element contributes `weight(element)` instead of 1.
pub fn weighted_jaccard<T: Ord>(
    a: &BTreeSet<T>,
    b: &BTreeSet<T>,
    weight: impl Fn(&T) -> f64,
) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared: f64 = a.intersection(b).map(&weight).sum();
    let union: f64 = a.union(b).map(&weight).sum();
    if union <= 0.0 {
        return 0.0;
    }
    shared / union
}

/// `|a ∩ b| / min(|a|, |b|)`.
pub fn overlap<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        _ => a.intersection(b).count() as f64 / a.len().min(b.len()) as f64,
    }
}

/// `Σ min(a_k, b_k) / Σ max(a_k, b_k)` over counted keys.
pub fn multiset_jaccard<K: Ord>(a: &BTreeMap<K, u32>, b: &BTreeMap<K, u32>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let (mut low, mut high) = (0u64, 0u64);
    for key in a.keys().chain(b.keys().filter(|k| !a.contains_key(*k))) {
        let x = u64::from(a.get(key).copied().unwrap_or(0));
        let y = u64::from(b.get(key).copied().unwrap_or(0));
        low += x.min(y);
        high += x.max(y);
    }
    if high == 0 {
        return 1.0;
    }
    low as f64 / high as f64
}

/// Cosine similarity of two count vectors.
pub fn cosine<K: Ord>(a: &BTreeMap<K, u32>, b: &BTreeMap<K, u32>) -> f64 {
    let norm = |m: &BTreeMap<K, u32>| {
        m.values()
            .map(|&v| f64::from(v) * f64::from(v))
            .sum::<f64>()
            .sqrt()
    };
    let (na, nb) = (norm(a), norm(b));
    if na == 0.0 && nb == 0.0 {
        return 1.0;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .filter_map(|(k, &x)| b.get(k).map(|&y| f64::from(x) * f64::from(y)))
        .sum();
    (dot / (na * nb)).clamp(0.0, 1.0)
}

/// Builds a count map from an iterator of keys.
pub fn counts<K: Ord, I: IntoIterator<Item = K>>(items: I) -> BTreeMap<K, u32> {
    let mut map = BTreeMap::new();
    for item in items {
        *map.entry(item).or_insert(0) += 1;
    }
    map
}
