/// Module for refining method candidates with call-graph context.
///
/// Starting from a seed mapping, every round re-scores each old method's candidates by blending
/// the structural score with call-graph agreement: the share of the old method's mapped
/// neighbours whose image is a neighbour of the candidate. Rounds read an immutable snapshot of
/// the previous selection, so one round is parallel over old methods and its outcome does not
/// depend on evaluation order. The loop ends once a round changes nothing, or after the
/// configured number of rounds.
///
/// The final selection is made injective: when two old methods pick the same new method, the
/// higher blended score wins, then the higher base score, then the smaller old key.
///
/// # Usage
/// ```rust,ignore
/// let seed = seed_mapping(&candidates, config.seed_threshold);
/// let report = refine(&candidates, &old_graph, &new_graph, &seed, &config)?;
/// ```
use crate::config::RefineConfig;
use crate::Match;
use rayon::prelude::*;
use remora_analysis::CallGraph;
use remora_core::MethodKey;
use remora_utils::errors::MatchError;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Old method → new method.
pub type MethodMapping = BTreeMap<MethodKey, MethodKey>;

/// Outcome of a refinement run.
#[derive(Debug, Clone, Default)]
pub struct RefineReport {
    /// Injective final selection
    pub mapping: MethodMapping,
    /// Blended score of every selected pair
    pub scores: BTreeMap<MethodKey, f64>,
    /// Rounds executed
    pub rounds: usize,
    /// Whether the last round changed nothing
    pub converged: bool,
    /// Old methods dropped because another old method won their new method
    pub collisions_dropped: usize,
    /// Collision losers moved to a free candidate
    pub reassigned: usize,
}

/// One old method's pick in a round.
#[derive(Debug, Clone, PartialEq)]
struct Selection<'a> {
    new: &'a MethodKey,
    blended: f64,
    base: f64,
}

/// Candidates grouped by old key, highest base score first.
fn group(candidates: &[Match<MethodKey>]) -> BTreeMap<&MethodKey, Vec<&Match<MethodKey>>> {
    let mut grouped: BTreeMap<&MethodKey, Vec<&Match<MethodKey>>> = BTreeMap::new();
    for m in candidates {
        grouped.entry(&m.old).or_default().push(m);
    }
    for list in grouped.values_mut() {
        list.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.new.cmp(&b.new)));
    }
    grouped
}

/// Best candidate per old method with a score of at least `threshold`.
pub fn seed_mapping(candidates: &[Match<MethodKey>], threshold: f64) -> MethodMapping {
    group(candidates)
        .into_iter()
        .filter_map(|(old, list)| {
            let best = list.first()?;
            (best.score >= threshold).then(|| (old.clone(), best.new.clone()))
        })
        .collect()
}

/// Fraction of `old`'s mapped neighbours whose image neighbours `new`.
fn agreement(
    old: &MethodKey,
    new: &MethodKey,
    snapshot: &BTreeMap<&MethodKey, &MethodKey>,
    old_graph: &CallGraph,
    new_graph: &CallGraph,
) -> f64 {
    let images: Vec<&MethodKey> = old_graph
        .neighbors(old)
        .into_iter()
        .filter_map(|n| snapshot.get(n).copied())
        .collect();
    if images.is_empty() {
        return 0.0;
    }
    let around = new_graph.neighbors(new);
    let agreeing = images.iter().filter(|i| around.contains(*i)).count();
    agreeing as f64 / images.len() as f64
}

/// Ranks a's pick above b's.
fn better(a: &Selection<'_>, b: &Selection<'_>) -> bool {
    a.blended
        .total_cmp(&b.blended)
        .then_with(|| a.base.total_cmp(&b.base))
        .then_with(|| b.new.cmp(a.new))
        .is_gt()
}

/// Iteratively refines `seed` over `candidates` using both call graphs.
///
/// Seed pairs that are not among the candidates are ignored, so the result only contains
/// candidate pairs.
pub fn refine(
    candidates: &[Match<MethodKey>],
    old_graph: &CallGraph,
    new_graph: &CallGraph,
    seed: &MethodMapping,
    config: &RefineConfig,
) -> Result<RefineReport, MatchError> {
    let w = config.neighbor_weight;
    if !(0.0..=1.0).contains(&w) {
        return Err(MatchError::InvalidNeighborWeight(w));
    }

    let grouped = group(candidates);
    let mut current: BTreeMap<&MethodKey, Selection<'_>> = BTreeMap::new();
    for (old, new) in seed {
        if let Some(m) = grouped
            .get(old)
            .and_then(|list| list.iter().find(|m| &m.new == new))
        {
            current.insert(
                &m.old,
                Selection {
                    new: &m.new,
                    blended: m.score,
                    base: m.score,
                },
            );
        }
    }
    let discarded = seed.len() - current.len();
    if discarded > 0 {
        debug!("refine: {discarded} seed pairs are not candidates and were ignored");
    }

    let olds: Vec<(&MethodKey, &Vec<&Match<MethodKey>>)> =
        grouped.iter().map(|(k, v)| (*k, v)).collect();
    let mut rounds = 0;
    let mut converged = false;
    while rounds < config.max_iterations {
        rounds += 1;
        let snapshot: BTreeMap<&MethodKey, &MethodKey> =
            current.iter().map(|(k, s)| (*k, s.new)).collect();

        let next: BTreeMap<&MethodKey, Selection<'_>> = olds
            .par_iter()
            .filter_map(|(old, list)| {
                let mut best: Option<Selection<'_>> = None;
                for m in list.iter() {
                    let agree = agreement(old, &m.new, &snapshot, old_graph, new_graph);
                    let pick = Selection {
                        new: &m.new,
                        blended: m.score * (1.0 - w) + agree * w,
                        base: m.score,
                    };
                    match &best {
                        Some(b) if !better(&pick, b) => {}
                        _ => best = Some(pick),
                    }
                }
                best.map(|b| (*old, b))
            })
            .collect();

        let changed = next
            .iter()
            .filter(|(k, s)| snapshot.get(*k) != Some(&s.new))
            .count()
            + snapshot.keys().filter(|k| !next.contains_key(*k)).count();
        info!("{:>14} round {:>2} {:>6} changed", "refine", rounds, changed);
        current = next;
        if changed == 0 {
            converged = true;
            break;
        }
    }

    // injectivity
    let mut by_new: BTreeMap<&MethodKey, Vec<(&MethodKey, Selection<'_>)>> = BTreeMap::new();
    for (old, sel) in &current {
        by_new.entry(sel.new).or_default().push((*old, sel.clone()));
    }
    let mut report = RefineReport {
        rounds,
        converged,
        ..RefineReport::default()
    };
    let mut losers: Vec<(&MethodKey, Selection<'_>)> = Vec::new();
    for (_, mut claims) in by_new {
        claims.sort_by(|(ka, a), (kb, b)| {
            b.blended
                .total_cmp(&a.blended)
                .then_with(|| b.base.total_cmp(&a.base))
                .then_with(|| ka.cmp(kb))
        });
        let mut claims = claims.into_iter();
        if let Some((old, sel)) = claims.next() {
            report.mapping.insert(old.clone(), sel.new.clone());
            report.scores.insert(old.clone(), sel.blended);
        }
        losers.extend(claims);
    }
    report.collisions_dropped = losers.len();

    if config.reassign_collision_losers {
        losers.sort_by(|(ka, a), (kb, b)| b.blended.total_cmp(&a.blended).then_with(|| ka.cmp(kb)));
        let mut taken: BTreeSet<MethodKey> = report.mapping.values().cloned().collect();
        for (old, _) in losers {
            let free = grouped
                .get(old)
                .and_then(|list| list.iter().find(|m| !taken.contains(&m.new)));
            if let Some(m) = free {
                taken.insert(m.new.clone());
                report.mapping.insert(old.clone(), m.new.clone());
                report.scores.insert(old.clone(), m.score);
                report.reassigned += 1;
            }
        }
        report.collisions_dropped -= report.reassigned;
    }

    debug!(
        "refine: {} pairs after {} rounds (converged: {}), {} collisions dropped, {} reassigned",
        report.mapping.len(),
        report.rounds,
        report.converged,
        report.collisions_dropped,
        report.reassigned
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use remora_core::{Artifact, ClassDef, ClassKind, Insn, MethodDef, Opcode};

    fn key(owner: &str, name: &str) -> MethodKey {
        MethodKey::new(owner, name, "()V")
    }

    fn m(old: &str, new: &str, score: f64) -> Match<MethodKey> {
        Match {
            old: key("ab", old),
            new: key("cd", new),
            score,
        }
    }

    /// Call graph over `owner` where `calls` lists (caller, callee) pairs.
    fn graph(owner: &str, names: &[&str], calls: &[(&str, &str)]) -> CallGraph {
        let methods = names
            .iter()
            .map(|&name| MethodDef {
                name: name.into(),
                desc: "()V".into(),
                is_static: true,
                is_abstract: false,
                instructions: calls
                    .iter()
                    .filter(|(from, _)| *from == name)
                    .map(|(_, to)| Insn::Invoke {
                        opcode: Opcode::INVOKESTATIC,
                        owner: owner.into(),
                        name: (*to).into(),
                        desc: "()V".into(),
                        interface: false,
                    })
                    .collect(),
                try_catch: vec![],
            })
            .collect();
        let artifact = Artifact::from_classes(vec![ClassDef {
            name: owner.into(),
            super_name: None,
            interfaces: vec![],
            kind: ClassKind::Class,
            methods,
            fields: vec![],
        }]);
        let universe = names.iter().map(|n| key(owner, n)).collect();
        CallGraph::extract(&artifact, &universe)
    }

    #[test]
    fn rejects_invalid_neighbor_weight() {
        let g = CallGraph::default();
        let config = RefineConfig {
            neighbor_weight: 1.2,
            ..RefineConfig::default()
        };
        assert!(matches!(
            refine(&[], &g, &g, &MethodMapping::new(), &config),
            Err(MatchError::InvalidNeighborWeight(_))
        ));
    }

    #[test]
    fn seed_takes_the_best_candidate_above_threshold() {
        let candidates = vec![m("a", "x", 0.4), m("a", "y", 0.6), m("b", "x", 0.05)];
        let seed = seed_mapping(&candidates, 0.1);
        assert_eq!(seed.len(), 1);
        assert_eq!(seed[&key("ab", "a")], key("cd", "y"));
    }

    #[test]
    fn call_graph_context_breaks_near_ties() {
        // old: a calls b. new: x calls z; y is isolated.
        let old = graph("ab", &["a", "b"], &[("a", "b")]);
        let new = graph("cd", &["x", "y", "z"], &[("x", "z")]);
        let candidates = vec![
            m("a", "x", 0.50),
            m("a", "y", 0.52),
            m("b", "z", 0.90),
        ];
        let seed = seed_mapping(&candidates, 0.1);
        assert_eq!(seed[&key("ab", "a")], key("cd", "y"));

        let report = refine(&candidates, &old, &new, &seed, &RefineConfig::default()).unwrap();
        assert!(report.converged);
        assert!(report.rounds <= RefineConfig::default().max_iterations);
        assert_eq!(report.mapping[&key("ab", "a")], key("cd", "x"));
        assert_eq!(report.mapping[&key("ab", "b")], key("cd", "z"));
        // 0.5 * 0.7 + 1.0 * 0.3
        assert!((report.scores[&key("ab", "a")] - 0.65).abs() < 1e-12);
    }

    #[test]
    fn collisions_keep_the_higher_blended_score() {
        let g = CallGraph::default();
        let candidates = vec![m("a", "x", 0.8), m("b", "x", 0.6), m("b", "y", 0.3)];
        let seed = seed_mapping(&candidates, 0.1);
        let report = refine(&candidates, &g, &g, &seed, &RefineConfig::default()).unwrap();
        assert_eq!(report.mapping.len(), 1);
        assert_eq!(report.mapping[&key("ab", "a")], key("cd", "x"));
        assert_eq!(report.collisions_dropped, 1);

        let config = RefineConfig {
            reassign_collision_losers: true,
            ..RefineConfig::default()
        };
        let report = refine(&candidates, &g, &g, &seed, &config).unwrap();
        assert_eq!(report.mapping[&key("ab", "b")], key("cd", "y"));
        assert_eq!(report.reassigned, 1);
        assert_eq!(report.collisions_dropped, 0);
    }

    #[test]
    fn equal_scores_prefer_the_smaller_old_key() {
        let g = CallGraph::default();
        let candidates = vec![m("b", "x", 0.5), m("a", "x", 0.5)];
        let seed = seed_mapping(&candidates, 0.1);
        let report = refine(&candidates, &g, &g, &seed, &RefineConfig::default()).unwrap();
        assert_eq!(report.mapping.keys().collect::<Vec<_>>(), vec![&key("ab", "a")]);
    }

    #[test]
    fn foreign_seed_pairs_are_ignored() {
        let g = CallGraph::default();
        let candidates = vec![m("a", "x", 0.5)];
        let mut seed = MethodMapping::new();
        seed.insert(key("ab", "a"), key("cd", "nope"));
        seed.insert(key("ab", "q"), key("cd", "x"));
        let config = RefineConfig {
            max_iterations: 1,
            ..RefineConfig::default()
        };
        let report = refine(&candidates, &g, &g, &seed, &config).unwrap();
        assert_eq!(report.rounds, 1);
        assert!(!report.converged);
        assert_eq!(report.mapping[&key("ab", "a")], key("cd", "x"));
        assert_eq!(report.mapping.len(), 1);
    }
}
