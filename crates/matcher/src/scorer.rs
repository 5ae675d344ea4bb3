//! Candidate scoring for method pairs.
//!
//! For every old method the scorer proposes the new methods most likely to be its counterpart.
//! Candidates come from the class paired with the old owner (or from every class when
//! `cross_class_candidates` is set), must pass two cheap shape filters, and are ranked by a
//! weighted mix of descriptor agreement, invoked-signature and string similarity (both
//! IDF-weighted over the joint corpus) and opcode-set overlap.

use crate::classes::ClassPairing;
use crate::config::{ScoreWeights, ScoringConfig};
use crate::similarity::{overlap, weighted_jaccard};
use crate::Match;
use rayon::prelude::*;
use remora_analysis::NormalizedMethod;
use remora_core::descriptor::{JavaType, MethodDescriptor};
use remora_core::MethodKey;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Token replacing the exception-wrap helper call.
pub const EXCEPTION_WRAP: &str = "EXCEPTION_WRAP";
/// Token replacing the `StringBuilder` concatenation chain.
pub const STRING_BUILDER_TO_STRING: &str = "STRING_BUILDER_TO_STRING";

const WRAP_HELPER_ARGS: &str = "(Ljava/lang/Throwable;Ljava/lang/String;)L";

const STRING_BUILDER_CHAIN: &[&str] = &[
    "java/lang/StringBuilder.<init>()V",
    "java/lang/StringBuilder.append(C)Ljava/lang/StringBuilder;",
    "java/lang/StringBuilder.append(Ljava/lang/String;)Ljava/lang/StringBuilder;",
    "java/lang/StringBuilder.toString()Ljava/lang/String;",
];

/// Signals a method needs before it is considered fully informative.
const RICHNESS: f64 = 5.0;

fn is_wrap_helper(sig: &str) -> bool {
    sig.find('(')
        .is_some_and(|i| sig[i..].starts_with(WRAP_HELPER_ARGS))
}

/// Collapses boilerplate call signatures into their plumbing tokens.
pub fn normalize_plumbing(invoked: &BTreeSet<String>) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for sig in invoked {
        if is_wrap_helper(sig) {
            out.insert(EXCEPTION_WRAP.to_string());
        } else if STRING_BUILDER_CHAIN.contains(&sig.as_str()) {
            out.insert(STRING_BUILDER_TO_STRING.to_string());
        } else {
            out.insert(sig.clone());
        }
    }
    out
}

fn is_plumbing_token(s: &str) -> bool {
    s == EXCEPTION_WRAP || s == STRING_BUILDER_TO_STRING
}

/// Inverse document frequencies over the joint old + new corpus.
#[derive(Debug, Clone, Default)]
pub struct CorpusStats {
    invoked_idf: HashMap<String, f64>,
    string_idf: HashMap<String, f64>,
}

impl CorpusStats {
    pub fn build<'a>(methods: impl IntoIterator<Item = &'a NormalizedMethod>) -> Self {
        let mut invoked_df: HashMap<String, usize> = HashMap::new();
        let mut string_df: HashMap<String, usize> = HashMap::new();
        let mut n = 0usize;
        for m in methods {
            n += 1;
            for sig in normalize_plumbing(&m.invoked) {
                *invoked_df.entry(sig).or_insert(0) += 1;
            }
            for s in &m.strings {
                *string_df.entry(s.clone()).or_insert(0) += 1;
            }
        }
        let idf = |df: HashMap<String, usize>| -> HashMap<String, f64> {
            df.into_iter()
                .map(|(k, d)| (k, ((n as f64 + 1.0) / (d as f64 + 1.0)).ln() + 1.0))
                .collect()
        };
        Self {
            invoked_idf: idf(invoked_df),
            string_idf: idf(string_df),
        }
    }

    pub fn invoked_weight(&self, sig: &str) -> f64 {
        self.invoked_idf.get(sig).copied().unwrap_or(1.0)
    }

    pub fn string_weight(&self, s: &str) -> f64 {
        self.string_idf.get(s).copied().unwrap_or(1.0)
    }
}

/// Per-method values the scorer needs for every pair.
#[derive(Debug, Clone)]
struct Profile {
    invoked: BTreeSet<String>,
    complexity: f64,
    plumbing_only: bool,
}

impl Profile {
    fn of(m: &NormalizedMethod) -> Self {
        let invoked = normalize_plumbing(&m.invoked);
        let complexity = ((invoked.len() + m.strings.len()) as f64 / RICHNESS).min(1.0);
        let plumbing_only = m.strings.is_empty() && invoked.iter().all(|s| is_plumbing_token(s));
        Self {
            invoked,
            complexity,
            plumbing_only,
        }
    }
}

/// `true` when two argument types may be the same parameter after renaming.
fn compatible_arg(a: &JavaType, b: &JavaType) -> bool {
    match (a, b) {
        (JavaType::Array(ea, da), JavaType::Array(eb, db)) => da == db && compatible_arg(ea, eb),
        (JavaType::Array(..), _) | (_, JavaType::Array(..)) => false,
        // renaming keeps name lengths within one obfuscation run
        (JavaType::Object(na), JavaType::Object(nb)) => na.len() == nb.len(),
        (JavaType::Object(_), _) | (_, JavaType::Object(_)) => false,
        _ => true,
    }
}

/// Same arity and pairwise compatible argument shapes.
pub fn compatible_shape(old_desc: &str, new_desc: &str) -> bool {
    match (
        MethodDescriptor::parse(old_desc),
        MethodDescriptor::parse(new_desc),
    ) {
        (Ok(a), Ok(b)) => {
            a.args.len() == b.args.len()
                && a.args.iter().zip(&b.args).all(|(x, y)| compatible_arg(x, y))
        }
        _ => old_desc == new_desc,
    }
}

/// The two-character obfuscated-name shape must agree.
fn same_name_shape(a: &MethodKey, b: &MethodKey) -> bool {
    (a.name.len() == 2) == (b.name.len() == 2)
}

/// Scores method pairs against a fixed corpus.
#[derive(Debug)]
pub struct MethodScorer<'a> {
    stats: CorpusStats,
    weights: &'a ScoreWeights,
    pairing: &'a dyn ClassPairing,
    old_profiles: HashMap<&'a MethodKey, Profile>,
    new_profiles: HashMap<&'a MethodKey, Profile>,
}

impl<'a> MethodScorer<'a> {
    pub fn new(
        old: &'a BTreeMap<MethodKey, NormalizedMethod>,
        new: &'a BTreeMap<MethodKey, NormalizedMethod>,
        pairing: &'a dyn ClassPairing,
        weights: &'a ScoreWeights,
    ) -> Self {
        let profiles = |side: &'a BTreeMap<MethodKey, NormalizedMethod>| {
            side.iter().map(|(k, m)| (k, Profile::of(m))).collect()
        };
        Self {
            stats: CorpusStats::build(old.values().chain(new.values())),
            weights,
            pairing,
            old_profiles: profiles(old),
            new_profiles: profiles(new),
        }
    }

    fn profile(cache: &HashMap<&MethodKey, Profile>, m: &NormalizedMethod) -> Profile {
        cache.get(&m.key).cloned().unwrap_or_else(|| Profile::of(m))
    }

    /// Similarity of an old and a new normalized method in [0, 1].
    pub fn score(&self, a: &NormalizedMethod, b: &NormalizedMethod) -> f64 {
        if a.fingerprint == b.fingerprint {
            return 1.0;
        }
        let pa = Self::profile(&self.old_profiles, a);
        let pb = Self::profile(&self.new_profiles, b);
        let w = self.weights;

        let descriptor = if a.descriptor == b.descriptor
            || self.pairing.remap_descriptor(&a.descriptor) == b.descriptor
        {
            1.0
        } else {
            0.5
        };
        let invoked = weighted_jaccard(&pa.invoked, &pb.invoked, |s| {
            self.stats.invoked_weight(s)
        });
        let strings = weighted_jaccard(&a.strings, &b.strings, |s| self.stats.string_weight(s));
        let (ka, kb): (BTreeSet<_>, BTreeSet<_>) = (
            a.opcode_histogram.keys().collect(),
            b.opcode_histogram.keys().collect(),
        );
        let opcodes = overlap(&ka, &kb);

        let total = w.descriptor + w.invoked + w.strings + w.opcodes;
        if total <= 0.0 {
            return 0.0;
        }
        let mut score = (w.descriptor * descriptor
            + w.invoked * invoked
            + w.strings * strings
            + w.opcodes * opcodes)
            / total;

        // trivial bodies carry little evidence
        score *= 0.5 + 0.5 * pa.complexity.min(pb.complexity);
        score *= match (pa.plumbing_only, pb.plumbing_only) {
            (true, true) => 0.2,
            (true, false) | (false, true) => 0.4,
            (false, false) => 1.0,
        };
        score.clamp(0.0, 1.0)
    }
}

/// Scores every old method against its candidate new methods.
///
/// # Returns
/// At most `top_k` matches per old method with a score of at least `min_score`, grouped by old
/// key in key order and sorted by descending score (ties by new key) within a group.
pub fn match_all(
    old: &BTreeMap<MethodKey, NormalizedMethod>,
    new: &BTreeMap<MethodKey, NormalizedMethod>,
    pairing: &dyn ClassPairing,
    config: &ScoringConfig,
) -> Vec<Match<MethodKey>> {
    if old.is_empty() || new.is_empty() || config.top_k == 0 {
        return Vec::new();
    }
    let scorer = MethodScorer::new(old, new, pairing, &config.weights);

    let mut by_owner: BTreeMap<&str, Vec<&NormalizedMethod>> = BTreeMap::new();
    for m in new.values() {
        by_owner.entry(m.key.owner.as_str()).or_default().push(m);
    }
    let everything: Vec<&NormalizedMethod> = new.values().collect();

    let olds: Vec<&NormalizedMethod> = old.values().collect();
    let matches: Vec<Match<MethodKey>> = olds
        .par_iter()
        .flat_map_iter(|a| {
            let paired = pairing.pair(&a.key.owner).map(|p| p.new.as_str());
            let pool: &[&NormalizedMethod] = if config.cross_class_candidates {
                &everything
            } else {
                paired
                    .and_then(|owner| by_owner.get(owner))
                    .map(Vec::as_slice)
                    .unwrap_or(&[])
            };

            let mut ranked: Vec<Match<MethodKey>> = pool
                .iter()
                .filter(|b| {
                    same_name_shape(&a.key, &b.key) && compatible_shape(&a.descriptor, &b.descriptor)
                })
                .filter_map(|b| {
                    let mut score = scorer.score(a, b);
                    if config.cross_class_candidates && paired == Some(b.key.owner.as_str()) {
                        score = score * (1.0 - config.class_weight) + config.class_weight;
                    }
                    (score >= config.min_score).then(|| Match {
                        old: a.key.clone(),
                        new: b.key.clone(),
                        score,
                    })
                })
                .collect();
            ranked.sort_by(|x, y| y.score.total_cmp(&x.score).then_with(|| x.new.cmp(&y.new)));
            ranked.truncate(config.top_k);
            ranked
        })
        .collect();

    debug!(
        "scored {} old methods: {} candidates ({} with a candidate)",
        old.len(),
        matches.len(),
        matches
            .iter()
            .map(|m| &m.old)
            .collect::<BTreeSet<_>>()
            .len()
    );
    matches
}
