//! Field matching.
//!
//! Fields carry almost no structure of their own, so a field pair is judged mostly by who
//! touches it: the methods reading or writing an old field, translated through the resolved
//! method mapping, should be the methods touching its counterpart. Type, modifiers, owner,
//! co-occurring fields, declaration order and the access profile fill in the rest.

use crate::classes::ClassPairing;
use crate::config::FieldConfig;
use crate::refine::MethodMapping;
use crate::similarity::jaccard;
use crate::Match;
use rayon::prelude::*;
use remora_analysis::{AccessProfile, FieldUsage};
use remora_core::descriptor::JavaType;
use remora_core::{Artifact, FieldDef, FieldKey, MethodKey};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub type FieldMapping = BTreeMap<FieldKey, FieldKey>;

/// One artifact's fields together with their usage index.
#[derive(Debug, Clone, Copy)]
pub struct FieldSide<'a> {
    pub artifact: &'a Artifact,
    pub usage: &'a FieldUsage,
}

/// Precomputed per-field facts.
struct FieldInfo<'a> {
    key: FieldKey,
    def: &'a FieldDef,
    ty: Option<JavaType>,
    /// declaration index and field count of the owning class
    index: usize,
    declared: usize,
    users: BTreeSet<MethodKey>,
    siblings: BTreeSet<FieldKey>,
    profile: &'a AccessProfile,
}

impl<'a> FieldSide<'a> {
    fn infos(&self) -> Vec<FieldInfo<'a>> {
        let usage = self.usage;
        self.artifact
            .classes
            .iter()
            .flat_map(|class| {
                let declared = class.fields.len();
                class.fields.iter().enumerate().map(move |(index, def)| {
                    let key = def.key(&class.name);
                    FieldInfo {
                        ty: JavaType::parse(&def.desc).ok(),
                        users: usage.users(&key),
                        siblings: usage.siblings(&key),
                        profile: usage.profile(&key),
                        key,
                        def,
                        index,
                        declared,
                    }
                })
            })
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Components {
    ty: f64,
    modifiers: f64,
    owner: f64,
    usage: f64,
    cooccur: f64,
    proximity: f64,
    pattern: f64,
    profile: f64,
}

impl Components {
    fn weighted(&self, is_static: bool, is_primitive: bool) -> f64 {
        let score = if is_primitive {
            self.ty * 0.10
                + self.modifiers * 0.05
                + self.owner * 0.20
                + self.usage * 0.30
                + self.cooccur * 0.08
                + self.proximity * 0.05
                + self.pattern * 0.07
                + self.profile * 0.15
        } else if is_static {
            self.ty * 0.20
                + self.modifiers * 0.10
                + self.owner * 0.15
                + self.usage * 0.35
                + self.cooccur * 0.10
                + self.profile * 0.10
        } else {
            self.ty * 0.18
                + self.modifiers * 0.05
                + self.owner * 0.28
                + self.usage * 0.27
                + self.cooccur * 0.10
                + self.proximity * 0.05
                + self.profile * 0.07
        };
        score.clamp(0.0, 1.0)
    }
}

fn primitive_partial(a: &JavaType, b: &JavaType) -> f64 {
    use JavaType::*;
    match (a, b) {
        (Int, Long) | (Long, Int) | (Float, Double) | (Double, Float) => 0.05,
        (Byte | Short, Int) | (Int, Byte | Short) => 0.02,
        (Boolean, Byte | Int) | (Byte | Int, Boolean) => 0.01,
        _ => 0.001,
    }
}

/// Access-profile similarity. For primitives, a shared counter, flag, index or constant role
/// adds a bonus and a counter on one side only halves the score.
fn profile_score(old: &AccessProfile, new: &AccessProfile, is_primitive: bool) -> f64 {
    let score = old.similarity(new);
    if !is_primitive {
        return score;
    }
    let (a, b) = (old.role, new.role);
    let bonus = if (a.counter && b.counter) || (a.flag && b.flag) {
        0.3
    } else if a.index && b.index {
        0.25
    } else if a.constant && b.constant {
        0.2
    } else {
        0.0
    };
    let score = (score + bonus).min(1.0);
    if a.counter != b.counter {
        score * 0.5
    } else {
        score
    }
}

/// Type agreement, or `None` when the pair is impossible.
fn type_score(
    old: &FieldInfo<'_>,
    new: &FieldInfo<'_>,
    pairing: &dyn ClassPairing,
) -> Option<f64> {
    let (Some(a), Some(b)) = (&old.ty, &new.ty) else {
        return (old.def.desc == new.def.desc).then_some(1.0);
    };
    if pairing.remap_descriptor(&old.def.desc) == new.def.desc {
        return Some(if a.is_primitive() || (old.def.is_final && new.def.is_final) {
            1.0
        } else {
            0.95
        });
    }
    match (a, b) {
        (a, b) if a.is_primitive() && b.is_primitive() => Some(primitive_partial(a, b)),
        (JavaType::Object(name), JavaType::Object(_)) => {
            // a mapped class that still disagrees is stronger evidence against
            Some(if pairing.pair(name).is_some() { 0.2 } else { 0.4 })
        }
        (JavaType::Array(ea, da), JavaType::Array(eb, db)) => Some(if da != db {
            0.2
        } else if pairing.remap_descriptor(&ea.to_string()) == eb.to_string() {
            0.9
        } else {
            0.3
        }),
        (JavaType::Array(..), JavaType::Object(_)) | (JavaType::Object(_), JavaType::Array(..)) => {
            Some(0.2)
        }
        _ => None,
    }
}

struct FieldScorer<'a> {
    methods: &'a MethodMapping,
    pairing: &'a dyn ClassPairing,
}

impl FieldScorer<'_> {
    fn translated_users(&self, old: &FieldInfo<'_>) -> BTreeSet<MethodKey> {
        old.users
            .iter()
            .filter_map(|m| self.methods.get(m).cloned())
            .collect()
    }

    fn score(
        &self,
        old: &FieldInfo<'_>,
        translated: &BTreeSet<MethodKey>,
        new: &FieldInfo<'_>,
    ) -> Option<f64> {
        let ty = type_score(old, new, self.pairing)?;
        let (od, nd) = (old.def, new.def);
        let paired_owner = self
            .pairing
            .pair(&old.key.owner)
            .filter(|p| p.new == new.key.owner);
        let both_instance = !od.is_static && !nd.is_static;

        let modifiers = (f64::from(u8::from(od.is_static == nd.is_static))
            + 0.5 * f64::from(u8::from(od.is_final == nd.is_final)))
            / 1.5;

        let owner = match paired_owner {
            Some(pair) if both_instance => pair.similarity,
            Some(pair) => pair.similarity * 0.6,
            None if both_instance => -0.2,
            None => 0.0,
        };

        let usage = if translated.is_empty() && new.users.is_empty() {
            0.0
        } else {
            let u = jaccard(translated, &new.users);
            if u > 0.5 && old.users.len() == new.users.len() {
                (u + 0.1).min(1.0)
            } else {
                u
            }
        };

        let cooccur = match (old.siblings.is_empty(), new.siblings.is_empty()) {
            (true, true) => 0.5,
            (true, false) | (false, true) => 0.0,
            _ => {
                let new_descs: BTreeSet<&str> =
                    new.siblings.iter().map(|f| f.desc.as_str()).collect();
                let hits = old
                    .siblings
                    .iter()
                    .filter(|f| new_descs.contains(self.pairing.remap_descriptor(&f.desc).as_str()))
                    .count();
                hits as f64 / old.siblings.len().max(new.siblings.len()) as f64
            }
        };

        let proximity = if paired_owner.is_some() {
            let rel = |f: &FieldInfo<'_>| f.index as f64 / f.declared.saturating_sub(1).max(1) as f64;
            (1.0 - 2.0 * (rel(old) - rel(new)).abs()).max(0.0)
        } else {
            0.0
        };

        let is_primitive = old.ty.as_ref().is_some_and(JavaType::is_primitive);
        let pattern = if is_primitive {
            let (a, b) = (old.users.len(), new.users.len());
            if a.max(b) == 0 {
                0.0
            } else {
                a.min(b) as f64 / a.max(b) as f64 * 0.5
            }
        } else {
            0.0
        };

        let profile = profile_score(old.profile, new.profile, is_primitive);

        let components = Components {
            ty,
            modifiers,
            owner,
            usage,
            cooccur,
            proximity,
            pattern,
            profile,
        };
        Some(components.weighted(od.is_static, is_primitive))
    }
}

/// Scores every (old, new) field pair and keeps the `top_k` best candidates per old field.
///
/// Output is grouped by old field in key order, best candidate first; ties order by new key.
pub fn match_all(
    old: FieldSide<'_>,
    new: FieldSide<'_>,
    methods: &MethodMapping,
    pairing: &dyn ClassPairing,
    top_k: usize,
) -> Vec<Match<FieldKey>> {
    let mut olds = old.infos();
    olds.sort_by(|a, b| a.key.cmp(&b.key));
    let news = new.infos();
    let scorer = FieldScorer { methods, pairing };

    let matches: Vec<Match<FieldKey>> = olds
        .par_iter()
        .flat_map_iter(|o| {
            let translated = scorer.translated_users(o);
            let mut found: Vec<Match<FieldKey>> = news
                .iter()
                .filter_map(|n| {
                    scorer.score(o, &translated, n).map(|score| Match {
                        old: o.key.clone(),
                        new: n.key.clone(),
                        score,
                    })
                })
                .collect();
            found.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.new.cmp(&b.new)));
            found.truncate(top_k);
            found
        })
        .collect();

    debug!(
        "field candidates: {} old fields, {} new fields, {} pairs kept",
        olds.len(),
        news.len(),
        matches.len()
    );
    matches
}

/// Picks one new field per old field, injectively.
///
/// Pairs at or above `threshold` are taken best first; a field whose best candidate was
/// claimed by a stronger pair falls back to its next free candidate.
pub fn select_best(matches: &[Match<FieldKey>], threshold: f64) -> FieldMapping {
    let mut ranked: Vec<&Match<FieldKey>> =
        matches.iter().filter(|m| m.score >= threshold).collect();
    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.old.cmp(&b.old))
            .then_with(|| a.new.cmp(&b.new))
    });

    let mut mapping = FieldMapping::new();
    let mut taken: BTreeSet<&FieldKey> = BTreeSet::new();
    for m in ranked {
        if mapping.contains_key(&m.old) || taken.contains(&m.new) {
            continue;
        }
        taken.insert(&m.new);
        mapping.insert(m.old.clone(), m.new.clone());
    }
    mapping
}

/// [`match_all`] followed by [`select_best`] with the configured limits.
pub fn match_fields(
    old: FieldSide<'_>,
    new: FieldSide<'_>,
    methods: &MethodMapping,
    pairing: &dyn ClassPairing,
    config: &FieldConfig,
) -> FieldMapping {
    let candidates = match_all(old, new, methods, pairing, config.top_k);
    let mapping = select_best(&candidates, config.field_threshold);
    debug!("{} fields mapped", mapping.len());
    mapping
}
