/// Module for pairing old classes with their counterparts in the new artifact.
///
/// Method candidates are restricted to the class an old method's owner is paired with, so the
/// pairing is consulted by every later stage through the [`ClassPairing`] trait. Two
/// implementations exist: [`FixedClassPairing`], an explicit table, and
/// [`StructuralClassMatcher`], which builds such a table from structural class fingerprints.
///
/// Classes whose names survived obfuscation (longer than the obfuscated name length) pair
/// with the same name. The remaining classes are compared fingerprint against fingerprint and
/// assigned greedily by descending similarity, one new class per old class.
///
/// # Usage
/// ```rust,ignore
/// let pairing = StructuralClassMatcher::new(0.3, 2).pair_artifacts(&old, &new);
/// if let Some(pair) = pairing.pair("ab") { println!("ab -> {}", pair.new); }
/// ```
use crate::similarity::{cosine, counts, jaccard, multiset_jaccard};
use rayon::prelude::*;
use remora_core::descriptor::{JavaType, MethodDescriptor};
use remora_core::{Artifact, ClassDef, ClassKind, Insn, Opcode};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// The new class an old class was paired with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassPair {
    pub new: String,
    /// Structural similarity in [0, 1]; 1.0 for fixed pairs
    pub similarity: f64,
}

/// Oracle answering "which new class corresponds to this old class?".
pub trait ClassPairing: Send + Sync + fmt::Debug {
    /// Pair for an old class name, if any.
    fn pair(&self, old: &str) -> Option<&ClassPair>;

    /// Rewrites every `Lold;` class reference of a descriptor to its paired new name.
    fn remap_descriptor(&self, desc: &str) -> String {
        let mut out = String::with_capacity(desc.len());
        let mut rest = desc;
        while let Some(start) = rest.find('L') {
            out.push_str(&rest[..=start]);
            let tail = &rest[start + 1..];
            let Some(end) = tail.find(';') else {
                out.push_str(tail);
                return out;
            };
            let name = &tail[..end];
            match self.pair(name) {
                Some(pair) => out.push_str(&pair.new),
                None => out.push_str(name),
            }
            out.push(';');
            rest = &tail[end + 1..];
        }
        out.push_str(rest);
        out
    }
}

/// An explicit old → new class table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FixedClassPairing {
    pairs: BTreeMap<String, ClassPair>,
}

impl FixedClassPairing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, old: impl Into<String>, new: impl Into<String>, similarity: f64) {
        self.pairs.insert(
            old.into(),
            ClassPair {
                new: new.into(),
                similarity,
            },
        );
    }

    /// Pairs every listed class with itself at similarity 1.0.
    pub fn identity<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut pairing = Self::new();
        for name in names {
            pairing.insert(name, name, 1.0);
        }
        pairing
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ClassPair)> + '_ {
        self.pairs.iter()
    }
}

impl ClassPairing for FixedClassPairing {
    fn pair(&self, old: &str) -> Option<&ClassPair> {
        self.pairs.get(old)
    }
}

/// Library and JDK packages whose names obfuscation leaves intact.
const STABLE_PREFIXES: &[&str] = &[
    "java/", "javax/", "sun/", "com/sun/", "jdk/", "org/w3c/", "org/xml/", "org/omg/",
];

fn is_stable_class(name: &str) -> bool {
    STABLE_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Writes a type with obfuscated class names replaced by `#`.
fn push_normalized(ty: &JavaType, out: &mut String) {
    match ty {
        JavaType::Object(name) if !is_stable_class(name) => out.push('#'),
        JavaType::Array(elem, dims) => {
            for _ in 0..*dims {
                out.push('[');
            }
            push_normalized(elem, out);
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Descriptor with obfuscated class names replaced by `#`, or `None` if it does not parse.
fn normalize_descriptor(desc: &str) -> Option<String> {
    let md = MethodDescriptor::parse(desc).ok()?;
    let mut out = String::from("(");
    for arg in &md.args {
        push_normalized(arg, &mut out);
    }
    out.push(')');
    push_normalized(&md.ret, &mut out);
    Some(out)
}

/// `true` when the descriptor mentions no obfuscated class.
fn is_stable_descriptor(md: &MethodDescriptor) -> bool {
    let stable = |t: &JavaType| match t {
        JavaType::Object(name) => is_stable_class(name),
        JavaType::Array(elem, _) => !matches!(&**elem, JavaType::Object(n) if !is_stable_class(n)),
        _ => true,
    };
    md.args.iter().all(stable) && stable(&md.ret)
}

/// Structural summary of a class that survives renaming.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassFingerprint {
    pub kind: ClassKind,
    /// JDK/library supertypes only
    pub stable_hierarchy: BTreeSet<String>,
    pub constructor_count: usize,
    pub has_static_init: bool,
    /// Method descriptors with obfuscated classes as `#`
    pub method_descriptors: BTreeMap<String, u32>,
    /// Descriptors mentioning only primitives and library classes
    pub stable_descriptors: BTreeMap<String, u32>,
    /// Normalized descriptors of static methods
    pub static_descriptors: BTreeSet<String>,
    pub opcodes: BTreeMap<Opcode, u32>,
    pub strings: BTreeSet<String>,
    /// Calls into library classes
    pub external_calls: BTreeSet<String>,
    pub static_field_types: BTreeMap<String, u32>,
    pub instance_field_types: BTreeMap<String, u32>,
    pub method_count: usize,
    pub field_count: usize,
}

impl ClassFingerprint {
    pub fn of(class: &ClassDef) -> Self {
        let mut fp = Self {
            kind: class.kind,
            stable_hierarchy: class
                .super_name
                .iter()
                .chain(&class.interfaces)
                .filter(|n| is_stable_class(n) && n.as_str() != "java/lang/Object")
                .cloned()
                .collect(),
            constructor_count: class.methods.iter().filter(|m| m.name == "<init>").count(),
            has_static_init: class.methods.iter().any(|m| m.name == "<clinit>"),
            method_descriptors: BTreeMap::new(),
            stable_descriptors: BTreeMap::new(),
            static_descriptors: BTreeSet::new(),
            opcodes: BTreeMap::new(),
            strings: BTreeSet::new(),
            external_calls: BTreeSet::new(),
            static_field_types: BTreeMap::new(),
            instance_field_types: BTreeMap::new(),
            method_count: class.methods.len(),
            field_count: class.fields.len(),
        };

        for method in &class.methods {
            if let Ok(md) = MethodDescriptor::parse(&method.desc) {
                let normalized = normalize_descriptor(&method.desc).unwrap_or_default();
                if is_stable_descriptor(&md) {
                    *fp.stable_descriptors.entry(method.desc.clone()).or_insert(0) += 1;
                }
                if method.is_static {
                    fp.static_descriptors.insert(normalized.clone());
                }
                *fp.method_descriptors.entry(normalized).or_insert(0) += 1;
            }
            if method.is_abstract {
                continue;
            }
            for insn in &method.instructions {
                if let Some(op) = insn.opcode() {
                    *fp.opcodes.entry(op).or_insert(0) += 1;
                }
                match insn {
                    Insn::Invoke {
                        owner, name, desc, ..
                    } if is_stable_class(owner) => {
                        fp.external_calls.insert(format!("{owner}.{name}{desc}"));
                    }
                    _ => {
                        if let Some(s) = insn.string_constant() {
                            fp.strings.insert(s.to_string());
                        }
                    }
                }
            }
        }

        let field_type = |desc: &str| match JavaType::parse(desc) {
            Ok(ty) => {
                let mut s = String::new();
                push_normalized(&ty, &mut s);
                s
            }
            Err(_) => desc.to_string(),
        };
        fp.static_field_types = counts(
            class
                .fields
                .iter()
                .filter(|f| f.is_static)
                .map(|f| field_type(&f.desc)),
        );
        fp.instance_field_types = counts(
            class
                .fields
                .iter()
                .filter(|f| !f.is_static)
                .map(|f| field_type(&f.desc)),
        );
        fp
    }

    /// Weighted similarity in [0, 1].
    pub fn similarity(&self, other: &Self) -> f64 {
        let ratio = |a: usize, b: usize| {
            1.0 - a.abs_diff(b) as f64 / a.max(b).max(1) as f64
        };
        let components = [
            (1.0, f64::from(u8::from(self.kind == other.kind))),
            (4.0, jaccard(&self.stable_hierarchy, &other.stable_hierarchy)),
            (3.0, multiset_jaccard(&self.stable_descriptors, &other.stable_descriptors)),
            (1.5, multiset_jaccard(&self.method_descriptors, &other.method_descriptors)),
            (2.0, cosine(&self.opcodes, &other.opcodes)),
            (3.0, jaccard(&self.external_calls, &other.external_calls)),
            (0.3, jaccard(&self.strings, &other.strings)),
            (1.5, jaccard(&self.static_descriptors, &other.static_descriptors)),
            (
                1.0,
                (multiset_jaccard(&self.static_field_types, &other.static_field_types)
                    + multiset_jaccard(&self.instance_field_types, &other.instance_field_types))
                    / 2.0,
            ),
            (0.5, ratio(self.constructor_count, other.constructor_count)),
            (0.2, f64::from(u8::from(self.has_static_init == other.has_static_init))),
        ];
        let total: f64 = components.iter().map(|(w, _)| w).sum();
        let score: f64 = components.iter().map(|(w, s)| w * s).sum::<f64>() / total;

        // very different member counts rarely pair
        let size = |a: usize, b: usize| a.min(b) as f64 / a.max(b).max(1) as f64;
        let (methods, fields) = (
            size(self.method_count, other.method_count),
            size(self.field_count.max(1), other.field_count.max(1)),
        );
        let penalty = if methods < 0.5 || fields < 0.5 {
            0.7
        } else if methods < 0.7 || fields < 0.7 {
            0.85
        } else {
            1.0
        };
        (score * penalty).clamp(0.0, 1.0)
    }
}

/// Builds a [`FixedClassPairing`] from structural fingerprints.
#[derive(Debug, Clone)]
pub struct StructuralClassMatcher {
    /// Minimum similarity for a structural pair
    pub threshold: f64,
    /// Names up to this length are treated as obfuscated
    pub max_obfuscated_name_len: usize,
}

impl StructuralClassMatcher {
    pub const fn new(threshold: f64, max_obfuscated_name_len: usize) -> Self {
        Self {
            threshold,
            max_obfuscated_name_len,
        }
    }

    fn is_obfuscated(&self, name: &str) -> bool {
        name.len() <= self.max_obfuscated_name_len
    }

    /// Pairs the classes of `old` with those of `new`.
    pub fn pair_artifacts(&self, old: &Artifact, new: &Artifact) -> FixedClassPairing {
        let mut pairing = FixedClassPairing::new();
        let mut taken: BTreeSet<&str> = BTreeSet::new();

        // readable names keep their identity
        for class in old.classes.iter().filter(|c| !self.is_obfuscated(&c.name)) {
            if new.class(&class.name).is_some() {
                pairing.insert(&class.name, &class.name, 1.0);
                taken.insert(class.name.as_str());
            }
        }

        let olds: Vec<(&str, ClassFingerprint)> = old
            .classes
            .iter()
            .filter(|c| self.is_obfuscated(&c.name))
            .map(|c| (c.name.as_str(), ClassFingerprint::of(c)))
            .collect();
        let news: Vec<(&str, ClassFingerprint)> = new
            .classes
            .iter()
            .filter(|c| self.is_obfuscated(&c.name) && !taken.contains(c.name.as_str()))
            .map(|c| (c.name.as_str(), ClassFingerprint::of(c)))
            .collect();

        let mut scored: Vec<(f64, &str, &str)> = olds
            .par_iter()
            .flat_map_iter(|(old_name, old_fp)| {
                news.iter().filter_map(move |(new_name, new_fp)| {
                    let s = old_fp.similarity(new_fp);
                    (s >= self.threshold).then_some((s, *old_name, *new_name))
                })
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| a.1.cmp(b.1))
                .then_with(|| a.2.cmp(b.2))
        });

        let mut assigned: BTreeSet<&str> = BTreeSet::new();
        for (similarity, old_name, new_name) in scored {
            if assigned.contains(old_name) || taken.contains(new_name) {
                continue;
            }
            pairing.insert(old_name, new_name, similarity);
            assigned.insert(old_name);
            taken.insert(new_name);
        }

        debug!(
            "class pairing: {} of {} old classes paired ({} structurally)",
            pairing.len(),
            old.classes.len(),
            assigned.len()
        );
        pairing
    }
}
