//! Field read/write index.
//!
//! For every field of an artifact, which methods of a universe read it (`GETFIELD`/`GETSTATIC`)
//! and which write it (`PUTFIELD`/`PUTSTATIC`). Access sites naming a subclass as owner are
//! resolved to the declaring class through the superclass chain.
//!
//! Each field also gets an [`AccessProfile`]: what the surrounding instructions do with the
//! value read or written, and the role (counter, flag, index, ...) that suggests.

use remora_core::insn::{next_real, prev_real};
use remora_core::{Artifact, FieldKey, Insn, MethodKey, Opcode};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

static NO_METHODS: BTreeSet<MethodKey> = BTreeSet::new();
static NO_FIELDS: BTreeSet<FieldKey> = BTreeSet::new();
static NO_PROFILE: AccessProfile = AccessProfile {
    counts: BTreeMap::new(),
    reader_methods: 0,
    writer_methods: 0,
    role: FieldRole::NONE,
};

/// Context of one field access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessKind {
    Read,
    Write,
    /// `GET f; ICONST_1; IADD; PUT f`
    Increment,
    /// `GET f; ICONST_1; ISUB; PUT f`
    Decrement,
    /// read straight into an arithmetic instruction
    Arithmetic,
    /// read straight into a numeric comparison
    Comparison,
    /// read straight into an array load
    ArrayIndex,
    /// read straight into `IFEQ`/`IFNE`
    BooleanCheck,
    /// written straight from a constant
    ConstantStore,
}

/// Roles a field's access profile suggests. Several can hold at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldRole {
    pub counter: bool,
    pub flag: bool,
    pub index: bool,
    pub constant: bool,
    pub multiplier: bool,
}

impl FieldRole {
    const NONE: Self = Self {
        counter: false,
        flag: false,
        index: false,
        constant: false,
        multiplier: false,
    };
}

/// How one field is accessed across the universe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessProfile {
    pub counts: BTreeMap<AccessKind, u32>,
    /// distinct methods reading the field
    pub reader_methods: usize,
    /// distinct methods writing the field
    pub writer_methods: usize,
    pub role: FieldRole,
}

impl AccessProfile {
    pub fn count(&self, kind: AccessKind) -> u32 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    fn bump(&mut self, kind: AccessKind) {
        *self.counts.entry(kind).or_insert(0) += 1;
    }

    /// Derives [`Self::role`] from the counts. Divisions truncate.
    fn classify(&mut self, desc: &str) {
        use AccessKind::*;
        let reads = self.count(Read);
        let writes = self.count(Write);
        self.role = FieldRole {
            counter: writes > 0 && self.count(Increment) + self.count(Decrement) > writes / 2,
            flag: self.count(BooleanCheck) > reads / 2 || (desc == "Z" && self.count(Comparison) > 0),
            index: self.count(ArrayIndex) > reads / 3,
            constant: self.writer_methods <= 1 && reads > writes * 3,
            multiplier: self.count(Arithmetic) > reads / 2 && matches!(desc, "I" | "J"),
        };
    }

    /// Similarity in `[0, 1]` from shared roles, access-count overlap and the
    /// reader/writer method ratio.
    pub fn similarity(&self, other: &AccessProfile) -> f64 {
        let (a, b) = (self.role, other.role);
        let mut score = 0.0;
        let mut weight = 0.0;
        for (x, y, w) in [
            (a.counter, b.counter, 2.0),
            (a.flag, b.flag, 2.0),
            (a.index, b.index, 2.0),
            (a.constant, b.constant, 1.5),
            (a.multiplier, b.multiplier, 1.5),
        ] {
            if x && y {
                score += w;
                weight += w;
            } else if x || y {
                weight += w / 2.0;
            }
        }

        score += count_overlap(&self.counts, &other.counts) * 3.0;
        weight += 3.0;

        let ratio = |p: &AccessProfile| p.reader_methods as f64 / p.writer_methods.max(1) as f64;
        score += 1.0 / (1.0 + (ratio(self) - ratio(other)).abs());
        weight += 1.0;

        score / weight
    }
}

/// `1 - Σ|a-b| / (2 Σ max(a,b))` over every kind seen on either side; 1 when both are empty.
fn count_overlap(a: &BTreeMap<AccessKind, u32>, b: &BTreeMap<AccessKind, u32>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let kinds: BTreeSet<&AccessKind> = a.keys().chain(b.keys()).collect();
    let (mut diff, mut total) = (0.0, 0.0);
    for kind in kinds {
        let x = f64::from(a.get(kind).copied().unwrap_or(0));
        let y = f64::from(b.get(kind).copied().unwrap_or(0));
        total += x.max(y);
        diff += (x - y).abs();
    }
    if total > 0.0 {
        1.0 - diff / (2.0 * total)
    } else {
        0.0
    }
}

/// `GET f; ICONST_1|LCONST_1; <step>; PUT f` ending at the `PUT` at `at`.
fn is_step(insns: &[Insn], at: usize, steps: [Opcode; 2]) -> bool {
    let Insn::Field { owner, name, .. } = &insns[at] else {
        return false;
    };
    let Some(op) = prev_real(insns, at) else {
        return false;
    };
    let Some(one) = prev_real(insns, op) else {
        return false;
    };
    let Some(get) = prev_real(insns, one) else {
        return false;
    };
    let stepped = insns[op].opcode().is_some_and(|o| steps.contains(&o));
    let by_one = matches!(
        insns[one].opcode(),
        Some(Opcode::ICONST_1 | Opcode::LCONST_1)
    );
    let same_field = matches!(
        &insns[get],
        Insn::Field { owner: o, name: n, .. } if o == owner && n == name
    );
    stepped && by_one && same_field
}

/// Records the access at `at` into `profile`.
fn profile_access(profile: &mut AccessProfile, insns: &[Insn], at: usize, opcode: Opcode) {
    match opcode {
        Opcode::GETFIELD | Opcode::GETSTATIC => {
            profile.bump(AccessKind::Read);
            let Some(next) = next_real(insns, at).and_then(|i| insns[i].opcode()) else {
                return;
            };
            if next.is_array_load() {
                profile.bump(AccessKind::ArrayIndex);
            }
            if next.is_numeric_compare() {
                profile.bump(AccessKind::Comparison);
            }
            if matches!(next, Opcode::IFEQ | Opcode::IFNE) {
                profile.bump(AccessKind::BooleanCheck);
            }
            if next.is_arithmetic() {
                profile.bump(AccessKind::Arithmetic);
            }
        }
        Opcode::PUTFIELD | Opcode::PUTSTATIC => {
            profile.bump(AccessKind::Write);
            if is_step(insns, at, [Opcode::IADD, Opcode::LADD]) {
                profile.bump(AccessKind::Increment);
            } else if is_step(insns, at, [Opcode::ISUB, Opcode::LSUB]) {
                profile.bump(AccessKind::Decrement);
            }
            let constant = prev_real(insns, at).is_some_and(|i| match &insns[i] {
                Insn::Ldc { .. } => true,
                insn => matches!(
                    insn.opcode(),
                    Some(
                        Opcode::ICONST_M1
                            | Opcode::ICONST_0
                            | Opcode::ICONST_1
                            | Opcode::ICONST_2
                            | Opcode::ICONST_3
                            | Opcode::ICONST_4
                            | Opcode::ICONST_5
                    )
                ),
            });
            if constant {
                profile.bump(AccessKind::ConstantStore);
            }
        }
        _ => {}
    }
}

#[derive(Debug, Clone, Default)]
pub struct FieldUsage {
    readers: BTreeMap<FieldKey, BTreeSet<MethodKey>>,
    writers: BTreeMap<FieldKey, BTreeSet<MethodKey>>,
    /// total GET/PUT sites per field
    accesses: BTreeMap<FieldKey, usize>,
    /// fields touched per method
    touched: BTreeMap<MethodKey, BTreeSet<FieldKey>>,
    profiles: BTreeMap<FieldKey, AccessProfile>,
}

/// Resolves a field reference to the class that declares it.
pub fn resolve_field(artifact: &Artifact, owner: &str, name: &str, desc: &str) -> Option<FieldKey> {
    let mut current = artifact.class(owner);
    // bounded by the class count so a cyclic hierarchy cannot spin
    for _ in 0..=artifact.classes.len() {
        let class = current?;
        if class.fields.iter().any(|f| f.name == name && f.desc == desc) {
            return Some(FieldKey::new(&class.name, name, desc));
        }
        current = class.super_name.as_deref().and_then(|s| artifact.class(s));
    }
    None
}

impl FieldUsage {
    /// Indexes the field accesses of every method in `universe`.
    pub fn index(artifact: &Artifact, universe: &BTreeSet<MethodKey>) -> Self {
        let mut usage = Self::default();
        for key in universe {
            let Some(method) = artifact.method(key) else {
                continue;
            };
            let insns = &method.instructions;
            for (i, insn) in insns.iter().enumerate() {
                let Insn::Field {
                    opcode,
                    owner,
                    name,
                    desc,
                } = insn
                else {
                    continue;
                };
                let Some(field) = resolve_field(artifact, owner, name, desc) else {
                    continue;
                };
                let sink = match opcode {
                    Opcode::GETFIELD | Opcode::GETSTATIC => &mut usage.readers,
                    Opcode::PUTFIELD | Opcode::PUTSTATIC => &mut usage.writers,
                    _ => continue,
                };
                sink.entry(field.clone()).or_default().insert(key.clone());
                *usage.accesses.entry(field.clone()).or_insert(0) += 1;
                profile_access(
                    usage.profiles.entry(field.clone()).or_default(),
                    insns,
                    i,
                    *opcode,
                );
                usage.touched.entry(key.clone()).or_default().insert(field);
            }
        }

        for (field, profile) in &mut usage.profiles {
            profile.reader_methods = usage.readers.get(field).map_or(0, BTreeSet::len);
            profile.writer_methods = usage.writers.get(field).map_or(0, BTreeSet::len);
            profile.classify(&field.desc);
        }
        debug!(
            "field usage: {} fields read, {} written",
            usage.readers.len(),
            usage.writers.len()
        );
        usage
    }

    pub fn readers(&self, field: &FieldKey) -> &BTreeSet<MethodKey> {
        self.readers.get(field).unwrap_or(&NO_METHODS)
    }

    pub fn writers(&self, field: &FieldKey) -> &BTreeSet<MethodKey> {
        self.writers.get(field).unwrap_or(&NO_METHODS)
    }

    /// Readers and writers together.
    pub fn users(&self, field: &FieldKey) -> BTreeSet<MethodKey> {
        self.readers(field)
            .union(self.writers(field))
            .cloned()
            .collect()
    }

    /// Number of access sites across the universe.
    pub fn access_count(&self, field: &FieldKey) -> usize {
        self.accesses.get(field).copied().unwrap_or(0)
    }

    /// Access profile of `field`; empty for fields nothing in the universe touches.
    pub fn profile(&self, field: &FieldKey) -> &AccessProfile {
        self.profiles.get(field).unwrap_or(&NO_PROFILE)
    }

    /// Fields accessed by `method`.
    pub fn touched_by(&self, method: &MethodKey) -> &BTreeSet<FieldKey> {
        self.touched.get(method).unwrap_or(&NO_FIELDS)
    }

    /// Other fields accessed by any user of `field`.
    pub fn siblings(&self, field: &FieldKey) -> BTreeSet<FieldKey> {
        let mut siblings: BTreeSet<FieldKey> = self
            .users(field)
            .iter()
            .flat_map(|m| self.touched_by(m).iter().cloned())
            .collect();
        siblings.remove(field);
        siblings
    }
}
