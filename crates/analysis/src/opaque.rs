/// Module for resolving opaque-predicate parameters.
///
/// A method whose trailing integer parameter is only ever compared against constants, with one
/// side of each comparison bailing out through a short return/throw block, takes that
/// parameter purely as an integrity check. Each guard contributes the condition under which
/// execution continues into the real body; the conditions are folded into an interval plus an
/// exclusion set over the parameter's declared width, and the smallest admissible value is the
/// method's garbage value.
///
/// This is interval arithmetic, not a general constraint solver: several `==` guards
/// with different constants make the method unsatisfiable rather than being reconciled.
///
/// # Usage
/// ```rust,ignore
/// if let Some(value) = resolve(&method) {
///     println!("{} passes with {value}", method.name);
/// }
/// ```
use remora_core::artifact::label_positions;
use remora_core::descriptor::MethodDescriptor;
use remora_core::detection::{find_guard_compares, GuardCompare, EARLY_EXIT_WINDOW};
use remora_core::insn::next_real;
use remora_core::{Artifact, Insn, LabelId, MethodDef, MethodKey, Opcode};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Exception type thrown by integrity-check failure blocks.
pub const GUARD_EXCEPTION: &str = "java/lang/IllegalStateException";

/// Relation between the parameter and a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Relation {
    /// Relation tested by a conditional jump, with the parameter as left operand.
    pub const fn of_jump(opcode: Opcode) -> Option<Self> {
        Some(match opcode {
            Opcode::IFEQ | Opcode::IF_ICMPEQ => Self::Eq,
            Opcode::IFNE | Opcode::IF_ICMPNE => Self::Ne,
            Opcode::IFLT | Opcode::IF_ICMPLT => Self::Lt,
            Opcode::IFLE | Opcode::IF_ICMPLE => Self::Le,
            Opcode::IFGT | Opcode::IF_ICMPGT => Self::Gt,
            Opcode::IFGE | Opcode::IF_ICMPGE => Self::Ge,
            _ => return None,
        })
    }

    pub const fn negate(self) -> Self {
        match self {
            Self::Eq => Self::Ne,
            Self::Ne => Self::Eq,
            Self::Lt => Self::Ge,
            Self::Le => Self::Gt,
            Self::Gt => Self::Le,
            Self::Ge => Self::Lt,
        }
    }

    /// Swaps the operands: `c < p` becomes `p > c`.
    pub const fn flip(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
            other => other,
        }
    }
}

/// Interval and exclusion set over the admissible parameter values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub min: i64,
    pub max: i64,
    pub excluded: BTreeSet<i64>,
}

impl Constraint {
    pub fn new(min: i64, max: i64) -> Self {
        Self {
            min,
            max,
            excluded: BTreeSet::new(),
        }
    }

    /// Narrows the constraint with `param <rel> value`.
    pub fn apply(&mut self, rel: Relation, value: i64) {
        match rel {
            Relation::Eq => {
                self.min = self.min.max(value);
                self.max = self.max.min(value);
            }
            Relation::Ne => {
                self.excluded.insert(value);
            }
            Relation::Lt => self.max = self.max.min(value.saturating_sub(1)),
            Relation::Le => self.max = self.max.min(value),
            Relation::Gt => self.min = self.min.max(value.saturating_add(1)),
            Relation::Ge => self.min = self.min.max(value),
        }
    }

    /// Smallest value in range that is not excluded.
    pub fn smallest(&self) -> Option<i64> {
        let mut candidate = self.min;
        while candidate <= self.max {
            if !self.excluded.contains(&candidate) {
                return Some(candidate);
            }
            candidate = candidate.checked_add(1)?;
        }
        None
    }
}

/// Condition under which execution continues past one guard.
///
/// The failure side is the one whose early exit throws; when both or neither throw, the
/// jump target is taken as the failure side.
fn passing_relation(
    insns: &[Insn],
    guard: &GuardCompare,
    labels: &HashMap<LabelId, usize>,
) -> Option<Relation> {
    let rel = Relation::of_jump(guard.opcode)?;
    let rel = if guard.param_first { rel } else { rel.flip() };
    let taken = labels
        .get(&guard.target)
        .and_then(|&start| first_exit(insns, start));
    let fallthrough = next_real(insns, guard.jump).and_then(|i| first_exit(insns, i));
    match (taken, fallthrough) {
        (Some(t), Some(Opcode::ATHROW)) if t != Opcode::ATHROW => Some(rel),
        (Some(_), _) => Some(rel.negate()),
        (None, Some(_)) => Some(rel),
        (None, None) => None,
    }
}

fn first_exit(insns: &[Insn], start: usize) -> Option<Opcode> {
    insns[start..]
        .iter()
        .take(EARLY_EXIT_WINDOW)
        .find_map(|insn| insn.opcode().filter(|op| op.is_exit()))
}

/// Trailing-parameter facts for one method.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Trailing {
    index: usize,
    slot: u16,
    range: (i64, i64),
}

fn trailing(method: &MethodDef, md: &MethodDescriptor) -> Option<Trailing> {
    let index = md.args.len().checked_sub(1)?;
    let range = md.args[index].int_range()?;
    let slot = u16::try_from(md.arg_slot(index, method.is_static)).ok()?;
    Some(Trailing { index, slot, range })
}

/// `true` when every access to `slot` is the load of a guard comparison.
fn only_compared(insns: &[Insn], slot: u16, guards: &[GuardCompare]) -> bool {
    let loads: BTreeSet<usize> = guards.iter().map(|g| g.load).collect();
    insns
        .iter()
        .enumerate()
        .filter(|(_, insn)| insn.var_slot() == Some(slot))
        .all(|(i, _)| loads.contains(&i))
}

/// Computes a value for the trailing parameter that passes every guard.
///
/// `None` when the trailing parameter is not an integral type, is used for anything other
/// than guard comparisons, no guard gates an early exit, or the guards are unsatisfiable.
pub fn resolve(method: &MethodDef) -> Option<i64> {
    let md = method.descriptor().ok()?;
    let Trailing { slot, range, .. } = trailing(method, &md)?;
    let insns = &method.instructions;
    let guards = find_guard_compares(insns, slot);
    if guards.is_empty() || !only_compared(insns, slot, &guards) {
        return None;
    }

    let labels = label_positions(insns);
    let mut constraint = Constraint::new(range.0, range.1);
    let mut constrained = false;
    for guard in &guards {
        if let Some(rel) = passing_relation(insns, guard, &labels) {
            constraint.apply(rel, guard.value);
            constrained = true;
        }
    }
    if !constrained {
        return None;
    }
    constraint.smallest()
}

/// Index of the trailing parameter when it is integral and only ever compared against
/// constants, including when it is never read at all.
pub fn opaque_parameter(method: &MethodDef) -> Option<usize> {
    if method.is_abstract {
        return None;
    }
    let md = method.descriptor().ok()?;
    let t = trailing(method, &md)?;
    let guards = find_guard_compares(&method.instructions, t.slot);
    only_compared(&method.instructions, t.slot, &guards).then_some(t.index)
}

/// `true` when the body builds and throws an `IllegalStateException`.
pub fn throws_guard_exception(method: &MethodDef) -> bool {
    let insns = &method.instructions;
    insns.iter().enumerate().any(|(i, insn)| {
        let Insn::TypeOp {
            opcode: Opcode::NEW,
            desc,
        } = insn
        else {
            return false;
        };
        if desc != GUARD_EXCEPTION {
            return false;
        }
        // NEW, DUP, [message args], INVOKESPECIAL <init>, ATHROW
        let mut at = i;
        for _ in 0..6 {
            let Some(next) = next_real(insns, at) else {
                return false;
            };
            at = next;
            if let Insn::Invoke {
                opcode: Opcode::INVOKESPECIAL,
                owner,
                name,
                ..
            } = &insns[at]
            {
                return owner == GUARD_EXCEPTION
                    && name == "<init>"
                    && next_real(insns, at)
                        .is_some_and(|t| insns[t].opcode() == Some(Opcode::ATHROW));
            }
        }
        false
    })
}

/// Garbage classification of one method body.
pub fn classify_garbage(method: &MethodDef) -> bool {
    throws_guard_exception(method) || opaque_parameter(method).is_some()
}

/// Per-artifact results of the opaque-predicate analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpaqueAnalysis {
    /// Methods classified as carrying obfuscation garbage
    pub garbage: BTreeSet<MethodKey>,
    /// Argument positions that carry no information, per method
    pub opaque_params: BTreeMap<MethodKey, BTreeSet<usize>>,
    /// Passing value for the trailing parameter, per resolvable method
    pub values: BTreeMap<MethodKey, i64>,
}

impl OpaqueAnalysis {
    pub fn has_garbage(&self, key: &MethodKey) -> bool {
        self.garbage.contains(key)
    }

    pub fn value(&self, key: &MethodKey) -> Option<i64> {
        self.values.get(key).copied()
    }
}

/// Runs classification and resolution over every method of `universe`.
pub fn analyze(artifact: &Artifact, universe: &BTreeSet<MethodKey>) -> OpaqueAnalysis {
    let mut out = OpaqueAnalysis::default();
    for key in universe {
        let Some(method) = artifact.method(key) else {
            continue;
        };
        if classify_garbage(method) {
            out.garbage.insert(key.clone());
        }
        if let Some(index) = opaque_parameter(method) {
            out.opaque_params.insert(key.clone(), BTreeSet::from([index]));
        }
        if let Some(value) = resolve(method) {
            out.values.insert(key.clone(), value);
        }
    }
    debug!(
        "opaque predicates: {} garbage methods, {} opaque parameters, {} resolved",
        out.garbage.len(),
        out.opaque_params.len(),
        out.values.len()
    );
    out
}
