/// Module for detecting opaque-predicate guard branches in method bodies.
///
/// Obfuscators append an extra trailing integer parameter to many methods and test it against
/// a constant at the top of the body, bailing out through a short return/throw block when the
/// test fails. Real callers always pass a passing value, so the parameter carries no
/// information. This module recognises the comparisons (`ILOAD p; const; IF_ICMPxx`,
/// `const; ILOAD p; IF_ICMPxx`, `ILOAD p; IFxx`) and the early-exit blocks they jump to.
///
/// # Usage
/// ```rust,ignore
/// let md = method.descriptor()?;
/// let slot = md.arg_slot(md.args.len() - 1, method.is_static) as u16;
/// let excluded = find_guard_instructions(&method.instructions, slot);
/// ```
use crate::artifact::label_positions;
use crate::insn::{next_real, prev_real, Insn, LabelId};
use crate::Opcode;
use std::collections::{BTreeSet, HashMap};

/// Maximum number of instructions walked from a jump target looking for the exit.
pub const EARLY_EXIT_WINDOW: usize = 12;

/// One comparison of a parameter slot against a constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardCompare {
    /// index of the `ILOAD`
    pub load: usize,
    /// index of the constant, `None` for implicit zero compares
    pub constant: Option<usize>,
    /// index of the conditional jump
    pub jump: usize,
    /// the jump opcode
    pub opcode: Opcode,
    /// the constant compared against
    pub value: i64,
    /// `true` when the parameter is the left operand
    pub param_first: bool,
    /// label the jump transfers to when the comparison holds
    pub target: LabelId,
}

/// Recognises a comparison rooted at the `ILOAD slot` at index `load`.
pub fn guard_compare_at(insns: &[Insn], load: usize, slot: u16) -> Option<GuardCompare> {
    if insns.get(load)?.iload_slot() != Some(slot) {
        return None;
    }
    let next = next_real(insns, load)?;

    if let Insn::Jump { opcode, target } = &insns[next] {
        if opcode.is_zero_compare() {
            return Some(GuardCompare {
                load,
                constant: None,
                jump: next,
                opcode: *opcode,
                value: 0,
                param_first: true,
                target: *target,
            });
        }
    }

    if let Some(value) = insns[next].int_constant() {
        let after = next_real(insns, next)?;
        if let Insn::Jump { opcode, target } = &insns[after] {
            if opcode.is_int_compare() {
                return Some(GuardCompare {
                    load,
                    constant: Some(next),
                    jump: after,
                    opcode: *opcode,
                    value,
                    param_first: true,
                    target: *target,
                });
            }
        }
        return None;
    }

    let prev = prev_real(insns, load)?;
    let value = insns[prev].int_constant()?;
    match &insns[next] {
        Insn::Jump { opcode, target } if opcode.is_int_compare() => Some(GuardCompare {
            load,
            constant: Some(prev),
            jump: next,
            opcode: *opcode,
            value,
            param_first: false,
            target: *target,
        }),
        _ => None,
    }
}

/// Every comparison of `slot` against a constant, in instruction order.
pub fn find_guard_compares(insns: &[Insn], slot: u16) -> Vec<GuardCompare> {
    (0..insns.len())
        .filter_map(|i| guard_compare_at(insns, i, slot))
        .collect()
}

/// The block starting at `target` if it reaches a return or throw within the window.
///
/// Returns the inclusive index range of the block.
pub fn early_exit_block(
    insns: &[Insn],
    labels: &HashMap<LabelId, usize>,
    target: LabelId,
) -> Option<(usize, usize)> {
    let start = *labels.get(&target)?;
    (start..insns.len())
        .take(EARLY_EXIT_WINDOW)
        .find(|&i| insns[i].is_exit())
        .map(|end| (start, end))
}

/// Instruction indices belonging to equality guards on `slot` that bail out early.
///
/// Covers the load, the constant, the jump and the whole early-exit block. Ordering guards
/// (`IF_ICMPLT`, `IFGE`, ...) stay in the body.
pub fn find_guard_instructions(insns: &[Insn], slot: u16) -> BTreeSet<usize> {
    let labels = label_positions(insns);
    let mut excluded = BTreeSet::new();
    let guards = find_guard_compares(insns, slot)
        .into_iter()
        .filter(|g| g.opcode.is_equality_compare());
    for guard in guards {
        let Some((start, end)) = early_exit_block(insns, &labels, guard.target) else {
            continue;
        };
        excluded.insert(guard.load);
        excluded.insert(guard.jump);
        if let Some(c) = guard.constant {
            excluded.insert(c);
        }
        excluded.extend(start..=end);
    }
    excluded
}
