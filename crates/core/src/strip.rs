/// Module for stripping the whole-body exception wrapper obfuscators put around method bodies.
///
/// The wrapper has the shape
///
/// ```text
/// L0:  <body>             ; protected region, ends in a return or throw
/// L1:
/// L2:  ASTORE n           ; optional
///      ALOAD n
///      LDC "ab.c(I)V"     ; signature string of the wrapped method
///      INVOKESTATIC helper(Ljava/lang/Throwable;Ljava/lang/String;)L...;
///      ATHROW
/// TRYCATCH L0 L1 L2 java/lang/RuntimeException
/// ```
///
/// When a method consists of exactly that, the body is replaced by the protected region and the
/// handler is dropped. Otherwise every wrapper-shaped handler is reported as noise so
/// fingerprinting can ignore its instructions and signature string.
///
/// # Usage
/// ```rust,ignore
/// let mut method = artifact.method(&key).unwrap().clone();
/// let report = strip_wrapper(&mut method);
/// assert!(method.try_catch.is_empty());
/// assert!(!strip_wrapper(&mut method).stripped);
/// ```
use crate::artifact::{label_positions, MethodDef};
use crate::insn::{next_real, Insn, TryCatch};
use crate::Opcode;
use std::collections::BTreeSet;

/// Exception type caught by the wrapper.
pub const WRAPPER_EXCEPTION: &str = "java/lang/RuntimeException";

/// Argument list of the helper the handler calls before rethrowing.
const HELPER_ARGS: &str = "(Ljava/lang/Throwable;Ljava/lang/String;)";

/// A handler matching the wrapper shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperHandler {
    /// index of the handler label
    pub start: usize,
    /// index of the closing `ATHROW`
    pub athrow: usize,
    /// signature string pushed by the handler
    pub signature: String,
}

/// Noise contributed by wrapper handlers that could not be unwrapped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrapperNoise {
    /// instruction indices belonging to wrapper handlers
    pub excluded: BTreeSet<usize>,
    /// signature strings pushed by wrapper handlers
    pub strings: BTreeSet<String>,
}

/// Report of a strip attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripReport {
    /// whether the body was replaced
    pub stripped: bool,
    /// number of real instructions removed
    pub removed: usize,
    /// signature string of the removed handler
    pub signature: Option<String>,
}

/// Matches the wrapper handler shape starting at the handler label index.
pub fn match_wrapper_handler(insns: &[Insn], handler: usize) -> Option<WrapperHandler> {
    let mut at = if insns.get(handler)?.is_pseudo() {
        next_real(insns, handler)?
    } else {
        handler
    };
    if insns[at].opcode() == Some(Opcode::ASTORE) {
        at = next_real(insns, at)?;
    }
    if insns[at].opcode() != Some(Opcode::ALOAD) {
        return None;
    }
    at = next_real(insns, at)?;
    let signature = insns[at]
        .string_constant()
        .filter(|s| s.contains('(') && s.contains(')'))?
        .to_string();
    at = next_real(insns, at)?;
    match &insns[at] {
        Insn::Invoke {
            opcode: Opcode::INVOKESTATIC,
            desc,
            ..
        } if is_helper_desc(desc) => {}
        _ => return None,
    }
    at = next_real(insns, at)?;
    if insns[at].opcode() != Some(Opcode::ATHROW) {
        return None;
    }
    Some(WrapperHandler {
        start: handler,
        athrow: at,
        signature,
    })
}

fn is_helper_desc(desc: &str) -> bool {
    desc.strip_prefix(HELPER_ARGS)
        .is_some_and(|ret| ret.starts_with('L') || ret.starts_with('['))
}

fn is_wrapper_entry(tc: &TryCatch) -> bool {
    tc.catch_type.as_deref() == Some(WRAPPER_EXCEPTION)
}

/// Returns the unwrapped body when the method is entirely one wrapper, `None` otherwise.
///
/// The unwrapped body is the protected region up to and including its first return or
/// throw. Anything other than pseudo-instructions between that exit and the region end
/// refuses the unwrap.
pub fn unwrap_whole_body(method: &MethodDef) -> Option<Vec<Insn>> {
    let [tc] = method.try_catch.as_slice() else {
        return None;
    };
    if !is_wrapper_entry(tc) {
        return None;
    }
    let labels = label_positions(&method.instructions);
    let handler = *labels.get(&tc.handler)?;
    match_wrapper_handler(&method.instructions, handler)?;

    let start = *labels.get(&tc.start)?;
    let end = *labels.get(&tc.end)?;
    if start >= end {
        return None;
    }
    let region = &method.instructions[start..end];
    let exit = region.iter().position(Insn::is_exit)?;
    if !region[exit + 1..].iter().all(Insn::is_pseudo) {
        return None;
    }
    Some(region[..=exit].to_vec())
}

/// Replaces a whole-body wrapper with its protected region, in place.
///
/// Running it on a method without a wrapper, including one it already stripped, leaves the
/// method unchanged.
pub fn strip_wrapper(method: &mut MethodDef) -> StripReport {
    let Some(body) = unwrap_whole_body(method) else {
        return StripReport {
            stripped: false,
            removed: 0,
            signature: None,
        };
    };
    let labels = label_positions(&method.instructions);
    let signature = method
        .try_catch
        .first()
        .and_then(|tc| labels.get(&tc.handler))
        .and_then(|&h| match_wrapper_handler(&method.instructions, h))
        .map(|h| h.signature);
    let real = |insns: &[Insn]| insns.iter().filter(|i| !i.is_pseudo()).count();
    let removed = real(&method.instructions) - real(&body);

    method.instructions = body;
    method.try_catch.clear();
    StripReport {
        stripped: true,
        removed,
        signature,
    }
}

/// Collects every wrapper-shaped handler of a method that was not unwrapped.
pub fn find_wrapper_noise(method: &MethodDef) -> WrapperNoise {
    let labels = label_positions(&method.instructions);
    let mut noise = WrapperNoise::default();
    for tc in method.try_catch.iter().filter(|tc| is_wrapper_entry(tc)) {
        let Some(&handler) = labels.get(&tc.handler) else {
            continue;
        };
        if let Some(found) = match_wrapper_handler(&method.instructions, handler) {
            noise.excluded.extend(found.start..=found.athrow);
            noise.strings.insert(found.signature);
        }
    }
    noise
}
