/// Module for normalizing method bodies into comparable structural summaries.
///
/// A `NormalizedMethod` strips the obfuscation noise remora knows about (whole-body exception
/// wrappers, wrapper signature strings, opaque-predicate guard branches) and keeps the parts of
/// a body that survive a rebuild: the canonical descriptor, an opcode histogram, the invoked
/// signatures and the string constants. A SHA-256 fingerprint over their sorted serialization
/// lets two independently normalized methods be compared for exact equality.
///
/// # Usage
/// ```rust,ignore
/// let norm = normalize("ab", &method);
/// println!("{} {}", norm.key, norm.fingerprint);
/// ```
use rayon::prelude::*;
use remora_core::detection::find_guard_instructions;
use remora_core::strip::{find_wrapper_noise, unwrap_whole_body};
use remora_core::{Artifact, Insn, MethodDef, MethodKey, Opcode};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Structural summary of one method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedMethod {
    /// Identity of the summarized method.
    pub key: MethodKey,
    /// Descriptor with opaque trailing parameters removed.
    pub descriptor: String,
    /// Occurrences of every opcode outside the excluded noise.
    pub opcode_histogram: BTreeMap<Opcode, u32>,
    /// `owner.name+desc` of every invoked method.
    pub invoked: BTreeSet<String>,
    /// String constants, minus wrapper signature strings.
    pub strings: BTreeSet<String>,
    /// Hex SHA-256 over the descriptor, the opcode set, the signatures and the strings.
    pub fingerprint: String,
    /// Whether a whole-body exception wrapper was removed.
    pub unwrapped: bool,
}

impl NormalizedMethod {
    /// Total number of counted instructions.
    pub fn instruction_count(&self) -> u32 {
        self.opcode_histogram.values().sum()
    }
}

/// Normalizes a method with no opaque parameters.
pub fn normalize(owner: &str, method: &MethodDef) -> NormalizedMethod {
    normalize_with(owner, method, &BTreeSet::new())
}

/// Normalizes a method, eliding the argument positions in `opaque_params` from the
/// descriptor and excluding the guard branches that test them.
pub fn normalize_with(
    owner: &str,
    method: &MethodDef,
    opaque_params: &BTreeSet<usize>,
) -> NormalizedMethod {
    // 1. Whole-body wrapper, or wrapper noise when the body cannot be unwrapped
    let (insns, unwrapped, mut excluded, noise_strings) = match unwrap_whole_body(method) {
        Some(body) => (body, true, BTreeSet::new(), BTreeSet::new()),
        None => {
            let noise = find_wrapper_noise(method);
            (
                method.instructions.clone(),
                false,
                noise.excluded,
                noise.strings,
            )
        }
    };

    // 2. Canonical descriptor and guard branches on opaque parameters
    let descriptor = match method.descriptor() {
        Ok(md) if !opaque_params.is_empty() => {
            for &param in opaque_params.iter().filter(|&&p| p < md.args.len()) {
                let slot = md.arg_slot(param, method.is_static);
                if let Ok(slot) = u16::try_from(slot) {
                    excluded.extend(find_guard_instructions(&insns, slot));
                }
            }
            md.without_args(opaque_params)
        }
        _ => method.desc.clone(),
    };

    // 3. Structural features over the remaining instructions
    let mut opcode_histogram = BTreeMap::new();
    let mut invoked = BTreeSet::new();
    let mut strings = BTreeSet::new();
    for (i, insn) in insns.iter().enumerate() {
        if excluded.contains(&i) {
            continue;
        }
        let Some(opcode) = insn.opcode() else {
            continue;
        };
        *opcode_histogram.entry(opcode).or_insert(0) += 1;
        match insn {
            Insn::Invoke {
                owner, name, desc, ..
            } => {
                invoked.insert(format!("{owner}.{name}{desc}"));
            }
            Insn::Ldc { .. } => {
                if let Some(s) = insn.string_constant() {
                    if !noise_strings.contains(s) {
                        strings.insert(s.to_string());
                    }
                }
            }
            _ => {}
        }
    }

    let fingerprint = fingerprint(&descriptor, &opcode_histogram, &invoked, &strings);
    NormalizedMethod {
        key: method.key(owner),
        descriptor,
        opcode_histogram,
        invoked,
        strings,
        fingerprint,
        unwrapped,
    }
}

/// SHA-256 of `descriptor|opcodes|signatures|strings|` with every list in sorted order.
///
/// Only the set of opcodes is hashed, not their counts.
pub fn fingerprint(
    descriptor: &str,
    histogram: &BTreeMap<Opcode, u32>,
    invoked: &BTreeSet<String>,
    strings: &BTreeSet<String>,
) -> String {
    let opcodes: Vec<String> = histogram.keys().map(|op| op.to_string()).collect();
    let joined = |set: &BTreeSet<String>| set.iter().cloned().collect::<Vec<_>>().join(",");

    let mut hasher = Sha256::new();
    hasher.update(descriptor.as_bytes());
    hasher.update(b"|");
    hasher.update(opcodes.join(",").as_bytes());
    hasher.update(b"|");
    hasher.update(joined(invoked).as_bytes());
    hasher.update(b"|");
    hasher.update(joined(strings).as_bytes());
    hasher.update(b"|");
    hex::encode(hasher.finalize())
}

/// Normalizes every method in `live` in parallel.
///
/// `opaque_params` lists, per method, the argument positions identified as opaque.
pub fn normalize_all(
    artifact: &Artifact,
    live: &BTreeSet<MethodKey>,
    opaque_params: &BTreeMap<MethodKey, BTreeSet<usize>>,
) -> BTreeMap<MethodKey, NormalizedMethod> {
    let empty = BTreeSet::new();
    let keys: Vec<&MethodKey> = live.iter().collect();
    let normalized: BTreeMap<MethodKey, NormalizedMethod> = keys
        .par_iter()
        .filter_map(|key| {
            let method = artifact.method(key)?;
            let opaque = opaque_params.get(*key).unwrap_or(&empty);
            Some(((*key).clone(), normalize_with(&key.owner, method, opaque)))
        })
        .collect();
    debug!(
        "normalized {} methods ({} unwrapped)",
        normalized.len(),
        normalized.values().filter(|n| n.unwrapped).count()
    );
    normalized
}
