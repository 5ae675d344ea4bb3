//! Field multiplier recovery.
//!
//! Obfuscated integer fields are stored multiplied by an odd constant and multiplied by its
//! modular inverse when read back. The scanner picks the first decode constant (`GET; const;
//! MUL`) and the first encode constant (`const; MUL; PUT`) observed per field and derives
//! whichever one is missing through the inverse modulo 2^32 or 2^64.

use crate::field_usage::resolve_field;
use remora_core::insn::{next_real, prev_real};
use remora_core::{Artifact, FieldKey, Insn, Opcode};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Decode/encode constants of one field, sign-extended to the field's width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MultiplierPair {
    /// applied after reading
    pub decode: i64,
    /// applied before writing
    pub encode: i64,
    pub bits: u32,
}

impl MultiplierPair {
    /// `decode * encode == 1` in the field's width.
    pub fn is_consistent(&self) -> bool {
        wrapping_product(self.decode, self.encode, self.bits) == 1
    }
}

/// Sign-extends the low `bits` bits of `value`.
pub fn sign_extend(value: i64, bits: u32) -> i64 {
    match bits {
        32 => i64::from(value as i32),
        _ => value,
    }
}

fn wrapping_product(a: i64, b: i64, bits: u32) -> i64 {
    sign_extend(a.wrapping_mul(b), bits)
}

/// Inverse of `k` modulo `2^bits`, sign-extended; `None` for even `k` or unsupported widths.
pub fn mod_inverse(k: i64, bits: u32) -> Option<i64> {
    if !(1..=64).contains(&bits) {
        return None;
    }
    let modulus: i128 = 1i128 << bits;
    let a = i128::from(k).rem_euclid(modulus);
    if a % 2 == 0 {
        return None;
    }

    // extended Euclid on (a, modulus)
    let (mut old_r, mut r) = (a, modulus);
    let (mut old_s, mut s) = (1i128, 0i128);
    while r != 0 {
        let q = old_r / r;
        (old_r, r) = (r, old_r - q * r);
        (old_s, s) = (s, old_s - q * s);
    }
    if old_r != 1 {
        return None;
    }
    let inverse = old_s.rem_euclid(modulus);
    // the low 64 bits carry the full residue for every supported width
    Some(sign_extend(inverse as u64 as i64, bits))
}

fn field_bits(desc: &str) -> Option<u32> {
    match desc {
        "I" => Some(32),
        "J" => Some(64),
        _ => None,
    }
}

/// `IMUL` for 32-bit fields, `LMUL` for 64-bit ones.
fn is_mul(insn: &Insn, bits: u32) -> bool {
    match bits {
        32 => insn.opcode() == Some(Opcode::IMUL),
        64 => insn.opcode() == Some(Opcode::LMUL),
        _ => false,
    }
}

/// Constant multiplied into the value read at `at`.
fn decode_at(insns: &[Insn], at: usize, bits: u32) -> Option<i64> {
    let next = next_real(insns, at)?;
    if let Some(c) = insns[next].int_constant() {
        let mul = next_real(insns, next)?;
        return is_mul(&insns[mul], bits).then_some(c);
    }
    let prev = prev_real(insns, at)?;
    let c = insns[prev].int_constant()?;
    is_mul(&insns[next], bits).then_some(c)
}

/// Constant multiplied into the value written at `at`.
fn encode_at(insns: &[Insn], at: usize, bits: u32) -> Option<i64> {
    let mul = prev_real(insns, at)?;
    if !is_mul(&insns[mul], bits) {
        return None;
    }
    let one = prev_real(insns, mul)?;
    if let Some(c) = insns[one].int_constant() {
        return Some(c);
    }
    let two = prev_real(insns, one)?;
    insns[two].int_constant()
}

#[derive(Debug, Default, Clone, Copy)]
struct Observed {
    decode: Option<i64>,
    encode: Option<i64>,
}

/// Recovers multiplier pairs for the `I`/`J` fields in `fields`.
pub fn scan(artifact: &Artifact, fields: &BTreeSet<FieldKey>) -> BTreeMap<FieldKey, MultiplierPair> {
    let mut observed: BTreeMap<FieldKey, Observed> = BTreeMap::new();
    for (_, method) in artifact.methods() {
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
            let Some(bits) = field_bits(desc) else {
                continue;
            };
            let Some(key) = resolve_field(artifact, owner, name, desc) else {
                continue;
            };
            if !fields.contains(&key) {
                continue;
            }
            let slot = observed.entry(key).or_default();
            match opcode {
                Opcode::GETFIELD | Opcode::GETSTATIC if slot.decode.is_none() => {
                    slot.decode = decode_at(insns, i, bits).map(|c| sign_extend(c, bits));
                }
                Opcode::PUTFIELD | Opcode::PUTSTATIC if slot.encode.is_none() => {
                    slot.encode = encode_at(insns, i, bits).map(|c| sign_extend(c, bits));
                }
                _ => {}
            }
        }
    }

    let mut pairs = BTreeMap::new();
    for (key, seen) in observed {
        let Some(bits) = field_bits(&key.desc) else {
            continue;
        };
        let pair = match (seen.decode, seen.encode) {
            (Some(decode), Some(encode)) => MultiplierPair {
                decode,
                encode,
                bits,
            },
            (Some(decode), None) => match mod_inverse(decode, bits) {
                Some(encode) => MultiplierPair {
                    decode,
                    encode,
                    bits,
                },
                None => continue,
            },
            (None, Some(encode)) => match mod_inverse(encode, bits) {
                Some(decode) => MultiplierPair {
                    decode,
                    encode,
                    bits,
                },
                None => continue,
            },
            (None, None) => continue,
        };
        if !pair.is_consistent() {
            debug!(
                "multipliers for {} disagree: {} * {} != 1",
                key, pair.decode, pair.encode
            );
            continue;
        }
        pairs.insert(key, pair);
    }
    debug!("multipliers: {} fields recovered", pairs.len());
    pairs
}
