//! Tagged-union instruction model.
//!
//! Every instruction the class parser produces is one `Insn` variant carrying a typed payload.
//! Pseudo-instructions (labels, line numbers, stack-map frames) have no opcode and are skipped
//! by every structural scan.

use crate::Opcode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a label pseudo-instruction, unique within one method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelId(pub u32);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Constant-pool value pushed by `LDC`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Constant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    /// Class literal, as an internal name or descriptor.
    Type(String),
}

/// One instruction of a method body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Insn {
    /// Branch target marker.
    Label { id: LabelId },
    /// Source line marker.
    Line { line: u32 },
    /// Stack-map frame marker.
    Frame,
    /// Any opcode without operands (`IADD`, `ATHROW`, `ICONST_3`, `IRETURN`, ...).
    Op { opcode: Opcode },
    /// `BIPUSH`, `SIPUSH` or `NEWARRAY` with its immediate.
    IntPush { opcode: Opcode, operand: i32 },
    /// `LDC` and its wide forms.
    Ldc { constant: Constant },
    /// Local-variable load/store (`ILOAD`, `ASTORE`, `RET`, ...).
    Var { opcode: Opcode, var: u16 },
    /// `IINC var, incr`.
    Iinc { var: u16, incr: i32 },
    /// `GETFIELD`/`PUTFIELD`/`GETSTATIC`/`PUTSTATIC`.
    Field {
        opcode: Opcode,
        owner: String,
        name: String,
        desc: String,
    },
    /// `INVOKEVIRTUAL`/`INVOKESPECIAL`/`INVOKESTATIC`/`INVOKEINTERFACE`.
    Invoke {
        opcode: Opcode,
        owner: String,
        name: String,
        desc: String,
        #[serde(default)]
        interface: bool,
    },
    /// `INVOKEDYNAMIC` call site.
    InvokeDynamic { name: String, desc: String },
    /// Conditional or unconditional branch (`IFEQ`, `IF_ICMPNE`, `GOTO`, `JSR`, ...).
    Jump { opcode: Opcode, target: LabelId },
    /// `NEW`, `ANEWARRAY`, `CHECKCAST`, `INSTANCEOF` with their class operand.
    TypeOp { opcode: Opcode, desc: String },
    /// `TABLESWITCH`/`LOOKUPSWITCH`.
    Switch {
        opcode: Opcode,
        default: LabelId,
        targets: Vec<LabelId>,
        #[serde(default)]
        keys: Vec<i32>,
    },
    /// `MULTIANEWARRAY desc dims`.
    MultiANewArray { desc: String, dims: u8 },
}

impl Insn {
    /// The opcode of a real instruction, `None` for pseudo-instructions.
    pub const fn opcode(&self) -> Option<Opcode> {
        match self {
            Self::Label { .. } | Self::Line { .. } | Self::Frame => None,
            Self::Op { opcode }
            | Self::IntPush { opcode, .. }
            | Self::Var { opcode, .. }
            | Self::Field { opcode, .. }
            | Self::Invoke { opcode, .. }
            | Self::Jump { opcode, .. }
            | Self::TypeOp { opcode, .. }
            | Self::Switch { opcode, .. } => Some(*opcode),
            Self::Ldc { .. } => Some(Opcode::LDC),
            Self::Iinc { .. } => Some(Opcode::IINC),
            Self::InvokeDynamic { .. } => Some(Opcode::INVOKEDYNAMIC),
            Self::MultiANewArray { .. } => Some(Opcode::MULTIANEWARRAY),
        }
    }

    /// `true` for labels, line numbers and frames.
    pub const fn is_pseudo(&self) -> bool {
        self.opcode().is_none()
    }

    /// `true` when the instruction is a return or `ATHROW`.
    pub fn is_exit(&self) -> bool {
        self.opcode().is_some_and(|op| op.is_exit())
    }

    /// Integer value pushed by a constant instruction (`ICONST_x`, `LCONST_x`, `BIPUSH`,
    /// `SIPUSH`, integral `LDC`).
    pub fn int_constant(&self) -> Option<i64> {
        match self {
            Self::Op { opcode } => opcode.implicit_constant(),
            Self::IntPush { opcode, operand }
                if matches!(opcode, Opcode::BIPUSH | Opcode::SIPUSH) =>
            {
                Some(i64::from(*operand))
            }
            Self::Ldc {
                constant: Constant::Int(v),
            } => Some(i64::from(*v)),
            Self::Ldc {
                constant: Constant::Long(v),
            } => Some(*v),
            _ => None,
        }
    }

    /// String pushed by an `LDC`, if any.
    pub fn string_constant(&self) -> Option<&str> {
        match self {
            Self::Ldc {
                constant: Constant::String(s),
            } => Some(s),
            _ => None,
        }
    }

    /// Local slot read by an integer load.
    pub fn iload_slot(&self) -> Option<u16> {
        match self {
            Self::Var {
                opcode: Opcode::ILOAD,
                var,
            } => Some(*var),
            _ => None,
        }
    }

    /// Local slot touched by any variable instruction, including `IINC`.
    pub const fn var_slot(&self) -> Option<u16> {
        match self {
            Self::Var { var, .. } | Self::Iinc { var, .. } => Some(*var),
            _ => None,
        }
    }

    /// Labels this instruction may transfer control to.
    pub fn branch_targets(&self) -> Vec<LabelId> {
        match self {
            Self::Jump { target, .. } => vec![*target],
            Self::Switch {
                default, targets, ..
            } => std::iter::once(*default)
                .chain(targets.iter().copied())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Label { id } => write!(f, "{id}:"),
            Self::Line { line } => write!(f, "  // line {line}"),
            Self::Frame => f.write_str("  // frame"),
            Self::Op { opcode } => write!(f, "  {opcode}"),
            Self::IntPush { opcode, operand } => write!(f, "  {opcode} {operand}"),
            Self::Ldc { constant } => match constant {
                Constant::Int(v) => write!(f, "  LDC {v}"),
                Constant::Long(v) => write!(f, "  LDC {v}L"),
                Constant::Float(v) => write!(f, "  LDC {v}F"),
                Constant::Double(v) => write!(f, "  LDC {v}D"),
                Constant::String(s) => write!(f, "  LDC {s:?}"),
                Constant::Type(t) => write!(f, "  LDC {t}.class"),
            },
            Self::Var { opcode, var } => write!(f, "  {opcode} {var}"),
            Self::Iinc { var, incr } => write!(f, "  IINC {var} {incr}"),
            Self::Field {
                opcode,
                owner,
                name,
                desc,
            } => write!(f, "  {opcode} {owner}.{name} : {desc}"),
            Self::Invoke {
                opcode,
                owner,
                name,
                desc,
                ..
            } => write!(f, "  {opcode} {owner}.{name}{desc}"),
            Self::InvokeDynamic { name, desc } => write!(f, "  INVOKEDYNAMIC {name}{desc}"),
            Self::Jump { opcode, target } => write!(f, "  {opcode} {target}"),
            Self::TypeOp { opcode, desc } => write!(f, "  {opcode} {desc}"),
            Self::Switch {
                opcode,
                default,
                targets,
                ..
            } => write!(f, "  {opcode} default {default} ({} cases)", targets.len()),
            Self::MultiANewArray { desc, dims } => write!(f, "  MULTIANEWARRAY {desc} {dims}"),
        }
    }
}

/// One entry of a method's exception table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TryCatch {
    pub start: LabelId,
    pub end: LabelId,
    pub handler: LabelId,
    /// Caught class, `None` for `finally` handlers.
    #[serde(default)]
    pub catch_type: Option<String>,
}

/// Index of the first real instruction strictly after `from`.
pub fn next_real(insns: &[Insn], from: usize) -> Option<usize> {
    (from + 1..insns.len()).find(|&i| !insns[i].is_pseudo())
}

/// Index of the last real instruction strictly before `from`.
pub fn prev_real(insns: &[Insn], from: usize) -> Option<usize> {
    (0..from.min(insns.len())).rev().find(|&i| !insns[i].is_pseudo())
}
