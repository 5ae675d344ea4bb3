/// Module defining the JVM opcode enumeration used by the instruction model.
///
/// This module provides the `Opcode` enum covering the instruction set a tree-style class
/// parser emits (the `xLOAD_n` / `WIDE` / `GOTO_W` short forms are already folded into their
/// canonical opcodes by the parser). It includes methods for converting between opcodes, their
/// byte values and mnemonics, and classifiers used by the noise detectors and solvers
/// (returns, conditional jumps, integer constants, multiplications).
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Enumeration of JVM opcodes.
///
/// Unknown bytes are carried as `Other(u8)` so an artifact produced by a newer parser still
/// loads; they take part in histograms under their `UNKNOWNxx` mnemonic.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Opcode {
    // 0x00 - 0x14: constants
    NOP,
    ACONST_NULL,
    ICONST_M1,
    ICONST_0,
    ICONST_1,
    ICONST_2,
    ICONST_3,
    ICONST_4,
    ICONST_5,
    LCONST_0,
    LCONST_1,
    FCONST_0,
    FCONST_1,
    FCONST_2,
    DCONST_0,
    DCONST_1,
    BIPUSH,
    SIPUSH,
    LDC,
    // 0x15 - 0x35: loads
    ILOAD,
    LLOAD,
    FLOAD,
    DLOAD,
    ALOAD,
    IALOAD,
    LALOAD,
    FALOAD,
    DALOAD,
    AALOAD,
    BALOAD,
    CALOAD,
    SALOAD,
    // 0x36 - 0x56: stores
    ISTORE,
    LSTORE,
    FSTORE,
    DSTORE,
    ASTORE,
    IASTORE,
    LASTORE,
    FASTORE,
    DASTORE,
    AASTORE,
    BASTORE,
    CASTORE,
    SASTORE,
    // 0x57 - 0x5f: stack
    POP,
    POP2,
    DUP,
    DUP_X1,
    DUP_X2,
    DUP2,
    DUP2_X1,
    DUP2_X2,
    SWAP,
    // 0x60 - 0x84: arithmetic
    IADD,
    LADD,
    FADD,
    DADD,
    ISUB,
    LSUB,
    FSUB,
    DSUB,
    IMUL,
    LMUL,
    FMUL,
    DMUL,
    IDIV,
    LDIV,
    FDIV,
    DDIV,
    IREM,
    LREM,
    FREM,
    DREM,
    INEG,
    LNEG,
    FNEG,
    DNEG,
    ISHL,
    LSHL,
    ISHR,
    LSHR,
    IUSHR,
    LUSHR,
    IAND,
    LAND,
    IOR,
    LOR,
    IXOR,
    LXOR,
    IINC,
    // 0x85 - 0x93: conversions
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    // 0x94 - 0xa6: comparisons
    LCMP,
    FCMPL,
    FCMPG,
    DCMPL,
    DCMPG,
    IFEQ,
    IFNE,
    IFLT,
    IFGE,
    IFGT,
    IFLE,
    IF_ICMPEQ,
    IF_ICMPNE,
    IF_ICMPLT,
    IF_ICMPGE,
    IF_ICMPGT,
    IF_ICMPLE,
    IF_ACMPEQ,
    IF_ACMPNE,
    // 0xa7 - 0xb1: control
    GOTO,
    JSR,
    RET,
    TABLESWITCH,
    LOOKUPSWITCH,
    IRETURN,
    LRETURN,
    FRETURN,
    DRETURN,
    ARETURN,
    RETURN,
    // 0xb2 - 0xc7: references
    GETSTATIC,
    PUTSTATIC,
    GETFIELD,
    PUTFIELD,
    INVOKEVIRTUAL,
    INVOKESPECIAL,
    INVOKESTATIC,
    INVOKEINTERFACE,
    INVOKEDYNAMIC,
    NEW,
    NEWARRAY,
    ANEWARRAY,
    ARRAYLENGTH,
    ATHROW,
    CHECKCAST,
    INSTANCEOF,
    MONITORENTER,
    MONITOREXIT,
    MULTIANEWARRAY,
    IFNULL,
    IFNONNULL,
    // Catch-all for opcodes the table does not name
    Other(u8),
}

use Opcode::*;

/// Byte value and mnemonic of every named opcode.
const TABLE: &[(Opcode, u8, &str)] = &[
    (NOP, 0x00, "NOP"),
    (ACONST_NULL, 0x01, "ACONST_NULL"),
    (ICONST_M1, 0x02, "ICONST_M1"),
    (ICONST_0, 0x03, "ICONST_0"),
    (ICONST_1, 0x04, "ICONST_1"),
    (ICONST_2, 0x05, "ICONST_2"),
    (ICONST_3, 0x06, "ICONST_3"),
    (ICONST_4, 0x07, "ICONST_4"),
    (ICONST_5, 0x08, "ICONST_5"),
    (LCONST_0, 0x09, "LCONST_0"),
    (LCONST_1, 0x0a, "LCONST_1"),
    (FCONST_0, 0x0b, "FCONST_0"),
    (FCONST_1, 0x0c, "FCONST_1"),
    (FCONST_2, 0x0d, "FCONST_2"),
    (DCONST_0, 0x0e, "DCONST_0"),
    (DCONST_1, 0x0f, "DCONST_1"),
    (BIPUSH, 0x10, "BIPUSH"),
    (SIPUSH, 0x11, "SIPUSH"),
    (LDC, 0x12, "LDC"),
    (ILOAD, 0x15, "ILOAD"),
    (LLOAD, 0x16, "LLOAD"),
    (FLOAD, 0x17, "FLOAD"),
    (DLOAD, 0x18, "DLOAD"),
    (ALOAD, 0x19, "ALOAD"),
    (IALOAD, 0x2e, "IALOAD"),
    (LALOAD, 0x2f, "LALOAD"),
    (FALOAD, 0x30, "FALOAD"),
    (DALOAD, 0x31, "DALOAD"),
    (AALOAD, 0x32, "AALOAD"),
    (BALOAD, 0x33, "BALOAD"),
    (CALOAD, 0x34, "CALOAD"),
    (SALOAD, 0x35, "SALOAD"),
    (ISTORE, 0x36, "ISTORE"),
    (LSTORE, 0x37, "LSTORE"),
    (FSTORE, 0x38, "FSTORE"),
    (DSTORE, 0x39, "DSTORE"),
    (ASTORE, 0x3a, "ASTORE"),
    (IASTORE, 0x4f, "IASTORE"),
    (LASTORE, 0x50, "LASTORE"),
    (FASTORE, 0x51, "FASTORE"),
    (DASTORE, 0x52, "DASTORE"),
    (AASTORE, 0x53, "AASTORE"),
    (BASTORE, 0x54, "BASTORE"),
    (CASTORE, 0x55, "CASTORE"),
    (SASTORE, 0x56, "SASTORE"),
    (POP, 0x57, "POP"),
    (POP2, 0x58, "POP2"),
    (DUP, 0x59, "DUP"),
    (DUP_X1, 0x5a, "DUP_X1"),
    (DUP_X2, 0x5b, "DUP_X2"),
    (DUP2, 0x5c, "DUP2"),
    (DUP2_X1, 0x5d, "DUP2_X1"),
    (DUP2_X2, 0x5e, "DUP2_X2"),
    (SWAP, 0x5f, "SWAP"),
    (IADD, 0x60, "IADD"),
    (LADD, 0x61, "LADD"),
    (FADD, 0x62, "FADD"),
    (DADD, 0x63, "DADD"),
    (ISUB, 0x64, "ISUB"),
    (LSUB, 0x65, "LSUB"),
    (FSUB, 0x66, "FSUB"),
    (DSUB, 0x67, "DSUB"),
    (IMUL, 0x68, "IMUL"),
    (LMUL, 0x69, "LMUL"),
    (FMUL, 0x6a, "FMUL"),
    (DMUL, 0x6b, "DMUL"),
    (IDIV, 0x6c, "IDIV"),
    (LDIV, 0x6d, "LDIV"),
    (FDIV, 0x6e, "FDIV"),
    (DDIV, 0x6f, "DDIV"),
    (IREM, 0x70, "IREM"),
    (LREM, 0x71, "LREM"),
    (FREM, 0x72, "FREM"),
    (DREM, 0x73, "DREM"),
    (INEG, 0x74, "INEG"),
    (LNEG, 0x75, "LNEG"),
    (FNEG, 0x76, "FNEG"),
    (DNEG, 0x77, "DNEG"),
    (ISHL, 0x78, "ISHL"),
    (LSHL, 0x79, "LSHL"),
    (ISHR, 0x7a, "ISHR"),
    (LSHR, 0x7b, "LSHR"),
    (IUSHR, 0x7c, "IUSHR"),
    (LUSHR, 0x7d, "LUSHR"),
    (IAND, 0x7e, "IAND"),
    (LAND, 0x7f, "LAND"),
    (IOR, 0x80, "IOR"),
    (LOR, 0x81, "LOR"),
    (IXOR, 0x82, "IXOR"),
    (LXOR, 0x83, "LXOR"),
    (IINC, 0x84, "IINC"),
    (I2L, 0x85, "I2L"),
    (I2F, 0x86, "I2F"),
    (I2D, 0x87, "I2D"),
    (L2I, 0x88, "L2I"),
    (L2F, 0x89, "L2F"),
    (L2D, 0x8a, "L2D"),
    (F2I, 0x8b, "F2I"),
    (F2L, 0x8c, "F2L"),
    (F2D, 0x8d, "F2D"),
    (D2I, 0x8e, "D2I"),
    (D2L, 0x8f, "D2L"),
    (D2F, 0x90, "D2F"),
    (I2B, 0x91, "I2B"),
    (I2C, 0x92, "I2C"),
    (I2S, 0x93, "I2S"),
    (LCMP, 0x94, "LCMP"),
    (FCMPL, 0x95, "FCMPL"),
    (FCMPG, 0x96, "FCMPG"),
    (DCMPL, 0x97, "DCMPL"),
    (DCMPG, 0x98, "DCMPG"),
    (IFEQ, 0x99, "IFEQ"),
    (IFNE, 0x9a, "IFNE"),
    (IFLT, 0x9b, "IFLT"),
    (IFGE, 0x9c, "IFGE"),
    (IFGT, 0x9d, "IFGT"),
    (IFLE, 0x9e, "IFLE"),
    (IF_ICMPEQ, 0x9f, "IF_ICMPEQ"),
    (IF_ICMPNE, 0xa0, "IF_ICMPNE"),
    (IF_ICMPLT, 0xa1, "IF_ICMPLT"),
    (IF_ICMPGE, 0xa2, "IF_ICMPGE"),
    (IF_ICMPGT, 0xa3, "IF_ICMPGT"),
    (IF_ICMPLE, 0xa4, "IF_ICMPLE"),
    (IF_ACMPEQ, 0xa5, "IF_ACMPEQ"),
    (IF_ACMPNE, 0xa6, "IF_ACMPNE"),
    (GOTO, 0xa7, "GOTO"),
    (JSR, 0xa8, "JSR"),
    (RET, 0xa9, "RET"),
    (TABLESWITCH, 0xaa, "TABLESWITCH"),
    (LOOKUPSWITCH, 0xab, "LOOKUPSWITCH"),
    (IRETURN, 0xac, "IRETURN"),
    (LRETURN, 0xad, "LRETURN"),
    (FRETURN, 0xae, "FRETURN"),
    (DRETURN, 0xaf, "DRETURN"),
    (ARETURN, 0xb0, "ARETURN"),
    (RETURN, 0xb1, "RETURN"),
    (GETSTATIC, 0xb2, "GETSTATIC"),
    (PUTSTATIC, 0xb3, "PUTSTATIC"),
    (GETFIELD, 0xb4, "GETFIELD"),
    (PUTFIELD, 0xb5, "PUTFIELD"),
    (INVOKEVIRTUAL, 0xb6, "INVOKEVIRTUAL"),
    (INVOKESPECIAL, 0xb7, "INVOKESPECIAL"),
    (INVOKESTATIC, 0xb8, "INVOKESTATIC"),
    (INVOKEINTERFACE, 0xb9, "INVOKEINTERFACE"),
    (INVOKEDYNAMIC, 0xba, "INVOKEDYNAMIC"),
    (NEW, 0xbb, "NEW"),
    (NEWARRAY, 0xbc, "NEWARRAY"),
    (ANEWARRAY, 0xbd, "ANEWARRAY"),
    (ARRAYLENGTH, 0xbe, "ARRAYLENGTH"),
    (ATHROW, 0xbf, "ATHROW"),
    (CHECKCAST, 0xc0, "CHECKCAST"),
    (INSTANCEOF, 0xc1, "INSTANCEOF"),
    (MONITORENTER, 0xc2, "MONITORENTER"),
    (MONITOREXIT, 0xc3, "MONITOREXIT"),
    (MULTIANEWARRAY, 0xc5, "MULTIANEWARRAY"),
    (IFNULL, 0xc6, "IFNULL"),
    (IFNONNULL, 0xc7, "IFNONNULL"),
];

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Other(byte) => write!(f, "UNKNOWN{byte:02x}"),
            named => {
                let mnemonic = TABLE
                    .iter()
                    .find(|(op, _, _)| op == named)
                    .map_or("UNKNOWN", |(_, _, m)| m);
                f.write_str(mnemonic)
            }
        }
    }
}

impl FromStr for Opcode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(hex) = s.strip_prefix("UNKNOWN") {
            return u8::from_str_radix(hex, 16)
                .map(Self::parse)
                .map_err(|_| format!("invalid unknown opcode `{s}`"));
        }
        TABLE
            .iter()
            .find(|(_, _, m)| *m == s)
            .map(|(op, _, _)| *op)
            .ok_or_else(|| format!("unknown opcode mnemonic `{s}`"))
    }
}

impl TryFrom<String> for Opcode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Opcode> for String {
    fn from(op: Opcode) -> Self {
        op.to_string()
    }
}

impl Opcode {
    /// Parses a raw byte into an `Opcode`.
    ///
    /// # Examples
    /// ```rust,ignore
    /// assert_eq!(Opcode::parse(0x68), Opcode::IMUL);
    /// assert_eq!(Opcode::parse(0xfe), Opcode::Other(0xfe));
    /// ```
    pub fn parse(byte: u8) -> Self {
        TABLE
            .iter()
            .find(|(_, b, _)| *b == byte)
            .map_or(Other(byte), |(op, _, _)| *op)
    }

    /// Converts the opcode to its byte representation.
    pub fn to_byte(&self) -> u8 {
        match self {
            Other(byte) => *byte,
            named => TABLE
                .iter()
                .find(|(op, _, _)| op == named)
                .map_or(0xff, |(_, b, _)| *b),
        }
    }

    /// `true` for the return family and `ATHROW`, i.e. instructions that leave the method.
    pub const fn is_exit(&self) -> bool {
        matches!(
            self,
            IRETURN | LRETURN | FRETURN | DRETURN | ARETURN | RETURN | ATHROW
        )
    }

    /// `true` for the conditional branch family (`IFxx`, `IF_ICMPxx`, `IF_ACMPxx`, null checks).
    pub const fn is_conditional_jump(&self) -> bool {
        matches!(
            self,
            IFEQ | IFNE
                | IFLT
                | IFGE
                | IFGT
                | IFLE
                | IF_ICMPEQ
                | IF_ICMPNE
                | IF_ICMPLT
                | IF_ICMPGE
                | IF_ICMPGT
                | IF_ICMPLE
                | IF_ACMPEQ
                | IF_ACMPNE
                | IFNULL
                | IFNONNULL
        )
    }

    /// `true` for single-operand comparisons against zero (`IFEQ` .. `IFLE`).
    pub const fn is_zero_compare(&self) -> bool {
        matches!(self, IFEQ | IFNE | IFLT | IFGE | IFGT | IFLE)
    }

    /// `true` for the equality tests `IFEQ`, `IFNE`, `IF_ICMPEQ` and `IF_ICMPNE`.
    pub const fn is_equality_compare(&self) -> bool {
        matches!(self, IFEQ | IFNE | IF_ICMPEQ | IF_ICMPNE)
    }

    /// `true` for two-operand integer comparisons (`IF_ICMPEQ` .. `IF_ICMPLE`).
    pub const fn is_int_compare(&self) -> bool {
        matches!(
            self,
            IF_ICMPEQ | IF_ICMPNE | IF_ICMPLT | IF_ICMPGE | IF_ICMPGT | IF_ICMPLE
        )
    }

    /// `true` for array element loads (`IALOAD` .. `SALOAD`).
    pub const fn is_array_load(&self) -> bool {
        matches!(
            self,
            IALOAD | LALOAD | FALOAD | DALOAD | AALOAD | BALOAD | CALOAD | SALOAD
        )
    }

    /// `true` for the binary and unary arithmetic and bitwise family (`IADD` .. `LXOR`).
    pub const fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            IADD | LADD
                | FADD
                | DADD
                | ISUB
                | LSUB
                | FSUB
                | DSUB
                | IMUL
                | LMUL
                | FMUL
                | DMUL
                | IDIV
                | LDIV
                | FDIV
                | DDIV
                | IREM
                | LREM
                | FREM
                | DREM
                | INEG
                | LNEG
                | FNEG
                | DNEG
                | ISHL
                | LSHL
                | ISHR
                | LSHR
                | IUSHR
                | LUSHR
                | IAND
                | LAND
                | IOR
                | LOR
                | IXOR
                | LXOR
        )
    }

    /// `true` for numeric comparisons: `LCMP`, the float and double compares, `IFxx` and
    /// `IF_ICMPxx`.
    pub const fn is_numeric_compare(&self) -> bool {
        matches!(self, LCMP | FCMPL | FCMPG | DCMPL | DCMPG)
            || self.is_zero_compare()
            || self.is_int_compare()
    }

    /// Value pushed by the `ICONST_x` / `LCONST_x` shortcuts.
    pub const fn implicit_constant(&self) -> Option<i64> {
        match self {
            ICONST_M1 => Some(-1),
            ICONST_0 | LCONST_0 => Some(0),
            ICONST_1 | LCONST_1 => Some(1),
            ICONST_2 => Some(2),
            ICONST_3 => Some(3),
            ICONST_4 => Some(4),
            ICONST_5 => Some(5),
            _ => None,
        }
    }

    /// `true` for the method invocation family.
    pub const fn is_invoke(&self) -> bool {
        matches!(
            self,
            INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC | INVOKEINTERFACE
        )
    }
}
