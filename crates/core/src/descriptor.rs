//! JVM type and method descriptor parsing.

use remora_utils::errors::DescriptorError;
use std::fmt;

/// A single JVM field type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JavaType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
    Void,
    /// Internal class name, e.g. `java/lang/String`.
    Object(String),
    /// Element type and dimension count; the element is never itself an array.
    Array(Box<JavaType>, usize),
}

impl JavaType {
    /// Parses a complete field descriptor such as `[[Ljava/lang/String;`.
    pub fn parse(descriptor: &str) -> Result<Self, DescriptorError> {
        if descriptor.is_empty() {
            return Err(DescriptorError::Empty);
        }
        let (ty, used) = parse_one(descriptor, 0)?;
        if used != descriptor.len() {
            return Err(malformed(descriptor, used, "trailing characters"));
        }
        Ok(ty)
    }

    /// Number of local-variable slots a value of this type occupies.
    pub const fn slot_size(&self) -> usize {
        match self {
            Self::Long | Self::Double => 2,
            Self::Void => 0,
            _ => 1,
        }
    }

    /// `true` for the eight primitive value types.
    pub const fn is_primitive(&self) -> bool {
        !matches!(self, Self::Object(_) | Self::Array(..) | Self::Void)
    }

    /// Inclusive value range for the integral types the opaque solver models.
    pub const fn int_range(&self) -> Option<(i64, i64)> {
        match self {
            Self::Byte => Some((i8::MIN as i64, i8::MAX as i64)),
            Self::Short => Some((i16::MIN as i64, i16::MAX as i64)),
            Self::Char => Some((0, u16::MAX as i64)),
            Self::Boolean => Some((0, 1)),
            Self::Int => Some((i32::MIN as i64, i32::MAX as i64)),
            _ => None,
        }
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Byte => f.write_str("B"),
            Self::Char => f.write_str("C"),
            Self::Double => f.write_str("D"),
            Self::Float => f.write_str("F"),
            Self::Int => f.write_str("I"),
            Self::Long => f.write_str("J"),
            Self::Short => f.write_str("S"),
            Self::Boolean => f.write_str("Z"),
            Self::Void => f.write_str("V"),
            Self::Object(name) => write!(f, "L{name};"),
            Self::Array(elem, dims) => {
                for _ in 0..*dims {
                    f.write_str("[")?;
                }
                write!(f, "{elem}")
            }
        }
    }
}

/// A parsed method descriptor `(args)ret`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub args: Vec<JavaType>,
    pub ret: JavaType,
}

impl MethodDescriptor {
    /// Parses a method descriptor such as `(IJ[B)Ljava/lang/Object;`.
    pub fn parse(descriptor: &str) -> Result<Self, DescriptorError> {
        if descriptor.is_empty() {
            return Err(DescriptorError::Empty);
        }
        if !descriptor.starts_with('(') {
            return Err(malformed(descriptor, 0, "expected `(`"));
        }
        let mut args = Vec::new();
        let mut pos = 1;
        loop {
            match descriptor.as_bytes().get(pos) {
                Some(b')') => break,
                Some(_) => {
                    let (ty, next) = parse_one(descriptor, pos)?;
                    if ty == JavaType::Void {
                        return Err(malformed(descriptor, pos, "void argument"));
                    }
                    args.push(ty);
                    pos = next;
                }
                None => return Err(malformed(descriptor, pos, "unterminated argument list")),
            }
        }
        let (ret, end) = parse_one(descriptor, pos + 1)?;
        if end != descriptor.len() {
            return Err(malformed(descriptor, end, "trailing characters"));
        }
        Ok(Self { args, ret })
    }

    /// Local-variable slot of argument `index`, counting `this` for instance methods.
    pub fn arg_slot(&self, index: usize, is_static: bool) -> usize {
        let base = usize::from(!is_static);
        base + self.args[..index.min(self.args.len())]
            .iter()
            .map(JavaType::slot_size)
            .sum::<usize>()
    }

    /// Renders the descriptor with the argument positions in `elide` removed.
    pub fn without_args(&self, elide: &std::collections::BTreeSet<usize>) -> String {
        let mut out = String::from("(");
        for (i, arg) in self.args.iter().enumerate() {
            if !elide.contains(&i) {
                out.push_str(&arg.to_string());
            }
        }
        out.push(')');
        out.push_str(&self.ret.to_string());
        out
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for arg in &self.args {
            write!(f, "{arg}")?;
        }
        write!(f, "){}", self.ret)
    }
}

fn malformed(descriptor: &str, offset: usize, msg: &str) -> DescriptorError {
    DescriptorError::Malformed {
        descriptor: descriptor.to_string(),
        offset,
        msg: msg.to_string(),
    }
}

/// Parses one type starting at `pos`, returning it and the offset just past it.
fn parse_one(descriptor: &str, pos: usize) -> Result<(JavaType, usize), DescriptorError> {
    let bytes = descriptor.as_bytes();
    let mut dims = 0;
    let mut at = pos;
    while bytes.get(at) == Some(&b'[') {
        dims += 1;
        at += 1;
    }
    let Some(&tag) = bytes.get(at) else {
        return Err(malformed(descriptor, at, "unexpected end"));
    };
    let (elem, next) = match tag {
        b'B' => (JavaType::Byte, at + 1),
        b'C' => (JavaType::Char, at + 1),
        b'D' => (JavaType::Double, at + 1),
        b'F' => (JavaType::Float, at + 1),
        b'I' => (JavaType::Int, at + 1),
        b'J' => (JavaType::Long, at + 1),
        b'S' => (JavaType::Short, at + 1),
        b'Z' => (JavaType::Boolean, at + 1),
        b'V' => (JavaType::Void, at + 1),
        b'L' => {
            let end = descriptor[at..]
                .find(';')
                .map(|i| at + i)
                .ok_or_else(|| malformed(descriptor, at, "unterminated class name"))?;
            if end == at + 1 {
                return Err(malformed(descriptor, at, "empty class name"));
            }
            (JavaType::Object(descriptor[at + 1..end].to_string()), end + 1)
        }
        _ => return Err(malformed(descriptor, at, "unknown type tag")),
    };
    if dims == 0 {
        return Ok((elem, next));
    }
    if elem == JavaType::Void {
        return Err(malformed(descriptor, at, "array of void"));
    }
    Ok((JavaType::Array(Box::new(elem), dims), next))
}
