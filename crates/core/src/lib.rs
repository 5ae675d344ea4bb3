//! Class model, instruction model and noise detectors shared by every remora stage.

pub mod artifact;
pub mod descriptor;
pub mod detection;
pub mod insn;
pub mod keys;
pub mod mapping;
pub mod opcode;
pub mod strip;

pub use artifact::{Artifact, ClassDef, ClassKind, FieldDef, MethodDef};
pub use insn::{Constant, Insn, LabelId, TryCatch};
pub use keys::{FieldKey, MethodKey};
pub use opcode::Opcode;
