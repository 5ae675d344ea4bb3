//! Cross-version matching: class pairing, method candidate scoring, call-graph refinement,
//! field matching and carrying a previous mapping forward onto a new artifact.
//!
//! [`pipeline::run`] drives every stage end to end; the stages are public so callers can
//! substitute their own class pairing or stop after candidate scoring.

pub mod carry;
pub mod classes;
pub mod config;
pub mod fields;
pub mod pipeline;
pub mod refine;
pub mod scorer;
pub mod similarity;

use serde::Serialize;

pub use classes::{ClassPair, ClassPairing, FixedClassPairing, StructuralClassMatcher};
pub use config::RemapConfig;
pub use fields::FieldMapping;
pub use pipeline::{run, RemapOutcome};
pub use refine::{MethodMapping, RefineReport};

/// A scored pairing of an old member with a new one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match<K> {
    pub old: K,
    pub new: K,
    pub score: f64,
}
