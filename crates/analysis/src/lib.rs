//! Per-artifact analyses: liveness, normalization, call graphs, field usage, opaque
//! predicates and field multipliers.

pub mod callgraph;
pub mod field_usage;
pub mod multiplier;
pub mod normalize;
pub mod opaque;
pub mod reachability;

pub use callgraph::CallGraph;
pub use field_usage::{AccessProfile, FieldUsage};
pub use multiplier::MultiplierPair;
pub use normalize::NormalizedMethod;
pub use opaque::OpaqueAnalysis;
pub use reachability::{ReachabilityConfig, ReachabilityScanner};
