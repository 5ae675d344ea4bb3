//! Shared error types for the remora workspace.

pub mod errors;
