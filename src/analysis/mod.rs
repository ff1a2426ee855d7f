//! Analysis modules.
//!
//! Deterministic statistics computed locally before any agent runs.

pub mod insights;

pub use insights::*;
