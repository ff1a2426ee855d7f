//! LLM agent modules for business analysis.
//!
//! This module provides the role agents, the chat client they share and
//! the sequential crew that runs them.

pub mod crew;
pub mod llm;
pub mod roles;

pub use crew::{AnalyticsCrew, CrewBrief};
pub use llm::{ChatClient, LlmSettings};
