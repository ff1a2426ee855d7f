//! Data models for the analytics crew.
//!
//! This module contains the core data structures shared by the crew,
//! the report generator and the CLI.

use crate::analysis::DatasetProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The specialist roles in the crew, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    SalesAnalyst,
    MarketingStrategist,
    FinanceGuardian,
    OperationsOptimizer,
    ResearchCoordinator,
}

impl AgentRole {
    /// All roles in the order their tasks run.
    pub const ALL: [AgentRole; 5] = [
        AgentRole::SalesAnalyst,
        AgentRole::MarketingStrategist,
        AgentRole::FinanceGuardian,
        AgentRole::OperationsOptimizer,
        AgentRole::ResearchCoordinator,
    ];

    /// Returns an emoji representation of the role.
    pub fn emoji(&self) -> &'static str {
        match self {
            AgentRole::SalesAnalyst => "📊",
            AgentRole::MarketingStrategist => "📈",
            AgentRole::FinanceGuardian => "💰",
            AgentRole::OperationsOptimizer => "⚙️",
            AgentRole::ResearchCoordinator => "🔍",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentRole::SalesAnalyst => write!(f, "Sales Analyst"),
            AgentRole::MarketingStrategist => write!(f, "Marketing Strategist"),
            AgentRole::FinanceGuardian => write!(f, "Finance Guardian"),
            AgentRole::OperationsOptimizer => write!(f, "Operations Optimizer"),
            AgentRole::ResearchCoordinator => write!(f, "Research Coordinator"),
        }
    }
}

/// Output of one agent task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutput {
    pub role: AgentRole,
    /// Short task title, e.g. "Sales Analysis".
    pub title: String,
    pub content: String,
}

/// Everything one successful crew run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewOutput {
    /// Per-role analyses in execution order.
    pub tasks: Vec<TaskOutput>,
    /// The combined business report.
    pub summary: String,
    /// Optimization plan derived from the business report.
    pub optimization: String,
}

/// Metadata about the analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Path of the analyzed dataset.
    pub dataset: String,
    /// The user's question.
    pub query: String,
    pub analysis_date: DateTime<Utc>,
    /// Model that produced the final answer.
    pub model_used: String,
    /// Attempts the retry loop needed.
    pub attempts: u32,
    pub records: usize,
    pub duration_seconds: f64,
}

/// The complete analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metadata: ReportMetadata,
    /// Aggregates of the dataset; omitted when disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<DatasetProfile>,
    pub tasks: Vec<TaskOutput>,
    pub summary: String,
    #[serde(default)]
    pub optimization: String,
    pub action_items: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_order_and_names() {
        assert_eq!(AgentRole::ALL[0], AgentRole::SalesAnalyst);
        assert_eq!(AgentRole::ALL[4].to_string(), "Research Coordinator");
        assert_eq!(AgentRole::FinanceGuardian.emoji(), "💰");
    }

    #[test]
    fn test_role_serializes_snake_case() {
        let json = serde_json::to_string(&AgentRole::OperationsOptimizer).unwrap();
        assert_eq!(json, "\"operations_optimizer\"");
    }
}
