//! Role definitions and prompt construction for the crew.

use crate::models::{AgentRole, TaskOutput};

/// Persona and task of one crew member.
#[derive(Debug, Clone, Copy)]
pub struct RoleProfile {
    pub role: AgentRole,
    pub goal: &'static str,
    pub backstory: &'static str,
    /// Heading of the task output, e.g. "Sales Analysis".
    pub task_title: &'static str,
    /// What the task asks the agent to look at.
    pub task_focus: &'static str,
}

/// Expected layout of every role's answer.
const EXPECTED_OUTPUT: &str = "- Key metrics\n- Analysis\n- Recommendations";

pub fn profile(role: AgentRole) -> RoleProfile {
    match role {
        AgentRole::SalesAnalyst => RoleProfile {
            role,
            goal: "Analyze sales data to uncover performance insights",
            backstory: "Expert in sales analytics with deep understanding of revenue generation",
            task_title: "Sales Analysis",
            task_focus: "Analyze sales performance metrics and identify top products",
        },
        AgentRole::MarketingStrategist => RoleProfile {
            role,
            goal: "Evaluate marketing performance and identify optimal channels",
            backstory: "Strategic marketing expert specializing in ROI analysis",
            task_title: "Marketing Analysis",
            task_focus: "Evaluate marketing campaign effectiveness and ROI",
        },
        AgentRole::FinanceGuardian => RoleProfile {
            role,
            goal: "Monitor financial health and identify fiscal opportunities",
            backstory: "Experienced financial analyst with keen eye for economic trends",
            task_title: "Financial Analysis",
            task_focus: "Review financial patterns and identify opportunities",
        },
        AgentRole::OperationsOptimizer => RoleProfile {
            role,
            goal: "Analyze operational efficiency and identify improvements",
            backstory: "Supply chain and operational efficiency expert",
            task_title: "Operations Analysis",
            task_focus: "Analyze operational efficiency and supply chain metrics",
        },
        AgentRole::ResearchCoordinator => RoleProfile {
            role,
            goal: "Provide contextual market intelligence",
            backstory: "Market research specialist connecting internal data with external trends",
            task_title: "Market Research",
            task_focus: "Provide market context and competitive insights",
        },
    }
}

/// System prompt establishing the agent's persona.
pub fn system_prompt(profile: &RoleProfile) -> String {
    format!(
        "You are the {role}.\nGoal: {goal}\nBackground: {backstory}\n\n\
         Base every figure on the dataset summary you are given. \
         Do not invent columns or numbers that are not in it. \
         Answer in Markdown.",
        role = profile.role,
        goal = profile.goal,
        backstory = profile.backstory,
    )
}

/// User prompt for one role's task.
///
/// Outputs of earlier tasks are passed along as context, so later roles
/// can build on them.
pub fn task_prompt(
    profile: &RoleProfile,
    dataset_path: &str,
    dataset_context: &str,
    query: &str,
    previous: &[TaskOutput],
) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "{} from {}. Query: {}\n\n",
        profile.task_focus, dataset_path, query
    ));
    prompt.push_str("=== DATASET SUMMARY ===\n");
    prompt.push_str(dataset_context);
    prompt.push_str("\n=== END OF DATASET SUMMARY ===\n\n");

    if !previous.is_empty() {
        prompt.push_str("=== FINDINGS FROM OTHER ANALYSTS ===\n");
        for output in previous {
            prompt.push_str(&format!("### {} ({})\n{}\n\n", output.title, output.role, output.content));
        }
        prompt.push_str("=== END OF FINDINGS ===\n\n");
    }

    prompt.push_str(&format!(
        "Respond with this structure:\n# {}\n{}",
        profile.task_title, EXPECTED_OUTPUT
    ));

    prompt
}

/// System prompt for the final combined report.
pub const SYNTHESIS_SYSTEM_PROMPT: &str = "You are a senior business consultant. \
Combine the specialist analyses you are given into one coherent report. \
Resolve contradictions, keep figures consistent with the dataset summary, \
and answer the user's question directly. Answer in Markdown.";

/// User prompt combining all role outputs into the business report.
pub fn synthesis_prompt(query: &str, dataset_context: &str, outputs: &[TaskOutput]) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "Combine all analyses into a comprehensive business report that answers: {}\n\n",
        query
    ));
    prompt.push_str("=== DATASET SUMMARY ===\n");
    prompt.push_str(dataset_context);
    prompt.push_str("\n=== END OF DATASET SUMMARY ===\n\n");

    for output in outputs {
        prompt.push_str(&format!("### {} ({})\n{}\n\n", output.title, output.role, output.content));
    }

    prompt.push_str("Respond with this structure:\n# Business Report\n- Summary\n- Analysis\n- Recommendations");
    prompt
}

/// Heading of the optimization plan written after the business report.
pub const OPTIMIZATION_TITLE: &str = "Optimization Strategy";

/// User prompt turning the business report into an optimization plan.
///
/// Only the business report is given as context, not the individual
/// analyses.
pub fn optimization_prompt(query: &str, business_report: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "Create a strategic optimization plan based on the business analysis of: {}\n\n",
        query
    ));
    prompt.push_str("=== BUSINESS REPORT ===\n");
    prompt.push_str(business_report);
    prompt.push_str("\n=== END OF BUSINESS REPORT ===\n\n");

    prompt.push_str(&format!(
        "Respond with this structure:\n# {}\n- Sales strategies\n- Marketing recommendations\n\
         - Support improvements\n- Financial planning\n- Timeline",
        OPTIMIZATION_TITLE
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_role_has_profile() {
        for role in AgentRole::ALL {
            let p = profile(role);
            assert_eq!(p.role, role);
            assert!(!p.goal.is_empty());
            assert!(!p.task_title.is_empty());
        }
    }

    #[test]
    fn test_task_prompt_contents() {
        let p = profile(AgentRole::MarketingStrategist);
        let previous = vec![TaskOutput {
            role: AgentRole::SalesAnalyst,
            title: "Sales Analysis".to_string(),
            content: "WidgetA leads".to_string(),
        }];

        let prompt = task_prompt(&p, "data.csv", "Records: 10", "Best ROI?", &previous);

        assert!(prompt.starts_with("Evaluate marketing campaign effectiveness and ROI from data.csv. Query: Best ROI?"));
        assert!(prompt.contains("Records: 10"));
        assert!(prompt.contains("WidgetA leads"));
        assert!(prompt.contains("# Marketing Analysis"));
    }

    #[test]
    fn test_first_task_has_no_findings_block() {
        let p = profile(AgentRole::SalesAnalyst);
        let prompt = task_prompt(&p, "data.csv", "Records: 10", "q", &[]);
        assert!(!prompt.contains("FINDINGS"));
    }

    #[test]
    fn test_optimization_prompt_uses_business_report() {
        let prompt = optimization_prompt("Grow Q3?", "# Business Report\nNorth lags.");

        assert!(prompt.contains("Grow Q3?"));
        assert!(prompt.contains("North lags."));
        assert!(prompt.contains("# Optimization Strategy"));
        assert!(prompt.ends_with("- Timeline"));
    }

    #[test]
    fn test_system_prompt_names_role() {
        let prompt = system_prompt(&profile(AgentRole::FinanceGuardian));
        assert!(prompt.starts_with("You are the Finance Guardian."));
    }
}
