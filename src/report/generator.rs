//! Markdown report generation.
//!
//! This module generates Markdown and JSON business reports from a
//! completed crew run.

use crate::analysis::{DatasetProfile, Metric};
use crate::models::{AnalysisReport, ReportMetadata, TaskOutput};
use anyhow::Result;

/// Rows shown per overview table.
const OVERVIEW_ROWS: usize = 10;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &AnalysisReport) -> String {
    let mut output = String::new();

    output.push_str("# Business Intelligence Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(report));

    if let Some(ref overview) = report.overview {
        output.push_str(&generate_overview_section(overview));
    }

    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_optimization_section(&report.optimization));
    output.push_str(&generate_analyses_section(&report.tasks));
    output.push_str(&generate_action_items_section(&report.action_items));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Dataset:** `{}`\n", metadata.dataset));
    section.push_str(&format!("- **Question:** {}\n", metadata.query));
    section.push_str(&format!(
        "- **Generated on:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", metadata.model_used));
    if metadata.attempts > 1 {
        section.push_str(&format!("- **Attempts:** {}\n", metadata.attempts));
    }
    section.push_str(&format!("- **Records:** {}\n", metadata.records));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(report: &AnalysisReport) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");

    if report.overview.is_some() {
        toc.push_str("- [Dataset Overview](#dataset-overview)\n");
    }

    toc.push_str("- [Business Report](#business-report)\n");
    if !report.optimization.trim().is_empty() {
        toc.push_str("- [Optimization Strategy](#optimization-strategy)\n");
    }
    toc.push_str("- [Specialist Analyses](#specialist-analyses)\n");

    for task in &report.tasks {
        toc.push_str(&format!("  - [{}](#{})\n", task.title, anchor(&task.title)));
    }

    if !report.action_items.is_empty() {
        toc.push_str("- [Action Items](#action-items)\n");
    }

    toc.push('\n');

    toc
}

fn anchor(title: &str) -> String {
    title.replace(' ', "-").to_lowercase()
}

/// Generate the dataset overview section.
fn generate_overview_section(profile: &DatasetProfile) -> String {
    let mut section = String::new();

    section.push_str("## Dataset Overview\n\n");

    section.push_str("| Records | Total Sales | Operational Cost | Avg. Profit Margin |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {:.2} | {:.2} | {:.1}% |\n\n",
        profile.records,
        profile.total_sales,
        profile.total_operational_cost,
        profile.average_profit_margin * 100.0
    ));

    if let (Some(first), Some(last)) = (profile.first_date, profile.last_date) {
        section.push_str(&format!("*Period: {} to {}*\n\n", first, last));
    }

    section.push_str(&metric_table("Sales by Product", "Product", "Sales", &profile.sales_by_product, 2));
    section.push_str(&metric_table("Sales by Region", "Region", "Sales", &profile.sales_by_region, 2));
    section.push_str(&metric_table(
        "Profit Margin by Product",
        "Product",
        "Avg. Margin",
        &profile.margin_by_product,
        3,
    ));
    section.push_str(&metric_table(
        "Campaign Return",
        "Campaign",
        "Sales / Acq. Cost",
        &profile.campaign_roi,
        2,
    ));
    section.push_str(&metric_table(
        "Support Tickets by Region",
        "Region",
        "Tickets",
        &profile.tickets_by_region,
        0,
    ));

    section
}

fn metric_table(title: &str, label: &str, value: &str, metrics: &[Metric], precision: usize) -> String {
    if metrics.is_empty() {
        return String::new();
    }

    let mut table = String::new();

    table.push_str(&format!("### {}\n\n", title));
    table.push_str(&format!("| {} | {} |\n", label, value));
    table.push_str("|:---|:---:|\n");
    for metric in metrics.iter().take(OVERVIEW_ROWS) {
        table.push_str(&format!("| {} | {:.*} |\n", metric.label, precision, metric.value));
    }
    table.push('\n');

    table
}

/// Generate the combined business report section.
fn generate_summary_section(summary: &str) -> String {
    let mut section = String::new();

    section.push_str("## Business Report\n\n");
    section.push_str(&demote_headings(summary));
    section.push_str("\n\n");

    section
}

/// Generate the optimization plan section, if the crew produced one.
fn generate_optimization_section(optimization: &str) -> String {
    if optimization.trim().is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Optimization Strategy\n\n");
    section.push_str(&demote_headings(optimization));
    section.push_str("\n\n");

    section
}

/// Generate the per-role analyses.
fn generate_analyses_section(tasks: &[TaskOutput]) -> String {
    let mut section = String::new();

    section.push_str("## Specialist Analyses\n\n");

    for task in tasks {
        section.push_str(&format!("### {}\n\n", task.title));
        section.push_str(&format!("*{} {}*\n\n", task.role.emoji(), task.role));
        section.push_str(&demote_headings(&task.content));
        section.push_str("\n\n---\n\n");
    }

    section
}

/// Generate the action items section.
fn generate_action_items_section(items: &[String]) -> String {
    if items.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Action Items\n\n");
    section.push_str("**Recommended Action Items:**\n\n");

    for (i, item) in items.iter().enumerate() {
        section.push_str(&format!("{}. {}\n", i + 1, item));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by Crewlytics*\n");

    footer
}

/// Push agent headings below the report's own section levels.
fn demote_headings(content: &str) -> String {
    content
        .trim()
        .lines()
        .map(|line| {
            if line.starts_with('#') {
                format!("###{}", line)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Generate a JSON report.
pub fn generate_json_report(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
