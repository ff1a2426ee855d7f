//! Dataset aggregation and statistics.
//!
//! This module computes the deterministic figures that ground the agents'
//! prompts and feed the report's overview tables and action items.

use crate::dataset::{BusinessRecord, Dataset};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label used for sales without a marketing campaign.
pub const NO_CAMPAIGN: &str = "No campaign";

/// Action items appended to every report.
pub const DEFAULT_ACTION_ITEMS: [&str; 5] = [
    "🎯 Review top-performing products and optimize inventory",
    "📈 Analyze marketing campaign effectiveness",
    "💰 Identify cost-saving opportunities",
    "🔄 Optimize operational processes",
    "📊 Monitor market trends and adjust strategy",
];

/// A labelled figure in a breakdown table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub label: String,
    pub value: f64,
}

/// Aggregate view of a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub records: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub total_sales: f64,
    pub total_operational_cost: f64,
    pub average_profit_margin: f64,
    /// Total sales per product, highest first.
    pub sales_by_product: Vec<Metric>,
    /// Total sales per region, highest first.
    pub sales_by_region: Vec<Metric>,
    /// Mean profit margin per product, highest first.
    pub margin_by_product: Vec<Metric>,
    /// Sales divided by acquisition cost per campaign, highest first.
    pub campaign_roi: Vec<Metric>,
    /// Support tickets per region, highest first.
    pub tickets_by_region: Vec<Metric>,
    /// Records per market trend, most frequent first.
    pub market_trends: Vec<Metric>,
}

impl DatasetProfile {
    /// Compute the profile of a loaded dataset.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let records = &dataset.records;
        let (first_date, last_date) = match dataset.date_range() {
            Some((first, last)) => (Some(first), Some(last)),
            None => (None, None),
        };

        let total_sales = records.iter().map(|r| r.sales_amount).sum();
        let total_operational_cost = records.iter().map(|r| r.operational_cost).sum();
        let average_profit_margin = mean(records.iter().map(|r| r.profit_margin));

        let campaign_sales = sum_by(records, campaign_label, |r| r.sales_amount);
        let campaign_cost = sum_by(records, campaign_label, |r| r.customer_acq_cost);
        let campaign_roi = campaign_sales
            .into_iter()
            .filter_map(|(label, sales)| {
                let cost = campaign_cost.get(&label).copied().unwrap_or(0.0);
                (cost > 0.0).then(|| (label, sales / cost))
            })
            .collect::<Vec<_>>();

        Self {
            records: records.len(),
            first_date,
            last_date,
            total_sales,
            total_operational_cost,
            average_profit_margin,
            sales_by_product: ranked(sum_by(records, |r| r.product.clone(), |r| r.sales_amount)),
            sales_by_region: ranked(sum_by(records, |r| r.region.clone(), |r| r.sales_amount)),
            margin_by_product: ranked(mean_by(records, |r| r.product.clone(), |r| r.profit_margin)),
            campaign_roi: ranked(campaign_roi),
            tickets_by_region: ranked(sum_by(
                records,
                |r| r.region.clone(),
                |r| f64::from(r.support_tickets),
            )),
            market_trends: ranked(sum_by(records, |r| r.market_trend.clone(), |_| 1.0)),
        }
    }

    /// Compact text summary embedded in every agent prompt.
    pub fn to_prompt_context(&self, top_n: usize) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Records: {}", self.records));
        if let (Some(first), Some(last)) = (self.first_date, self.last_date) {
            lines.push(format!("Date range: {} to {}", first, last));
        }
        lines.push(format!("Total sales: {:.2}", self.total_sales));
        lines.push(format!(
            "Total operational cost: {:.2}",
            self.total_operational_cost
        ));
        lines.push(format!(
            "Average profit margin: {:.1}%",
            self.average_profit_margin * 100.0
        ));

        push_table(&mut lines, "Sales by product", &self.sales_by_product, top_n, 2);
        push_table(&mut lines, "Sales by region", &self.sales_by_region, top_n, 2);
        push_table(
            &mut lines,
            "Average profit margin by product",
            &self.margin_by_product,
            top_n,
            3,
        );
        push_table(
            &mut lines,
            "Sales per unit of acquisition cost by campaign",
            &self.campaign_roi,
            top_n,
            2,
        );
        push_table(
            &mut lines,
            "Support tickets by region",
            &self.tickets_by_region,
            top_n,
            0,
        );
        push_table(&mut lines, "Market trend counts", &self.market_trends, top_n, 0);

        lines.join("\n")
    }

    /// Data-derived action items followed by the standard ones.
    pub fn action_items(&self) -> Vec<String> {
        let mut items = Vec::new();

        if let Some(top) = self.sales_by_product.first() {
            items.push(format!(
                "Prioritize {}: highest total sales ({:.2})",
                top.label, top.value
            ));
        }
        if let Some(weakest) = self.sales_by_region.last() {
            if self.sales_by_region.len() > 1 {
                items.push(format!(
                    "Investigate {}: lowest regional sales ({:.2})",
                    weakest.label, weakest.value
                ));
            }
        }
        if let Some(best) = self.campaign_roi.first() {
            items.push(format!(
                "Shift budget toward {}: best return on acquisition spend ({:.1}x)",
                best.label, best.value
            ));
        }
        if let Some(busiest) = self.tickets_by_region.first() {
            if busiest.value > 0.0 {
                items.push(format!(
                    "Review support capacity in {}: most support tickets ({:.0})",
                    busiest.label, busiest.value
                ));
            }
        }

        items.extend(DEFAULT_ACTION_ITEMS.iter().map(|s| s.to_string()));
        items
    }
}

fn campaign_label(record: &BusinessRecord) -> String {
    record
        .marketing_campaign
        .clone()
        .unwrap_or_else(|| NO_CAMPAIGN.to_string())
}

/// Sum `value` over records grouped by `key`.
fn sum_by<K, V>(records: &[BusinessRecord], key: K, value: V) -> HashMap<String, f64>
where
    K: Fn(&BusinessRecord) -> String,
    V: Fn(&BusinessRecord) -> f64,
{
    let mut grouped: HashMap<String, f64> = HashMap::new();

    for record in records {
        *grouped.entry(key(record)).or_default() += value(record);
    }

    grouped
}

/// Average `value` over records grouped by `key`.
fn mean_by<K, V>(records: &[BusinessRecord], key: K, value: V) -> HashMap<String, f64>
where
    K: Fn(&BusinessRecord) -> String,
    V: Fn(&BusinessRecord) -> f64,
{
    let mut grouped: HashMap<String, (f64, usize)> = HashMap::new();

    for record in records {
        let entry = grouped.entry(key(record)).or_default();
        entry.0 += value(record);
        entry.1 += 1;
    }

    grouped
        .into_iter()
        .map(|(label, (sum, count))| (label, sum / count as f64))
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Highest value first; ties broken by label for stable output.
fn ranked<I>(values: I) -> Vec<Metric>
where
    I: IntoIterator<Item = (String, f64)>,
{
    let mut metrics: Vec<Metric> = values
        .into_iter()
        .map(|(label, value)| Metric { label, value })
        .collect();

    metrics.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.label.cmp(&b.label))
    });

    metrics
}

fn push_table(
    lines: &mut Vec<String>,
    title: &str,
    metrics: &[Metric],
    top_n: usize,
    precision: usize,
) {
    if metrics.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push(format!("{}:", title));
    for metric in metrics.iter().take(top_n) {
        lines.push(format!("- {}: {:.*}", metric.label, precision, metric.value));
    }
}
