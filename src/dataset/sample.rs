//! Synthetic business data for demos and tests.

use crate::dataset::{BusinessRecord, SAMPLE_PREFIX};
use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::info;

const PRODUCTS: [&str; 4] = ["WidgetA", "GadgetB", "ServiceC", "BundleD"];
const REGIONS: [&str; 5] = ["North", "South", "East", "West", "Online"];
const CAMPAIGNS: [Option<&str>; 4] = [
    Some("SpringSale"),
    Some("HolidayBlitz"),
    Some("ReferralProgram"),
    None,
];
const MARKET_TRENDS: [&str; 3] = ["Growing", "Stable", "Declining"];

/// Days back from `today` that generated dates may fall on.
const DATE_SPAN_DAYS: i64 = 730;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Generate one random record dated within the span ending at `today`.
pub fn random_record<R: Rng + ?Sized>(rng: &mut R, today: NaiveDate) -> BusinessRecord {
    let start = today - Duration::days(DATE_SPAN_DAYS);
    let date = start + Duration::days(rng.gen_range(0..=DATE_SPAN_DAYS));

    let sales_amount = round2(rng.gen_range(500.0..50_000.0));
    let operational_cost = round2(rng.gen_range(1_000.0..15_000.0));
    let customer_acq_cost = round2(rng.gen_range(50.0..500.0));
    let total_cost = operational_cost + customer_acq_cost;
    let profit_margin = round2((sales_amount - total_cost) / sales_amount).clamp(0.15, 0.45);

    BusinessRecord {
        date,
        product: PRODUCTS.choose(rng).copied().unwrap_or_default().to_string(),
        region: REGIONS.choose(rng).copied().unwrap_or_default().to_string(),
        sales_amount,
        marketing_campaign: CAMPAIGNS
            .choose(rng)
            .copied()
            .flatten()
            .map(String::from),
        customer_acq_cost,
        support_tickets: rng.gen_range(0..=25),
        operational_cost,
        profit_margin,
        market_trend: MARKET_TRENDS
            .choose(rng)
            .copied()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Generate `count` random records.
pub fn generate_records<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<BusinessRecord> {
    let today = Local::now().date_naive();
    (0..count).map(|_| random_record(rng, today)).collect()
}

/// Write records as CSV to `path`.
pub fn write_records(path: &Path, records: &[BusinessRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for record in records {
        writer
            .serialize(record)
            .with_context(|| format!("Failed to write record to {}", path.display()))?;
    }

    writer.flush()?;
    Ok(())
}

/// Write a timestamped sample dataset into `dir` and return its path.
pub fn write_sample<R: Rng + ?Sized>(rng: &mut R, dir: &Path, count: usize) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let file_name = format!(
        "{}{}.csv",
        SAMPLE_PREFIX,
        Local::now().format("%Y%m%d_%H%M%S")
    );
    let path = dir.join(file_name);

    let records = generate_records(rng, count);
    write_records(&path, &records)?;

    info!("Wrote {} sample records to {}", count, path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, REQUIRED_COLUMNS};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    #[test]
    fn test_records_respect_ranges() {
        let mut rng = StdRng::seed_from_u64(42);
        let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();

        for _ in 0..500 {
            let record = random_record(&mut rng, today);
            assert!(record.date <= today);
            assert!(record.date >= today - Duration::days(DATE_SPAN_DAYS));
            assert!((500.0..=50_000.0).contains(&record.sales_amount));
            assert!((0.15..=0.45).contains(&record.profit_margin));
            assert!(record.support_tickets <= 25);
            assert!(PRODUCTS.contains(&record.product.as_str()));
            assert!(REGIONS.contains(&record.region.as_str()));
        }
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let a = generate_records(&mut StdRng::seed_from_u64(7), 20);
        let b = generate_records(&mut StdRng::seed_from_u64(7), 20);
        assert_eq!(a, b);
    }

    #[test]
    fn test_written_sample_loads_back() {
        let dir = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let path = write_sample(&mut rng, &dir.path().join("samples"), 50).unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(SAMPLE_PREFIX));

        let required: Vec<String> = REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect();
        let dataset = Dataset::load(&path, &required).unwrap();
        assert_eq!(dataset.len(), 50);
    }
}
