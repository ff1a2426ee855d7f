//! Business dataset loading and validation.
//!
//! Datasets are CSV files with one row per sale. Loading checks the file
//! type, rejects empty files and reports every missing required column
//! at once.

pub mod sample;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Columns every dataset must provide.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "Date",
    "Product",
    "Region",
    "Sales_Amount",
    "Marketing_Campaign",
    "Customer_ACQ_Cost",
    "Support_Tickets",
    "Operational_Cost",
    "Profit_Margin",
    "Market_Trend",
];

/// File name prefix used for generated samples.
pub const SAMPLE_PREFIX: &str = "business_data_";

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Dataset not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid file format: {} (only .csv files are accepted)", .0.display())]
    InvalidExtension(PathBuf),

    #[error("No business_data_*.csv file found in {}", .0.display())]
    NoDatasetInDirectory(PathBuf),

    #[error("The CSV file {} is empty. Please provide a file with data.", .0.display())]
    Empty(PathBuf),

    #[error("Unable to parse the CSV file {}{}: {message}", .path.display(), line_suffix(.line))]
    Parse {
        path: PathBuf,
        line: Option<u64>,
        message: String,
    },

    #[error("CSV file is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Error reading the CSV file: {0}")]
    Io(#[from] std::io::Error),
}

fn line_suffix(line: &Option<u64>) -> String {
    line.map(|l| format!(" (line {})", l)).unwrap_or_default()
}

/// One row of the business dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Product")]
    pub product: String,
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "Sales_Amount")]
    pub sales_amount: f64,
    /// `None` when the sale had no campaign.
    #[serde(rename = "Marketing_Campaign")]
    pub marketing_campaign: Option<String>,
    #[serde(rename = "Customer_ACQ_Cost")]
    pub customer_acq_cost: f64,
    #[serde(rename = "Support_Tickets")]
    pub support_tickets: u32,
    #[serde(rename = "Operational_Cost")]
    pub operational_cost: f64,
    #[serde(rename = "Profit_Margin")]
    pub profit_margin: f64,
    #[serde(rename = "Market_Trend")]
    pub market_trend: String,
}

/// A validated dataset held in memory.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub path: PathBuf,
    pub columns: Vec<String>,
    pub records: Vec<BusinessRecord>,
}

impl Dataset {
    /// Load and validate a dataset.
    ///
    /// `required_columns` extends [`REQUIRED_COLUMNS`]; the built-in columns
    /// are always checked because every record needs them.
    pub fn load(path: &Path, required_columns: &[String]) -> Result<Self, DatasetError> {
        if !path.exists() {
            return Err(DatasetError::NotFound(path.to_path_buf()));
        }

        if !has_csv_extension(path) {
            return Err(DatasetError::InvalidExtension(path.to_path_buf()));
        }

        if std::fs::metadata(path)?.len() == 0 {
            return Err(DatasetError::Empty(path.to_path_buf()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| parse_error(path, e))?;

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| parse_error(path, e))?
            .iter()
            .map(String::from)
            .collect();

        if columns.iter().all(|c| c.is_empty()) {
            return Err(DatasetError::Empty(path.to_path_buf()));
        }

        let missing = missing_columns(&columns, &with_builtin_columns(required_columns));
        if !missing.is_empty() {
            return Err(DatasetError::MissingColumns(missing));
        }

        let mut records = Vec::new();
        for row in reader.deserialize::<BusinessRecord>() {
            records.push(row.map_err(|e| parse_error(path, e))?);
        }

        if records.is_empty() {
            return Err(DatasetError::Empty(path.to_path_buf()));
        }

        info!("Loaded {} records from {}", records.len(), path.display());

        Ok(Self {
            path: path.to_path_buf(),
            columns,
            records,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Earliest and latest record dates.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.records.iter().map(|r| r.date).min()?;
        let last = self.records.iter().map(|r| r.date).max()?;
        Some((first, last))
    }
}

/// Required columns absent from `columns`, in required order.
pub fn missing_columns(columns: &[String], required: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|r| !columns.iter().any(|c| c == *r))
        .cloned()
        .collect()
}

/// [`REQUIRED_COLUMNS`] followed by any extra configured columns.
pub fn with_builtin_columns(extra: &[String]) -> Vec<String> {
    let mut columns: Vec<String> = REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect();
    for column in extra {
        if !columns.contains(column) {
            columns.push(column.clone());
        }
    }
    columns
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Resolve `--data` to a CSV file.
///
/// Files are returned as-is. For a directory, the most recently modified
/// generated sample inside it is chosen.
pub fn resolve_path(path: &Path) -> Result<PathBuf, DatasetError> {
    if !path.exists() {
        return Err(DatasetError::NotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Ok(path.to_path_buf());
    }

    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let name = entry.file_name().to_string_lossy();
        if !entry.file_type().is_file()
            || !name.starts_with(SAMPLE_PREFIX)
            || !has_csv_extension(entry.path())
        {
            continue;
        }

        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        debug!("Candidate dataset: {}", entry.path().display());

        let is_newer = match newest {
            Some((current, ref current_path)) => {
                modified > current || (modified == current && entry.path() > current_path.as_path())
            }
            None => true,
        };
        if is_newer {
            newest = Some((modified, entry.path().to_path_buf()));
        }
    }

    newest
        .map(|(_, p)| p)
        .ok_or_else(|| DatasetError::NoDatasetInDirectory(path.to_path_buf()))
}

fn parse_error(path: &Path, err: csv::Error) -> DatasetError {
    DatasetError::Parse {
        path: path.to_path_buf(),
        line: err.position().map(|p| p.line()),
        message: err.to_string(),
    }
}
