//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// Crewlytics - multi-agent LLM business analytics
///
/// Ask a question about a business CSV and get a combined report from
/// sales, marketing, finance, operations and research agents.
///
/// Examples:
///   crewlytics --data sales.csv --query "Which region has the best marketing ROI?"
///   crewlytics --data samples/ --query "Top 3 products by profitability" --format json
///   crewlytics --data sales.csv --dry-run
///   crewlytics --generate-sample 500
///   crewlytics --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// CSV dataset to analyze
    ///
    /// A directory selects its most recent business_data_*.csv file.
    #[arg(
        short,
        long,
        value_name = "PATH",
        env = "CREWLYTICS_DATA",
        required_unless_present_any = ["init_config", "generate_sample"]
    )]
    pub data: Option<PathBuf>,

    /// Question to ask about the data
    #[arg(
        short = 'q',
        long,
        value_name = "TEXT",
        required_unless_present_any = ["init_config", "generate_sample", "dry_run"]
    )]
    pub query: Option<String>,

    /// Models to rotate through on rate limits (comma-separated)
    ///
    /// Example: --models llama3-8b-8192,gemma2-9b-it
    #[arg(long, value_name = "MODELS", value_delimiter = ',', env = "CREWLYTICS_MODELS")]
    pub models: Option<Vec<String>>,

    /// Base URL of the OpenAI-compatible chat API
    #[arg(long, value_name = "URL", env = "CREWLYTICS_API_URL")]
    pub api_url: Option<String>,

    /// API key (defaults to the variable named in the config, GROQ_API_KEY)
    #[arg(long, value_name = "KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .crewlytics.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Total attempts before giving up
    #[arg(long, value_name = "COUNT")]
    pub max_retries: Option<u32>,

    /// First rate-limit backoff in seconds
    #[arg(long, value_name = "SECS")]
    pub initial_backoff: Option<f64>,

    /// Upper bound for the rate-limit backoff in seconds
    #[arg(long, value_name = "SECS")]
    pub max_backoff: Option<f64>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Temperature for LLM responses (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Maximum tokens per agent response
    #[arg(long, value_name = "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Leave the action items out of the report
    #[arg(long)]
    pub no_action_items: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(long)]
    pub quiet: bool,

    /// Validate and profile the dataset without calling the LLM
    #[arg(long)]
    pub dry_run: bool,

    /// Write a synthetic dataset with this many records and exit
    #[arg(
        long,
        value_name = "RECORDS",
        num_args = 0..=1,
        default_missing_value = "1000"
    )]
    pub generate_sample: Option<usize>,

    /// Directory for generated sample datasets
    #[arg(long, default_value = "samples", value_name = "DIR")]
    pub sample_dir: PathBuf,

    /// Generate a default .crewlytics.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config || self.generate_sample.is_some() {
            if self.generate_sample == Some(0) {
                return Err("Sample must contain at least 1 record".to_string());
            }
            return Ok(());
        }

        if self.data.is_none() {
            return Err("A dataset is required (--data)".to_string());
        }

        if !self.dry_run {
            match self.query.as_deref() {
                Some(q) if !q.trim().is_empty() => {}
                _ => return Err("Please enter a question about your data (--query)".to_string()),
            }
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 2.0".to_string());
            }
        }

        if self.max_retries == Some(0) {
            return Err("Max retries must be at least 1".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref models) = self.models {
            if models.iter().all(|m| m.trim().is_empty()) {
                return Err("At least one model name is required".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// The query text, trimmed.
    pub fn query_text(&self) -> &str {
        self.query.as_deref().map(str::trim).unwrap_or("")
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is `[general] verbose` from the config file;
    /// `--quiet` overrides both.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            data: Some(PathBuf::from("sales.csv")),
            query: Some("Which region has the best ROI?".to_string()),
            models: None,
            api_url: None,
            api_key: None,
            output: None,
            format: OutputFormat::Markdown,
            config: None,
            max_retries: None,
            initial_backoff: None,
            max_backoff: None,
            timeout: None,
            temperature: None,
            max_tokens: None,
            no_action_items: false,
            verbose: false,
            quiet: false,
            dry_run: false,
            generate_sample: None,
            sample_dir: PathBuf::from("samples"),
            init_config: false,
        }
    }

    #[test]
    fn test_valid_args() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_blank_query_rejected() {
        let mut args = make_args();
        args.query = Some("   ".to_string());
        assert!(args.validate().is_err());

        args.dry_run = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.api_url = Some("api.groq.com".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_zero_retries_rejected() {
        let mut args = make_args();
        args.max_retries = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_generate_sample_skips_dataset_checks() {
        let mut args = make_args();
        args.data = None;
        args.query = None;
        args.generate_sample = Some(100);
        assert!(args.validate().is_ok());

        args.generate_sample = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_parse_models_list() {
        let args = Args::try_parse_from([
            "crewlytics",
            "--data",
            "sales.csv",
            "--query",
            "growth?",
            "--models",
            "a,b",
        ])
        .unwrap();
        assert_eq!(args.models, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(args.query_text(), "growth?");
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(false), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
    }

    #[test]
    fn test_config_verbose_raises_log_level() {
        let mut config: crate::config::Config =
            toml::from_str("[general]\nverbose = true\n").unwrap();
        let mut args = make_args();
        config.merge_with_args(&args);

        assert!(config.general.verbose);
        assert_eq!(args.log_level(config.general.verbose), tracing::Level::DEBUG);

        args.quiet = true;
        assert_eq!(args.log_level(config.general.verbose), tracing::Level::ERROR);
    }
}
