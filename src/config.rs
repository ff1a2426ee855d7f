//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.crewlytics.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".crewlytics.toml";

/// Longest retry delay accepted, in seconds.
pub const MAX_DELAY_SECS: f64 = 3600.0;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Retry settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Dataset settings.
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "business_report.md".to_string()
}

/// LLM backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Models to rotate through on rate limits, in order.
    #[serde(default = "default_backends")]
    pub backends: Vec<String>,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Temperature for generation.
    #[serde(default)]
    pub temperature: f32,

    /// Maximum tokens in each response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_frequency_penalty")]
    pub frequency_penalty: f32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backends: default_backends(),
            api_url: default_api_url(),
            api_key_env: default_api_key_env(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            frequency_penalty: default_frequency_penalty(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_backends() -> Vec<String> {
    vec![
        "llama3-8b-8192",
        "deepseek-r1-distill-qwen-32b",
        "gemma2-9b-it",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_api_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_frequency_penalty() -> f32 {
    0.1
}

fn default_timeout() -> u64 {
    20
}

/// Retry loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_secs: f64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: f64,

    /// Delay after failures that are not rate limits.
    #[serde(default = "default_flat_delay")]
    pub flat_delay_secs: f64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_secs: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
            flat_delay_secs: default_flat_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_max_retries() -> u32 {
    10
}

fn default_initial_backoff() -> f64 {
    1.0
}

fn default_max_backoff() -> f64 {
    30.0
}

fn default_flat_delay() -> f64 {
    2.0
}

fn default_backoff_multiplier() -> f64 {
    1.5
}

/// Dataset validation and profiling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Columns every dataset must provide. The built-in business columns
    /// are always required; entries here can only add to them.
    #[serde(default = "default_required_columns")]
    pub required_columns: Vec<String>,

    /// Rows shown per breakdown table in prompts and reports.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            required_columns: default_required_columns(),
            top_n: default_top_n(),
        }
    }
}

fn default_required_columns() -> Vec<String> {
    crate::dataset::REQUIRED_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_top_n() -> usize {
    5
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include the dataset overview tables.
    #[serde(default = "default_true")]
    pub include_overview: bool,

    /// Append recommended action items.
    #[serde(default = "default_true")]
    pub include_action_items: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_overview: true,
            include_action_items: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref models) = args.models {
            self.model.backends = models.clone();
        }
        if let Some(ref api_url) = args.api_url {
            self.model.api_url = api_url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(max_tokens) = args.max_tokens {
            self.model.max_tokens = max_tokens;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }

        // Retry settings
        if let Some(max_retries) = args.max_retries {
            self.retry.max_retries = max_retries;
        }
        if let Some(initial) = args.initial_backoff {
            self.retry.initial_backoff_secs = initial;
        }
        if let Some(max) = args.max_backoff {
            self.retry.max_backoff_secs = max;
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        if args.no_action_items {
            self.report.include_action_items = false;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check values that would make the run meaningless.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.backends.is_empty() {
            return Err("At least one model must be configured".to_string());
        }
        if self.retry.max_retries == 0 {
            return Err("max_retries must be at least 1".to_string());
        }
        let delays = [
            self.retry.initial_backoff_secs,
            self.retry.max_backoff_secs,
            self.retry.flat_delay_secs,
        ];
        if delays
            .iter()
            .any(|d| !d.is_finite() || *d < 0.0 || *d > MAX_DELAY_SECS)
        {
            return Err(format!(
                "Retry delays must be between 0 and {} seconds",
                MAX_DELAY_SECS
            ));
        }
        if self.retry.max_backoff_secs < self.retry.initial_backoff_secs {
            return Err("max_backoff_secs must not be below initial_backoff_secs".to_string());
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err("backoff_multiplier must be at least 1.0".to_string());
        }
        if !self.model.api_url.starts_with("http://") && !self.model.api_url.starts_with("https://")
        {
            return Err("API URL must start with 'http://' or 'https://'".to_string());
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.backends.len(), 3);
        assert_eq!(config.model.backends[0], "llama3-8b-8192");
        assert_eq!(config.retry.max_retries, 10);
        assert_eq!(config.retry.flat_delay_secs, 2.0);
        assert!(config.dataset.required_columns.contains(&"Profit_Margin".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "q3.md"

[model]
backends = ["gemma2-9b-it"]
timeout_seconds = 45

[retry]
max_retries = 4
max_backoff_secs = 8.0
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "q3.md");
        assert_eq!(config.model.backends, vec!["gemma2-9b-it"]);
        assert_eq!(config.model.timeout_seconds, 45);
        assert_eq!(config.model.max_tokens, 2048);
        assert_eq!(config.retry.max_retries, 4);
        assert_eq!(config.retry.max_backoff_secs, 8.0);
        assert_eq!(config.retry.initial_backoff_secs, 1.0);
    }

    #[test]
    fn test_validate_rejects_bad_retry_settings() {
        let mut config = Config::default();
        config.retry.max_retries = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.max_backoff_secs = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.backends.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.flat_delay_secs = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_delay() {
        let mut config = Config::default();
        config.retry.max_backoff_secs = 1e20;
        assert!(config.validate().is_err());
        assert!(crate::resilience::RetryPolicy::try_from(&config.retry).is_err());

        config.retry.max_backoff_secs = MAX_DELAY_SECS;
        assert!(config.validate().is_ok());
        let policy = crate::resilience::RetryPolicy::try_from(&config.retry).unwrap();
        assert_eq!(policy.max_backoff.as_secs_f64(), MAX_DELAY_SECS);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[retry]"));
        assert!(toml_str.contains("[dataset]"));
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.retry.backoff_multiplier, 1.5);
    }
}
