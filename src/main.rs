//! Crewlytics - multi-agent LLM business analytics
//!
//! A CLI tool that asks a crew of role agents (sales, marketing, finance,
//! operations, research) a question about a business CSV and combines
//! their answers into one report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad dataset, config, or retries exhausted)
//!   130 - Cancelled with Ctrl-C

mod agent;
mod analysis;
mod cli;
mod config;
mod dataset;
mod models;
mod report;
mod resilience;

use agent::{AnalyticsCrew, ChatClient, CrewBrief, LlmSettings};
use analysis::DatasetProfile;
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use dataset::Dataset;
use indicatif::{ProgressBar, ProgressStyle};
use models::{AnalysisReport, ReportMetadata};
use resilience::{execute, BackendPool, RetryPolicy, TokioSleeper};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up GROQ_API_KEY and friends from .env
    dotenvy::dotenv().ok();

    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config is read before logging so `[general] verbose` can set the level
    let (mut config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(args.log_level(config.general.verbose));

    info!("Crewlytics v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    log_config_source(&config_source);

    if let Some(records) = args.generate_sample {
        return handle_generate_sample(&args.sample_dir, records);
    }

    match run_analysis(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .crewlytics.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize models, retries, and report options.");
    Ok(())
}

/// Handle --generate-sample: write a synthetic dataset and exit.
fn handle_generate_sample(dir: &Path, records: usize) -> Result<()> {
    let mut rng = rand::thread_rng();
    let path = dataset::sample::write_sample(&mut rng, dir, records)?;

    println!("✅ Wrote {} records to {}", records, path.display());
    Ok(())
}

/// Initialize logging at `level`.
///
/// `RUST_LOG` takes precedence when set.
fn init_logging(level: Level) {
    let level = LevelFilter::from_level(level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete analysis workflow. Returns the exit code.
async fn run_analysis(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    config.validate().map_err(anyhow::Error::msg)?;

    // Step 1: Load and validate the dataset
    let data_arg = args.data.clone().context("A dataset is required (--data)")?;
    let data_path = dataset::resolve_path(&data_arg)?;
    println!("📥 Loading dataset: {}", data_path.display());

    let dataset = Dataset::load(&data_path, &config.dataset.required_columns)?;
    let profile = DatasetProfile::from_dataset(&dataset);
    let dataset_context = profile.to_prompt_context(config.dataset.top_n);

    if args.dry_run {
        return handle_dry_run(&dataset, &dataset_context);
    }

    // Step 2: Set up the crew
    let pool = BackendPool::new(config.model.backends.clone())?;
    let policy = RetryPolicy::try_from(&config.retry).context("Invalid retry delays")?;

    let api_key = args
        .api_key
        .clone()
        .or_else(|| std::env::var(&config.model.api_key_env).ok())
        .filter(|k| !k.trim().is_empty());
    if api_key.is_none() {
        warn!(
            "No API key found in --api-key or {}; requests will be unauthenticated",
            config.model.api_key_env
        );
    }

    println!("🤖 Assembling analytics crew...");
    println!(
        "   Models ({}): {}",
        pool.len(),
        pool.iter().map(|b| b.name()).collect::<Vec<_>>().join(" → ")
    );
    println!("   API: {}", config.model.api_url);
    println!(
        "   Retries: {} (backoff {:.1}s → {:.1}s)",
        policy.max_retries,
        policy.initial_backoff.as_secs_f64(),
        policy.max_backoff.as_secs_f64()
    );

    let client = ChatClient::new(LlmSettings {
        api_url: config.model.api_url.clone(),
        api_key,
        temperature: config.model.temperature,
        max_tokens: config.model.max_tokens,
        frequency_penalty: config.model.frequency_penalty,
        timeout_seconds: config.model.timeout_seconds,
    })?;

    let query = args.query_text().to_string();
    let brief = CrewBrief {
        dataset_path: data_path.display().to_string(),
        dataset_context,
        query: query.clone(),
    };

    let spinner = make_spinner(args.quiet);
    let mut crew = AnalyticsCrew::new(client, brief).with_progress(spinner.clone());

    // Step 3: Run the crew as a background task
    println!("\n🔬 Running analysis. This may take several minutes...\n");
    let mut handle = tokio::spawn(async move {
        execute(&mut crew, &policy, &pool, &TokioSleeper).await
    });

    let joined = tokio::select! {
        joined = &mut handle => joined,
        _ = tokio::signal::ctrl_c() => {
            handle.abort();
            spinner.finish_and_clear();
            warn!("Analysis cancelled by user");
            eprintln!("\n⛔ Analysis cancelled.");
            return Ok(130);
        }
    };
    spinner.finish_and_clear();

    let completed = match joined.context("Analysis task panicked")? {
        Ok(completed) => completed,
        Err(e) => {
            error!("Analysis failed: {}", e);
            eprintln!("\n❌ Analysis failed: {}", e);
            return Ok(1);
        }
    };

    // Step 4: Build the report
    println!("📝 Generating report...");

    let duration = start_time.elapsed().as_secs_f64();
    let action_items = if config.report.include_action_items {
        profile.action_items()
    } else {
        Vec::new()
    };

    let report = AnalysisReport {
        metadata: ReportMetadata {
            dataset: data_path.display().to_string(),
            query,
            analysis_date: Utc::now(),
            model_used: completed.backend.to_string(),
            attempts: completed.attempts,
            records: dataset.len(),
            duration_seconds: duration,
        },
        overview: config.report.include_overview.then_some(profile),
        tasks: completed.output.tasks,
        summary: completed.output.summary,
        optimization: completed.output.optimization,
        action_items,
    };

    // Step 5: Save the report
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    let output_path = Path::new(&config.general.output);
    std::fs::write(output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    if !args.quiet {
        println!("\n=== FINAL ANALYSIS REPORT ===\n");
        println!("{}", report.summary);
    }

    println!("\n📊 Analysis Summary:");
    println!("   Model: {}", report.metadata.model_used);
    println!("   Attempts: {}", report.metadata.attempts);
    println!("   Agent reports: {}", report.tasks.len());
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        output_path.display()
    );

    Ok(0)
}

/// Handle --dry-run: validate and profile the dataset, no LLM calls.
fn handle_dry_run(dataset: &Dataset, dataset_context: &str) -> Result<i32> {
    println!("\n🔍 Dry run: dataset is valid (no LLM call)...\n");
    println!("   Columns: {}", dataset.columns.join(", "));
    println!();
    for line in dataset_context.lines() {
        println!("   {}", line);
    }
    println!("\n✅ Dry run complete. No LLM calls were made.");
    Ok(0)
}

/// Spinner showing which agent is working.
fn make_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} [{elapsed}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Where the configuration came from.
enum ConfigSource {
    File(PathBuf),
    Defaults,
    /// The default file exists but could not be parsed.
    Unreadable(anyhow::Error),
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::File(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigSource::File(PathBuf::from(CONFIG_FILE_NAME)))),
        Ok(None) => Ok((Config::default(), ConfigSource::Defaults)),
        Err(e) => Ok((Config::default(), ConfigSource::Unreadable(e))),
    }
}

fn log_config_source(source: &ConfigSource) {
    match source {
        ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
        ConfigSource::Defaults => debug!("No config file found, using defaults"),
        ConfigSource::Unreadable(e) => warn!("Failed to load config: {:#}", e),
    }
}
