//! CLI entry point for dataset category classification and column mapping.

use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use lex_mapping::ai::AIProvider;
use lex_mapping::{
    Category, ClosureProgressReporter, ConfirmedMapping, MappingConfig, MappingSession,
    RetryPolicy, SchemaRegistry, SessionSummary, dataset,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[cfg(feature = "ai")]
use lex_mapping::ai::{GeminiConfig, GeminiProvider, OpenRouterConfig, OpenRouterProvider};
#[cfg(feature = "ai")]
use std::env;

/// CLI-compatible provider selection
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliProvider {
    /// OpenRouter (OpenAI-compatible chat completions)
    Openrouter,
    /// Google Gemini
    Gemini,
}

#[derive(Parser, Debug)]
#[command(
    author = "Lex Machina Team",
    version,
    about = "AI-assisted dataset category classification and column mapping",
    long_about = "Identifies the category of a dataset from its column names, maps its columns \
                  to the standard columns of that category and exports the renamed dataset.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  OPENROUTER_API_KEY    API key for OpenRouter (--provider openrouter)\n  \
                  GEMINI_API_KEY        API key for Gemini (--provider gemini)\n\n\
                  EXAMPLES:\n  \
                  # Classify, map and export\n  \
                  lex-mapping -i billing.csv\n\n  \
                  # Preview the suggested mapping\n  \
                  lex-mapping -i billing.csv --dry-run\n\n  \
                  # Fix one column of the suggestion\n  \
                  lex-mapping -i billing.csv --set DueDate=due_dt\n\n  \
                  # No AI at all\n  \
                  lex-mapping -i billing.csv --category billing --manual \\\n    \
                  --set CustomerID=cust --set BillingDate=date --set Revenue=amount"
)]
struct Args {
    /// Path to the dataset (csv, tsv, json, ndjson, parquet, xlsx, ods)
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for the mapped dataset
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Output file name (without extension)
    #[arg(long, default_value = "mapped_data")]
    output_name: String,

    /// Skip identification and use this category
    #[arg(long, value_parser = parse_category_arg)]
    category: Option<Category>,

    /// Skip the mapping suggestion and start with every column unset
    #[arg(long)]
    manual: bool,

    /// Assign an input column to a standard column (repeatable)
    #[arg(long = "set", value_name = "STANDARD=INPUT", value_parser = parse_assignment)]
    assignments: Vec<(String, String)>,

    /// Unset a standard column (repeatable, applied before --set)
    #[arg(long = "unset", value_name = "STANDARD")]
    unsets: Vec<String>,

    /// AI provider used for suggestions and validation
    #[arg(long, value_enum, default_value = "openrouter")]
    provider: CliProvider,

    /// Model name passed to the provider
    #[arg(long)]
    model: Option<String>,

    /// Retries after the first attempt of each suggestion
    #[arg(long, default_value = "3")]
    max_retries: u32,

    /// Delay between attempts in milliseconds
    #[arg(long, default_value = "3000")]
    retry_delay_ms: u64,

    /// JSON file with the standard columns per category
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Show the suggested mapping without confirming or exporting
    #[arg(long)]
    dry_run: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all progress logs; only outputs the final JSON report.
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,
}

fn parse_category_arg(value: &str) -> std::result::Result<Category, String> {
    let category: Category = value.parse().map_err(|e| format!("{e}"))?;
    if !category.is_identified() {
        return Err(format!("'{}' cannot be mapped", category));
    }
    Ok(category)
}

fn parse_assignment(value: &str) -> std::result::Result<(String, String), String> {
    let (standard, input) = value
        .split_once('=')
        .ok_or_else(|| format!("expected STANDARD=INPUT, got '{}'", value))?;
    let (standard, input) = (standard.trim(), input.trim());
    if standard.is_empty() || input.is_empty() {
        return Err(format!("expected STANDARD=INPUT, got '{}'", value));
    }
    Ok((standard.to_string(), input.to_string()))
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Final report printed with `--json`.
#[derive(Serialize)]
struct CliReport<'a> {
    input_file: String,
    output_file: Option<String>,
    dry_run: bool,
    summary: SessionSummary,
    mapping: Option<&'a lex_mapping::ColumnMapping>,
    confirmed: Option<&'a ConfirmedMapping>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    dotenv().ok();

    if !args.input.exists() {
        return Err(anyhow!("Input file not found: {}", args.input.display()));
    }

    let mut config_builder = MappingConfig::builder()
        .retry(RetryPolicy::new(
            args.max_retries,
            Duration::from_millis(args.retry_delay_ms),
        ))
        .output_dir(&args.output)
        .output_name(&args.output_name);
    if let Some(ref schema) = args.schema {
        config_builder = config_builder.schema_path(schema);
    }
    let config = config_builder.build()?;

    let registry = match config.schema_path {
        Some(ref path) => SchemaRegistry::from_path(path)?,
        None => SchemaRegistry::builtin()?,
    };

    info!("Loading dataset from: {}", args.input.display());
    let df = dataset::load_dataset(&args.input)?;
    let columns = dataset::column_names(&df);
    info!("Dataset loaded: {} rows, columns {:?}", df.height(), columns);

    let needs_ai = args.category.is_none() || !args.manual;
    let provider: Arc<dyn AIProvider> = match build_provider(&args)? {
        Some(provider) => provider,
        None if needs_ai => {
            return Err(anyhow!(
                "No AI provider available. Set the API key for --provider, \
                 or pass --category and --manual to map without AI."
            ));
        }
        None => Arc::new(OfflineProvider),
    };

    let mut session = MappingSession::new(provider, Arc::new(registry), &config, columns);
    if !args.quiet && !args.json {
        session = session.with_progress(Arc::new(ClosureProgressReporter::new(|update| {
            info!("{}: {}", update.stage.display_name(), update.message);
        })));
    }

    run_session(&mut session, &args)?;

    if args.dry_run {
        return print_output(&session, &args, None);
    }

    let confirmed = session.confirm_mapping()?.clone();
    let path = dataset::export_mapped(df, &confirmed, &config.output_dir, &config.output_name)?;
    print_output(&session, &args, Some(&path))
}

/// Walk the session up to (not including) mapping confirmation.
fn run_session(session: &mut MappingSession, args: &Args) -> Result<()> {
    match args.category {
        Some(category) => {
            info!("Using category from command line: {}", category);
            session.confirm_category(Some(category))?;
        }
        None => {
            let outcome = session.identify_category()?;
            let suggested = outcome.result;
            if !outcome.is_valid {
                warn!("Category not validated: {}", outcome.message);
            }
            session.confirm_category(None).map_err(|e| {
                anyhow!(
                    "Could not use identified category '{}': {}. Pass --category to choose one.",
                    suggested,
                    e
                )
            })?;
        }
    }

    if args.manual {
        session.start_manual_mapping()?;
    } else {
        let outcome = session.suggest_mapping()?;
        if !outcome.is_valid {
            warn!(
                "Mapping suggestion not validated after {} attempt(s): {}",
                outcome.attempts, outcome.message
            );
        }
    }

    let reconciler = session
        .reconciler_mut()
        .ok_or_else(|| anyhow!("Mapping was not started"))?;
    for standard in &args.unsets {
        reconciler.set(standard, None)?;
    }
    for (standard, input) in &args.assignments {
        reconciler.set(standard, Some(input.as_str()))?;
    }

    Ok(())
}

#[cfg(feature = "ai")]
fn build_provider(args: &Args) -> Result<Option<Arc<dyn AIProvider>>> {
    match args.provider {
        CliProvider::Openrouter => {
            let Ok(api_key) = env::var("OPENROUTER_API_KEY") else {
                warn!("OPENROUTER_API_KEY not set");
                return Ok(None);
            };
            let mut builder = OpenRouterConfig::builder();
            if let Some(ref model) = args.model {
                builder = builder.model(model);
            }
            info!("Using OpenRouter");
            Ok(Some(Arc::new(OpenRouterProvider::with_config(
                api_key,
                builder.build(),
            )?)))
        }
        CliProvider::Gemini => {
            let Ok(api_key) = env::var("GEMINI_API_KEY") else {
                warn!("GEMINI_API_KEY not set");
                return Ok(None);
            };
            let mut builder = GeminiConfig::builder();
            if let Some(ref model) = args.model {
                builder = builder.model(model);
            }
            info!("Using Gemini");
            Ok(Some(Arc::new(GeminiProvider::with_config(
                api_key,
                builder.build(),
            )?)))
        }
    }
}

#[cfg(not(feature = "ai"))]
fn build_provider(args: &Args) -> Result<Option<Arc<dyn AIProvider>>> {
    warn!(
        "AI support not compiled in, ignoring --provider {:?}. Compile with --features ai to enable it.",
        args.provider
    );
    Ok(None)
}

/// Stand-in provider for fully manual runs; never reached in that mode.
struct OfflineProvider;

impl AIProvider for OfflineProvider {
    fn invoke(&self, _request: &lex_mapping::ai::CompletionRequest) -> Result<String> {
        Err(anyhow!("No AI provider configured"))
    }

    fn name(&self) -> &str {
        "Offline"
    }
}

/// Print the outcome as JSON (`--json`) or as a human-readable summary.
///
/// Uses `println!` intentionally: this is the CLI's primary output and must
/// be visible regardless of log level.
fn print_output(session: &MappingSession, args: &Args, output_file: Option<&Path>) -> Result<()> {
    let summary = session.summary();

    if args.json {
        let report = CliReport {
            input_file: args.input.display().to_string(),
            output_file: output_file.map(|p| p.display().to_string()),
            dry_run: args.dry_run,
            summary,
            mapping: session.reconciler().map(|r| r.mapping()),
            confirmed: session.confirmed_mapping(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!("{}", "=".repeat(80));
    if args.dry_run {
        println!("DRY RUN - Suggested mapping (nothing was exported)");
    } else {
        println!("MAPPING COMPLETE");
    }
    println!("{}", "=".repeat(80));
    println!();

    println!("Input: {}", args.input.display());
    if let Some(category) = summary.category {
        let validated = match summary.category_validated {
            Some(true) => " (validated)",
            Some(false) => " (not validated)",
            None => "",
        };
        println!("Category: {}{}", category, validated);
    }
    if let (Some(suggested), Some(total)) = (summary.suggested_columns, summary.total_standard_columns)
    {
        println!("AI suggested {} of {} standard columns", suggested, total);
    }
    if let Some(ref message) = summary.validation_message {
        println!("Validation: {}", message);
    }
    println!();

    if let Some(reconciler) = session.reconciler() {
        println!("{:<24} {:<24} {:<10}", "Standard column", "Input column", "Required");
        println!("{}", "-".repeat(60));
        for standard in reconciler.schema().all_columns() {
            println!(
                "{:<24} {:<24} {:<10}",
                standard,
                reconciler.mapping().get(standard).unwrap_or("-"),
                if reconciler.schema().is_mandatory(standard) { "yes" } else { "" }
            );
        }
        println!();

        let available = reconciler.propose_available_inputs();
        if !available.is_empty() {
            println!("Unmapped input columns: {}", available.join(", "));
        }
    }

    if !summary.unmapped_mandatory.is_empty() {
        println!(
            "Missing mandatory columns: {} (use --set STANDARD=INPUT)",
            summary.unmapped_mandatory.join(", ")
        );
    }

    if let Some(path) = output_file {
        println!("Output: {}", path.display());
    }
    println!();
    println!("Use --json for machine-readable output");

    Ok(())
}
