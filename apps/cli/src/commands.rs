//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use conductor_collect::{
    CollectionReport, CollectorRegistry, JsonFileCollector, PlanExecutor, PlanOutcome,
    PlanProgress,
};
use conductor_shared::{
    AppConfig, CollectionConfig, CollectionResult, init_config, load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

use crate::plan_file::load_plan;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// conductor: bounded-parallel collection across heterogeneous sources.
#[derive(Parser)]
#[command(
    name = "conductor",
    version,
    about = "Run collection plans across data sources with quality gating and entity resolution.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.conductor/conductor.toml.
    #[arg(long = "config", global = true, env = "CONDUCTOR_CONFIG")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Execute a collection plan file.
    Run {
        /// Path to the plan TOML.
        #[arg(long)]
        plan: PathBuf,

        /// Print the outcome as JSON instead of a text summary.
        #[arg(long)]
        json: bool,

        /// Maximum sources collected at once (0 = all at once).
        #[arg(long)]
        max_sources: Option<usize>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "conductor=info",
        1 => "conductor=debug",
        _ => "conductor=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_file;
    match cli.command {
        Command::Run {
            plan,
            json,
            max_sources,
        } => cmd_run(config_path.as_deref(), &plan, json, max_sources).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path.as_deref()).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RunOutput<'a> {
    report: &'a CollectionReport,
    #[serde(flatten)]
    outcome: &'a PlanOutcome,
}

async fn cmd_run(
    config_path: Option<&Path>,
    plan_path: &Path,
    json: bool,
    max_sources: Option<usize>,
) -> Result<()> {
    let app_config = resolve_config(config_path)?;
    let mut collection = CollectionConfig::from(&app_config);
    if let Some(n) = max_sources {
        collection.max_concurrent_sources = n;
    }

    let loaded = load_plan(plan_path)?;
    let mut collectors = CollectorRegistry::new();
    for source in &loaded.sources {
        if !source.path.exists() {
            warn!(source_id = %source.id, path = %source.path.display(), "source file does not exist");
        }
        collectors.register(Arc::new(JsonFileCollector::new(&source.id, &source.path)));
    }

    info!(
        plan_id = %loaded.plan.plan_id,
        sources = loaded.sources.len(),
        "running plan"
    );

    let executor = PlanExecutor::new(collectors, collection);
    let progress: Arc<dyn PlanProgress> = if json {
        Arc::new(conductor_collect::SilentProgress)
    } else {
        Arc::new(CliProgress::new(loaded.sources.len()))
    };
    let outcome = executor
        .execute_plan_with_progress(&loaded.plan, progress)
        .await;
    let report = CollectionReport::from_outcome(&outcome);

    if json {
        let out = RunOutput {
            report: &report,
            outcome: &outcome,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_report(&report, &outcome);
    }

    if report.sources_total > 0 && report.sources_succeeded == 0 {
        return Err(eyre!("every source in plan '{}' failed", report.plan_id));
    }
    Ok(())
}

fn print_report(report: &CollectionReport, outcome: &PlanOutcome) {
    println!();
    println!("  Plan {}", report.plan_id);
    println!(
        "  Sources:   {} ok, {} failed",
        report.sources_succeeded, report.sources_failed
    );
    println!(
        "  Records:   {} admitted of {} collected ({:.1}%)",
        report.records_admitted,
        report.records_collected,
        report.admission_rate * 100.0
    );
    println!("  Quality:   {:.3} avg", report.avg_quality);
    println!(
        "  Time:      {:.2}s critical path, {:.2}s total",
        report.max_duration_s, report.total_duration_s
    );
    println!();

    for r in &outcome.results {
        let status = if r.succeeded { "ok" } else { "FAILED" };
        println!(
            "  {:<16} {:>6}  {:>5}/{:<5} q={:.3} sem={:.0}% {:.2}s",
            r.source_id,
            status,
            r.records_admitted,
            r.records_collected,
            r.avg_quality,
            r.semantic_coverage_pct,
            r.duration_s
        );
    }

    if !outcome.entities.is_empty() {
        println!();
        println!("  Canonical entities ({}):", report.canonical_entities);
        for e in &outcome.entities {
            println!(
                "    {}:{}  conf={:.2}  mentions={}  sources=[{}]",
                e.entity_type,
                e.canonical_form,
                e.confidence,
                e.mention_count,
                e.contributing_sources.join(", ")
            );
        }
    }

    if !report.errors.is_empty() {
        println!();
        println!("  Errors:");
        for (source_id, message) in &report.errors {
            println!("    {source_id}: {message}");
        }
    }
    println!();
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
    total: usize,
    finished: AtomicUsize,
}

impl CliProgress {
    fn new(total: usize) -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self {
            spinner,
            total,
            finished: AtomicUsize::new(0),
        }
    }
}

impl PlanProgress for CliProgress {
    fn source_started(&self, source_id: &str) {
        let done = self.finished.load(Ordering::Relaxed);
        self.spinner
            .set_message(format!("Collecting [{done}/{}] {source_id}", self.total));
    }

    fn source_finished(&self, result: &CollectionResult) {
        let done = self.finished.fetch_add(1, Ordering::Relaxed) + 1;
        if !result.succeeded {
            self.spinner
                .println(format!("  ✗ {} failed", result.source_id));
        }
        self.spinner
            .set_message(format!("Collected [{done}/{}] {}", self.total, result.source_id));
    }

    fn done(&self, _outcome: &PlanOutcome) {
        self.spinner.finish_and_clear();
    }
}
