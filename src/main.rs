// 🔎 bureau-lens CLI - Analyze, categorize, and export bureau timelines
//
// stdout carries only machine-readable output (JSON / TSV / CSV).
// Logs and the analysis fingerprint go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bureau_lens::{
    metric_value, AnalysisError, BureauRegistry, ComparativeAnalysis, ConfigOverrides, Engine,
    EngineConfig, Entity, LoadOptions, LogFormat, Metric, MetricValue,
};

#[derive(Debug, Parser)]
#[command(
    name = "bureau-lens",
    version,
    about = "Multi-bureau temporal credit analysis",
    after_help = "Examples:\n  bureau-lens analyze entity.json --pretty\n  bureau-lens categorize \"Revolving utilization\"\n  bureau-lens timeline entity.json --bureau Experian"
)]
struct Cli {
    /// Config file (defaults to ./bureau-lens.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    log_level: Option<String>,

    /// compact | pretty | json
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run the full analysis and print the result as JSON")]
    Analyze {
        /// Entity envelope JSON, or a bare record list with --entity-id
        file: PathBuf,
        #[arg(long)]
        entity_id: Option<String>,
        #[arg(long)]
        pretty: bool,
        /// Include percent change on every delta
        #[arg(long)]
        percent: bool,
    },
    #[command(about = "Show the category each summary parameter name maps to")]
    Categorize {
        #[arg(required = true)]
        names: Vec<String>,
    },
    #[command(about = "Export one bureau's timeline as CSV")]
    Timeline {
        file: PathBuf,
        #[arg(long)]
        bureau: String,
        #[arg(long)]
        entity_id: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("❌ {:#}", err);
            if err.downcast_ref::<AnalysisError>().is_some() {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let log_format = cli
        .log_format
        .as_deref()
        .map(str::parse::<LogFormat>)
        .transpose()
        .context("invalid --log-format")?;

    let percent = matches!(cli.command, Command::Analyze { percent: true, .. });

    let config = EngineConfig::load(LoadOptions {
        config_path: cli.config.clone(),
        require_file: cli.config.is_some(),
        overrides: ConfigOverrides {
            include_percent_change: percent.then_some(true),
            log_level: cli.log_level.clone(),
            log_format,
            ..ConfigOverrides::default()
        },
    })
    .context("failed to load configuration")?;

    init_logging(&config);

    let engine = Engine::from_config(&config).context("failed to load category table")?;

    match cli.command {
        Command::Analyze {
            file,
            entity_id,
            pretty,
            ..
        } => run_analyze(&engine, &file, entity_id, pretty),
        Command::Categorize { names } => {
            run_categorize(&engine, &names);
            Ok(())
        }
        Command::Timeline {
            file,
            bureau,
            entity_id,
        } => run_timeline(&engine, &file, &bureau, entity_id),
    }
}

fn init_logging(config: &EngineConfig) {
    use tracing::Level;
    use LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt()
                .with_writer(io::stderr)
                .with_target(false)
                .with_max_level(log_level)
                .compact()
                .init();
        }
        Pretty => {
            tracing_subscriber::fmt()
                .with_writer(io::stderr)
                .with_target(false)
                .with_max_level(log_level)
                .pretty()
                .init();
        }
        Json => {
            tracing_subscriber::fmt()
                .with_writer(io::stderr)
                .with_target(false)
                .with_max_level(log_level)
                .json()
                .init();
        }
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

fn run_analyze(engine: &Engine, file: &Path, entity_id: Option<String>, pretty: bool) -> Result<()> {
    let analysis = analyze_file(engine, file, entity_id)?;

    let json = if pretty {
        serde_json::to_string_pretty(&analysis)?
    } else {
        analysis.to_json()?
    };
    println!("{}", json);

    eprintln!("fingerprint: {}", analysis.fingerprint()?);
    Ok(())
}

fn run_categorize(engine: &Engine, names: &[String]) {
    for name in names {
        let classification = engine.table().classify(name);
        println!(
            "{}\t{}\t{}",
            name,
            classification.category,
            classification.matched_by.as_deref().unwrap_or("-")
        );
    }
}

const TIMELINE_HEADER: [&str; 6] = [
    "date",
    "record_id",
    "score",
    "utilization",
    "delinquency_count",
    "parameters",
];

#[derive(Debug, Serialize)]
struct TimelineRow<'a> {
    date: String,
    record_id: &'a str,
    score: String,
    utilization: String,
    delinquency_count: String,
    parameters: usize,
}

fn run_timeline(engine: &Engine, file: &Path, bureau: &str, entity_id: Option<String>) -> Result<()> {
    let bureau = match BureauRegistry::new().normalize(bureau) {
        Some(normalized) => normalized.into_bureau(),
        None => bail!("--bureau must not be blank"),
    };

    let analysis = analyze_file(engine, file, entity_id)?;
    let timeline = match analysis.timeline(&bureau) {
        Some(timeline) => timeline,
        None => bail!("no {} data in {}", bureau, file.display()),
    };

    // Header written by hand so an empty timeline still yields one
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(io::stdout());
    writer.write_record(TIMELINE_HEADER)?;
    for snapshot in &timeline.entries {
        writer.serialize(TimelineRow {
            date: snapshot
                .issued_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            record_id: &snapshot.record_id,
            score: cell(metric_value(snapshot, Metric::Score)),
            utilization: cell(metric_value(snapshot, Metric::Utilization)),
            delinquency_count: cell(metric_value(snapshot, Metric::DelinquencyCount)),
            parameters: snapshot.parameters.len(),
        })?;
    }
    writer.flush()?;

    tracing::info!(bureau = %bureau, rows = timeline.len(), "exported timeline");
    Ok(())
}

// ============================================================================
// HELPERS
// ============================================================================

fn analyze_file(engine: &Engine, file: &Path, entity_id: Option<String>) -> Result<ComparativeAnalysis> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let input: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    let entity = match (input, entity_id) {
        (Value::Array(records), Some(id)) => Entity::new(id, records),
        (Value::Array(_), None) => bail!("a bare record list needs --entity-id"),
        (envelope @ Value::Object(_), override_id) => {
            let mut entity: Entity = serde_json::from_value(envelope)
                .with_context(|| format!("{} is not an entity envelope", file.display()))?;
            if let Some(id) = override_id {
                entity.id = id;
            }
            entity
        }
        _ => bail!("{} must contain an entity object or a record list", file.display()),
    };

    Ok(engine.analyze_entity(&entity)?)
}

/// Number as-is, unavailable values as their reason
fn cell(value: MetricValue) -> String {
    match value {
        MetricValue::Number(n) => n.to_string(),
        MetricValue::Unavailable(reason) => reason.as_str().to_string(),
    }
}
