#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command line for the Bekasi flood analysis.
//!
//! ```text
//! bekasi_flood --scenario demos/bekasi_2020.json run pre
//! bekasi_flood --backend-url http://localhost:8080 run-all --json
//! bekasi_flood config
//! ```
//!
//! Running `bekasi_flood` with no subcommand enters interactive mode.
//!
//! Uses `indicatif-log-bridge` (via [`bekasi_flood_cli_utils::init_logger`])
//! so log lines and progress bars never fight for the terminal.

mod report;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bekasi_flood_backend::EvaluationBackend;
use bekasi_flood_backend::http::HttpBackend;
use bekasi_flood_backend::memory::Scenario;
use bekasi_flood_cli_utils::{IndicatifProgress, MultiProgress};
use bekasi_flood_config::FloodConfig;
use bekasi_flood_geography_models::Period;
use bekasi_flood_pipeline::{FloodPipeline, PeriodOutcome, PipelineError};
use bekasi_flood_spatial::AoiPolygon;
use clap::{Parser, Subcommand};
use dialoguer::Select;

#[derive(Parser)]
#[command(
    name = "bekasi_flood",
    about = "Flood change detection and risk scoring for Bekasi"
)]
struct Cli {
    /// Configuration file (defaults to the embedded Bekasi configuration)
    #[arg(long, global = true, env = "BEKASI_FLOOD_CONFIG")]
    config: Option<PathBuf>,

    /// Scenario file for the in-memory evaluation backend
    #[arg(long, global = true, conflicts_with = "backend_url")]
    scenario: Option<PathBuf>,

    /// Base URL of a remote evaluation backend
    #[arg(long, global = true, env = "BEKASI_FLOOD_BACKEND_URL")]
    backend_url: Option<String>,

    /// GeoJSON polygon replacing the configured area of interest
    #[arg(long, global = true)]
    aoi: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Commands {
    /// Run one analysis period
    Run {
        /// Period to run: pre, during or post
        period: String,
    },
    /// Run pre, during and post in order
    RunAll,
    /// Print the effective configuration as TOML
    Config,
}

/// Choices offered in interactive mode.
enum Action {
    Period(Period),
    RunAll,
    ShowConfig,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Period(Period::Pre),
        Self::Period(Period::During),
        Self::Period(Period::Post),
        Self::RunAll,
        Self::ShowConfig,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Period(Period::Pre) => "Pre-flood risk scoring",
            Self::Period(Period::During) => "During-flood detection",
            Self::Period(Period::Post) => "Post-flood recovery",
            Self::RunAll => "All periods",
            Self::ShowConfig => "Show configuration",
        }
    }

    fn command(&self) -> Commands {
        match self {
            Self::Period(period) => Commands::Run {
                period: period.to_string(),
            },
            Self::RunAll => Commands::RunAll,
            Self::ShowConfig => Commands::Config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = bekasi_flood_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => FloodConfig::load(path)?,
        None => FloodConfig::bekasi(),
    };

    let command = match cli.command {
        Some(command) => command,
        None => pick_action()?.command(),
    };

    if matches!(command, Commands::Config) {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let backend = connect(cli.scenario.as_deref(), cli.backend_url.as_deref()).await?;
    let mut pipeline = FloodPipeline::new(backend, config)?;
    if let Some(path) = &cli.aoi {
        pipeline = pipeline.with_area_of_interest(load_aoi(path).await?);
    }

    match command {
        Commands::Run { period } => {
            let pipeline = pipeline.with_progress(IndicatifProgress::new(&multi));
            let outcome = pipeline.run_str(&period).await?;
            print_outcome(&outcome, cli.json)?;
        }
        Commands::RunAll => {
            let outcomes = run_all(pipeline, &multi).await;
            let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();
            print_all(&outcomes, cli.json)?;
            if failed > 0 {
                eprintln!("{failed} period(s) failed");
                std::process::exit(1);
            }
        }
        Commands::Config => {}
    }

    Ok(())
}

fn pick_action() -> Result<&'static Action, dialoguer::Error> {
    println!("Bekasi Flood Analysis");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();
    let idx = Select::new()
        .with_prompt("Which analysis would you like to run?")
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(&Action::ALL[idx])
}

async fn connect(
    scenario: Option<&Path>,
    backend_url: Option<&str>,
) -> Result<Arc<dyn EvaluationBackend>, Box<dyn std::error::Error>> {
    if let Some(path) = scenario {
        let backend = Scenario::load(path).await?.into_backend()?;
        return Ok(Arc::new(backend));
    }
    if let Some(url) = backend_url {
        let backend = HttpBackend::new(url)?;
        log::info!("Using evaluation backend at {}", backend.endpoint());
        return Ok(Arc::new(backend));
    }
    Err("no evaluation backend: pass --scenario <file> or --backend-url <url>".into())
}

async fn load_aoi(path: &Path) -> Result<AoiPolygon, Box<dyn std::error::Error>> {
    let geojson = tokio::fs::read_to_string(path).await?;
    let name = path
        .file_stem()
        .map_or_else(|| "custom".to_string(), |stem| stem.to_string_lossy().into_owned());
    Ok(AoiPolygon::from_geojson(&name, &geojson)?)
}

async fn run_all(
    pipeline: FloodPipeline,
    multi: &MultiProgress,
) -> Vec<(Period, Result<Arc<PeriodOutcome>, PipelineError>)> {
    pipeline
        .with_progress(IndicatifProgress::new(multi))
        .run_all()
        .await
}

fn print_outcome(outcome: &PeriodOutcome, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        print!("{}", report::summary(outcome));
    }
    Ok(())
}

fn print_all(
    outcomes: &[(Period, Result<Arc<PeriodOutcome>, PipelineError>)],
    json: bool,
) -> Result<(), serde_json::Error> {
    if json {
        let mut map = serde_json::Map::new();
        for (period, result) in outcomes {
            let value = match result {
                Ok(outcome) => serde_json::to_value(outcome.as_ref())?,
                Err(e) => serde_json::json!({ "error": e.to_string() }),
            };
            map.insert(period.to_string(), value);
        }
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    for (period, result) in outcomes {
        match result {
            Ok(outcome) => print!("{}", report::summary(outcome)),
            Err(e) => println!("{}: failed: {e}", period.label()),
        }
        println!();
    }
    Ok(())
}
