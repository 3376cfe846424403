//! Congestion CLI
//!
//! `train` fits and persists the artifacts, `predict` scores one JSON
//! record, `synth` writes a synthetic dataset. Logs go to stderr so stdout
//! carries only prediction output.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use congestion_core::{respond, ErrorPayload, PredictionResponse};
use congestion_trainer::{synthetic, train_from_config, PipelineConfig};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "congestion")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Traffic congestion training and prediction", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train on the historical dataset and persist both artifacts
    Train {
        /// Input CSV dataset
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Artifact directory
        #[arg(short, long)]
        artifacts: Option<PathBuf>,

        /// Number of boosting trees
        #[arg(long)]
        trees: Option<usize>,

        /// Seed for the held-out split
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Predict congestion for one JSON record (read from stdin when omitted)
    Predict {
        /// Record as JSON
        input: Option<String>,

        /// Artifact directory
        #[arg(short, long)]
        artifacts: Option<PathBuf>,
    },

    /// Write a deterministic synthetic dataset
    Synth {
        /// Number of rows
        #[arg(long, default_value = "500")]
        rows: usize,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,

        /// Generator seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(default_level(&cli.command, cli.verbose))?;

    match cli.command {
        Command::Train {
            data,
            artifacts,
            trees,
            seed,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(data) = data {
                config.data_path = data;
            }
            if let Some(artifacts) = artifacts {
                config.artifact_dir = artifacts;
            }
            if let Some(trees) = trees {
                config.training.gbdt.num_trees = trees;
            }
            if let Some(seed) = seed {
                config.training.seed = seed;
            }
            config.validate().context("Invalid configuration")?;

            info!("Congestion trainer v{}", congestion_trainer::VERSION);
            let report = train_from_config(&config).context("Training failed")?;
            info!(
                rmse = report.evaluation.rmse,
                r2 = ?report.evaluation.r2,
                model_hash = %report.model_hash,
                artifacts = %config.artifact_dir.display(),
                "Training completed successfully"
            );
            Ok(ExitCode::SUCCESS)
        }

        Command::Predict { input, artifacts } => {
            let response = predict(cli.config.as_deref(), input, artifacts);
            if response.is_success() {
                println!("{}", response.to_json());
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("{}", response.to_json());
                Ok(ExitCode::FAILURE)
            }
        }

        Command::Synth { rows, output, seed } => {
            let records = synthetic::generate(rows, seed);
            congestion_trainer::dataset::write_csv(&output, &records)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!(rows, seed, path = %output.display(), "Synthetic dataset written");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn predict(
    config_path: Option<&Path>,
    input: Option<String>,
    artifacts: Option<PathBuf>,
) -> PredictionResponse {
    let setup = load_config(config_path).and_then(|mut config| {
        if let Some(artifacts) = artifacts {
            config.artifact_dir = artifacts;
        }
        let input = match input {
            Some(input) => input,
            None => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read record from stdin")?;
                buf
            }
        };
        Ok((config, input))
    });

    match setup {
        Ok((config, input)) => {
            respond(&config.artifact_store(), &config.artifact_keys(), &input)
        }
        Err(err) => PredictionResponse::Failure(ErrorPayload {
            error: format!("{err:#}"),
            kind: "invalid_input".to_string(),
            stage: None,
        }),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    PipelineConfig::load(path).context("Failed to load configuration")
}

/// Filter used when RUST_LOG is unset. `predict` keeps stderr down to
/// warnings so an error payload is the only thing a caller has to parse.
fn default_level(command: &Command, verbose: bool) -> &'static str {
    match (command, verbose) {
        (_, true) => "debug",
        (Command::Predict { .. }, false) => "warn",
        _ => "info",
    }
}

fn init_tracing(default_level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {e}"))
}
