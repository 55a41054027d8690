//! mlpipeline CLI: runs the training pipeline described by three YAML documents.

use anyhow::Context;
use clap::Parser;
use mlpipeline::config::ConfigPaths;
use mlpipeline::pipeline::{load_orchestrator, PipelineState};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration-driven ML training pipeline
#[derive(Parser, Debug)]
#[command(name = "mlpipeline", version, about, long_about = None)]
struct Cli {
    /// Pipeline settings document
    #[arg(long, global = true, env = "MLPIPELINE_CONFIG", default_value = "config/config.yaml")]
    config: PathBuf,

    /// Data schema document
    #[arg(long, global = true, env = "MLPIPELINE_SCHEMA", default_value = "schema.yaml")]
    schema: PathBuf,

    /// Hyperparameter document
    #[arg(long, global = true, env = "MLPIPELINE_PARAMS", default_value = "params.yaml")]
    params: PathBuf,

    /// Directory for the JSON log file
    #[arg(long, global = true, env = "MLPIPELINE_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Load the configuration and run every stage in order
    Run,
    /// Load the configuration and check the stage chain without running it
    Check,
}

fn init_tracing(verbose: u8, log_dir: &Path) -> anyhow::Result<WorkerGuard> {
    let filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr; RUST_LOG wins over -v
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)));

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("cannot create log directory {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::never(log_dir, "mlpipeline.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .try_init()?;
    Ok(guard)
}

fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    let paths = ConfigPaths::new(cli.config, cli.schema, cli.params);

    let orchestrator = match load_orchestrator(&paths, None, None) {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            error!(error = %err, "pipeline could not be assembled");
            eprintln!("error: {err}");
            return Ok(ExitCode::from(2));
        }
    };

    if matches!(cli.command, Commands::Check) {
        let stages: Vec<String> = orchestrator
            .stage_kinds()
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("pipeline '{}' is valid: {}", orchestrator.name(), stages.join(" -> "));
        return Ok(ExitCode::SUCCESS);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start the async runtime")?;
    let run = runtime.block_on(orchestrator.run());

    println!("{}", serde_json::to_string_pretty(&run.summary())?);
    Ok(match run.state() {
        PipelineState::Completed => ExitCode::SUCCESS,
        _ => ExitCode::from(1),
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match init_tracing(cli.verbose, &cli.log_dir) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::from(2);
        }
    };

    match execute(cli) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "mlpipeline failed");
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}
