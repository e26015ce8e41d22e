//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::file_gateway::FileGateway;
use crate::adapters::submission;
use crate::domain::config_validation::{
    backtest_settings, gateway_settings, predict_settings, server_settings,
};
use crate::domain::error::SiglabError;
use crate::domain::template;
use crate::pipeline::{self, BacktestOutcome, PredictOutcome};

#[derive(Parser, Debug)]
#[command(name = "siglab", about = "Run and backtest trading-signal functions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest a strategy function and print the JSON report
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(long)]
        instrument: Option<String>,
        /// Validation date, YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compute this round's predictions and submit them
    Predict {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: PathBuf,
        /// Print the submission CSV instead of submitting it
        #[arg(long)]
        dry_run: bool,
    },
    /// Check that a strategy function loads
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// Print the starter template and the dataset column glossary
    Template,
    /// Start the HTTP service
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            strategy,
            instrument,
            date,
            output,
        } => run_backtest(&config, &strategy, instrument.as_deref(), date.as_deref(), output.as_deref()),
        Command::Predict {
            config,
            strategy,
            dry_run,
        } => run_predict(&config, &strategy, dry_run),
        Command::Validate { strategy } => run_validate(&strategy),
        Command::Template => {
            print!("{}", template::render());
            ExitCode::SUCCESS
        }
        Command::Serve { config } => run_serve(&config),
    }
}

/// Print `err` and map it to the process exit code. Compile errors are shown
/// against the offending source line.
fn fail(err: &SiglabError, source: Option<&str>) -> ExitCode {
    match (err, source) {
        (SiglabError::Compilation(pe), Some(src)) => {
            eprintln!("error: compilation failed\n{}", pe.display_with_context(src));
        }
        _ => eprintln!("error: {err}"),
    }
    ExitCode::from(err)
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, SiglabError> {
    tracing::info!("loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

pub fn read_source(path: &Path) -> Result<String, SiglabError> {
    tracing::info!("loading strategy from {}", path.display());
    Ok(fs::read_to_string(path)?)
}

pub fn backtest_command(
    config_path: &Path,
    source: &str,
    instrument: Option<&str>,
    date: Option<&str>,
) -> Result<BacktestOutcome, SiglabError> {
    let config = load_config(config_path)?;
    let gateway = FileGateway::from_settings(&gateway_settings(&config)?);
    let settings = backtest_settings(&config, instrument, date)?;
    pipeline::backtest(&gateway, source, &settings)
}

pub fn predict_command(
    config_path: &Path,
    source: &str,
    dry_run: bool,
) -> Result<PredictOutcome, SiglabError> {
    let config = load_config(config_path)?;
    let gateway = FileGateway::from_settings(&gateway_settings(&config)?);
    let settings = predict_settings(&config)?;
    if dry_run || settings.dry_run {
        pipeline::predict(&gateway, source, &settings)
    } else {
        pipeline::predict_and_submit(&gateway, source, &settings)
    }
}

fn run_backtest(
    config_path: &Path,
    strategy_path: &Path,
    instrument: Option<&str>,
    date: Option<&str>,
    output: Option<&Path>,
) -> ExitCode {
    let source = match read_source(strategy_path) {
        Ok(s) => s,
        Err(e) => return fail(&e, None),
    };
    let outcome = match backtest_command(config_path, &source, instrument, date) {
        Ok(o) => o,
        Err(e) => return fail(&e, Some(&source)),
    };

    let json = match serde_json::to_string_pretty(&outcome) {
        Ok(j) => j,
        Err(e) => return fail(&SiglabError::Io(e.into()), None),
    };
    match output {
        Some(path) => {
            if let Err(e) = fs::write(path, json) {
                return fail(&SiglabError::Io(e), None);
            }
            eprintln!(
                "{} trades ({} buy, {} sell), total return {:.4}; report written to {}",
                outcome.report.summary.total_trades,
                outcome.report.summary.buy_trades,
                outcome.report.summary.sell_trades,
                outcome.report.summary.total_return,
                path.display()
            );
        }
        None => println!("{json}"),
    }
    ExitCode::SUCCESS
}

fn run_predict(config_path: &Path, strategy_path: &Path, dry_run: bool) -> ExitCode {
    let source = match read_source(strategy_path) {
        Ok(s) => s,
        Err(e) => return fail(&e, None),
    };
    let outcome = match predict_command(config_path, &source, dry_run) {
        Ok(o) => o,
        Err(e) => return fail(&e, Some(&source)),
    };

    match &outcome.status {
        None => match submission::to_csv_string(&outcome.predictions) {
            Ok(csv) => print!("{csv}"),
            Err(e) => return fail(&e, None),
        },
        Some(status) => {
            eprintln!(
                "round {}: {} predictions {}",
                outcome.round_no,
                outcome.rows,
                if status.accepted { "accepted" } else { "rejected" }
            );
            if let Some(stored) = &status.stored_as {
                eprintln!("stored as {stored}");
            }
            if !status.accepted {
                return ExitCode::from(3);
            }
        }
    }
    ExitCode::SUCCESS
}

fn run_validate(strategy_path: &Path) -> ExitCode {
    let source = match read_source(strategy_path) {
        Ok(s) => s,
        Err(e) => return fail(&e, None),
    };
    match pipeline::validate(&source) {
        Ok(name) => {
            println!("{name}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e, Some(&source)),
    }
}

fn run_serve(config_path: &Path) -> ExitCode {
    #[cfg(feature = "web")]
    {
        match serve(config_path) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => fail(&e, None),
        }
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = config_path;
        eprintln!("error: web feature is required for serve");
        ExitCode::from(1)
    }
}

#[cfg(feature = "web")]
fn serve(config_path: &Path) -> Result<(), SiglabError> {
    use crate::adapters::web::{build_router, AppState};
    use std::sync::Arc;

    let config = load_config(config_path)?;
    let gateway = FileGateway::from_settings(&gateway_settings(&config)?);
    let server = server_settings(&config)?;
    // surface a broken [predict] section at startup
    predict_settings(&config)?;

    let state = AppState {
        gateway: Arc::new(gateway),
        config: Arc::new(config),
    };
    let router = build_router(state);
    let addr = format!("{}:{}", server.bind, server.port);

    tokio::runtime::Runtime::new()?.block_on(async {
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("listening on {}", addr);
        axum::serve(listener, router).await
    })?;
    Ok(())
}
