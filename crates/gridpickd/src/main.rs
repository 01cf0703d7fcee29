// # gridpickd - league command line
//
// Thin integration layer: reads the league configuration, wires the race data
// provider and ledger store through the registry, runs one command and exits.
// All league rules live in gridpick-core.
//
// ## Configuration
//
// - `GRIDPICK_CONFIG`: Path to the league JSON file (default `league.json`)
// - `GRIDPICK_LOG_LEVEL`: trace, debug, info, warn or error (default `info`)
//
// ## Example
//
// ```bash
// export GRIDPICK_CONFIG=/etc/gridpick/league.json
//
// gridpickd reset-season --yes
// gridpickd pick alice 1 VER
// gridpickd reconcile
// gridpickd standings --json
// ```

mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use gridpick_core::{
    Error as LedgerError, LeagueConfig, LedgerEvent, PickEngine, ProviderRegistry, SystemClock,
};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use commands::{Command, Outcome};

/// Exit codes for the ways a command can end
///
/// - 0: Success
/// - 1: Configuration or startup error
/// - 2: Runtime error (provider, store)
/// - 3: Request rejected (locked round, usage cap, unknown round/driver/user)
/// - 4: Audit reported inconsistencies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GridpickExitCode {
    Success = 0,
    ConfigError = 1,
    RuntimeError = 2,
    Rejected = 3,
    Inconsistent = 4,
}

impl From<GridpickExitCode> for ExitCode {
    fn from(code: GridpickExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<&LedgerError> for GridpickExitCode {
    fn from(err: &LedgerError) -> Self {
        match err {
            LedgerError::ConstraintViolation { .. }
            | LedgerError::RoundLocked { .. }
            | LedgerError::NotFound(_) => GridpickExitCode::Rejected,
            LedgerError::Config(_) => GridpickExitCode::ConfigError,
            LedgerError::DataInconsistency(_) => GridpickExitCode::Inconsistent,
            _ => GridpickExitCode::RuntimeError,
        }
    }
}

#[derive(Parser)]
#[command(name = "gridpickd", about = "Season-long driver pick league", version)]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

/// Process settings taken from the environment
struct Settings {
    config_path: PathBuf,
    log_level: String,
}

impl Settings {
    fn from_env() -> Self {
        Self {
            config_path: env::var("GRIDPICK_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("league.json")),
            log_level: env::var("GRIDPICK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.config_path.exists() {
            anyhow::bail!(
                "League configuration not found: {}. \
                Set it via: export GRIDPICK_CONFIG=/path/to/league.json",
                self.config_path.display()
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "GRIDPICK_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    fn load_league(&self) -> Result<LeagueConfig> {
        let config = LeagueConfig::from_file(&self.config_path)
            .with_context(|| format!("Failed to load {}", self.config_path.display()))?;
        config.validate().context("Invalid league configuration")?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = Settings::from_env();
    if let Err(e) = settings.validate() {
        eprintln!("Configuration validation error: {}", e);
        return GridpickExitCode::ConfigError.into();
    }

    let config = match settings.load_league() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return GridpickExitCode::ConfigError.into();
        }
    };

    // Logs go to stderr so `--json` output stays parseable
    let subscriber = FmtSubscriber::builder()
        .with_max_level(settings.level())
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return GridpickExitCode::ConfigError.into();
    }

    debug!(
        "League {} loaded: {} player(s)",
        config.season.year,
        config.participants().len()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return GridpickExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run(cli, config)).into()
}

/// Build the engine, run one command, flush the ledger
async fn run(cli: Cli, config: LeagueConfig) -> GridpickExitCode {
    let (engine, events) = match build_engine(config).await {
        Ok(parts) => parts,
        Err(e) => {
            error!("Startup failed: {}", e);
            return GridpickExitCode::from(&e);
        }
    };

    let logger = tokio::spawn(log_events(events));

    let code = match commands::execute(&engine, cli.command, cli.json).await {
        Ok(Outcome::Done) => GridpickExitCode::Success,
        Ok(Outcome::FindingsReported) => GridpickExitCode::Inconsistent,
        Err(e) => {
            eprintln!("{}", e);
            GridpickExitCode::from(&e)
        }
    };

    if let Err(e) = engine.flush().await {
        error!("Failed to flush ledger: {}", e);
        return GridpickExitCode::RuntimeError;
    }

    // Closing the event channel ends the logger
    drop(engine);
    if let Err(e) = logger.await {
        warn!("Event logger ended abnormally: {}", e);
    }

    code
}

async fn build_engine(
    config: LeagueConfig,
) -> gridpick_core::Result<(PickEngine, mpsc::Receiver<LedgerEvent>)> {
    let registry = ProviderRegistry::with_builtin_stores();

    #[cfg(feature = "jolpica")]
    gridpick_provider_jolpica::register(&registry);

    let provider = registry.create_provider(&config.provider)?;
    let store = registry.create_store(&config.store).await?;
    info!(
        "Using {} race data with {} ledger",
        provider.provider_name(),
        config.store.type_name()
    );

    PickEngine::new(provider, store, Arc::new(SystemClock), config)
}

async fn log_events(mut events: mpsc::Receiver<LedgerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            LedgerEvent::ProviderDegraded { lookup, error } => {
                warn!("Provider degraded during {} lookup: {}", lookup, error)
            }
            LedgerEvent::InconsistencyDetected { detail } => {
                warn!("Ledger inconsistency: {}", detail)
            }
            LedgerEvent::SeasonReset { players, rounds } => {
                info!("Season reset: {} player(s), {} round(s)", players, rounds)
            }
            other => debug!("{:?}", other),
        }
    }
}
