//! Command-line driver for the Skynet simulation.
//!
//! Loads configuration, runs one simulation with a factory and its
//! factions, and writes the final [`SimulationResult`] to stdout as JSON.
//! Logs go to stderr.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `SKYNET_CONFIG` or `skynet-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the simulation (coordinator, factory, factions)
//! 4. Wire Ctrl-C to stop the simulation
//! 5. Run the day/night cycle to the horizon
//! 6. Print the result

mod error;
mod progress;

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use skynet_core::config::{LogFormat, SimulationConfig};
use skynet_core::runner::Simulation;
use skynet_types::SimulationResult;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::progress::ProgressCallback;

/// Environment variable naming the configuration file.
const CONFIG_ENV_VAR: &str = "SKYNET_CONFIG";

/// Configuration file used when [`CONFIG_ENV_VAR`] is unset.
const DEFAULT_CONFIG_PATH: &str = "skynet-config.yaml";

/// Days between `info` progress lines.
const PROGRESS_INTERVAL: u32 = 10;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the run is interrupted,
/// or the result cannot be written.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, config_found) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config);
    info!("skynet-engine starting");
    if !config_found {
        info!("Config file not found, using defaults");
    }
    info!(
        days = config.world.days,
        seed = config.world.seed,
        parts_per_day = config.production.parts_per_day,
        max_parts_per_night = config.factions.max_parts_per_night,
        imbalance_threshold = config.fair_share.imbalance_threshold,
        "Configuration loaded"
    );

    // 3. Build the simulation.
    let simulation = Simulation::new(config).map_err(EngineError::from)?;
    info!(
        factions = simulation.factions().len(),
        horizon = simulation.coordinator().horizon(),
        "Simulation assembled"
    );

    // 4. Ctrl-C stops the run and releases every parked participant.
    {
        let coordinator = Arc::clone(simulation.coordinator());
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    warn!("Interrupt received, stopping simulation");
                    coordinator.stop_simulation();
                }
                Err(e) => {
                    warn!(error = %e, "failed to listen for Ctrl-C, interrupt disabled");
                }
            }
        });
    }

    // 5. Run the simulation.
    let result = simulation
        .run(Box::new(ProgressCallback::new(PROGRESS_INTERVAL)))
        .await
        .map_err(EngineError::from)?;

    // 6. Print the result.
    write_result(&result)?;

    info!(
        run_id = %result.run_id,
        winner = result.winner.label(),
        days = result.days_elapsed,
        "skynet-engine shutdown complete"
    );

    Ok(())
}

/// Load configuration from the path in `SKYNET_CONFIG`, falling back to
/// `skynet-config.yaml` in the working directory.
///
/// A missing file yields the defaults, still subject to environment
/// overrides and validation. Returns whether a file was found.
fn load_config() -> Result<(SimulationConfig, bool), EngineError> {
    let config_path = std::env::var_os(CONFIG_ENV_VAR)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    if config_path.exists() {
        let config = SimulationConfig::from_file(&config_path)?;
        Ok((config, true))
    } else {
        let mut config = SimulationConfig::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok((config, false))
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(config: &SimulationConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn write_result(result: &SimulationResult) -> Result<(), EngineError> {
    let json = serde_json::to_string_pretty(result).map_err(|e| EngineError::Output {
        message: format!("failed to serialize result: {e}"),
    })?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{json}").map_err(|e| EngineError::Output {
        message: format!("failed to write result: {e}"),
    })
}
