//! Error types for the engine binary.

/// Top-level error for the engine binary.
///
/// Each variant wraps a subsystem error so `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: skynet_core::config::ConfigError,
    },

    /// The simulation was interrupted or ended in an inconsistent state.
    #[error("simulation error: {source}")]
    Simulation {
        /// The underlying simulation error.
        #[from]
        source: skynet_core::runner::SimulationError,
    },

    /// The final result could not be written to stdout.
    #[error("output error: {message}")]
    Output {
        /// Description of the output failure.
        message: String,
    },
}
