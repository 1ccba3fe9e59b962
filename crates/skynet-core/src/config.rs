//! Configuration loading and typed config structures for the Skynet simulation.
//!
//! The canonical configuration lives in `skynet-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads and validates the file.
//! Every field has a default, so an empty document describes the standard
//! run: 100 days, 10 parts per day, two factions collecting up to 5 parts
//! per night, and an imbalance threshold of 2.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;

/// Environment variable that overrides `world.seed`.
pub const SEED_ENV_VAR: &str = "SKYNET_SEED";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but describes an impossible simulation.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `skynet-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Horizon, seed, and pacing.
    #[serde(default)]
    pub world: WorldConfig,

    /// Factory output.
    #[serde(default)]
    pub production: ProductionConfig,

    /// Faction roster and carrying capacity.
    #[serde(default)]
    pub factions: FactionsConfig,

    /// Fair-share allocation policy.
    #[serde(default)]
    pub fair_share: FairShareConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `SKYNET_SEED` overrides `world.seed` when set to a valid `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (normally the process environment).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an override is present but
    /// cannot be parsed.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = lookup(SEED_ENV_VAR) {
            let seed = raw.trim().parse::<u64>().map_err(|err| ConfigError::Invalid {
                reason: format!("{SEED_ENV_VAR}={raw} is not a valid seed: {err}"),
            })?;
            self.world.seed = Some(seed);
        }
        Ok(())
    }

    /// Check that the configuration describes a runnable simulation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world.days == 0 {
            return Err(invalid("world.days must be at least 1"));
        }
        if self.production.parts_per_day == 0 {
            return Err(invalid("production.parts_per_day must be at least 1"));
        }
        if self.factions.max_parts_per_night == 0 {
            return Err(invalid("factions.max_parts_per_night must be at least 1"));
        }
        if self.factions.labels.is_empty() {
            return Err(invalid("at least one faction label must be configured"));
        }
        let mut seen = BTreeSet::new();
        for label in &self.factions.labels {
            if label.trim().is_empty() {
                return Err(invalid("faction labels must not be blank"));
            }
            if !seen.insert(label.as_str()) {
                return Err(ConfigError::Invalid {
                    reason: format!("duplicate faction label: {label}"),
                });
            }
        }
        Ok(())
    }

    /// Number of factions (`F`).
    pub fn faction_count(&self) -> usize {
        self.factions.labels.len()
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_owned(),
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Simulation horizon in days (`D`).
    #[serde(default = "default_days")]
    pub days: u32,

    /// Random seed for reproducible part sampling. `None` draws from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Real-time milliseconds the factory rests after each cycle (0 = none).
    #[serde(default)]
    pub day_interval_ms: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            days: default_days(),
            seed: None,
            day_interval_ms: 0,
        }
    }
}

/// Factory output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductionConfig {
    /// Parts produced every day (`P`).
    #[serde(default = "default_parts_per_day")]
    pub parts_per_day: usize,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            parts_per_day: default_parts_per_day(),
        }
    }
}

/// Faction roster configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FactionsConfig {
    /// Display names, one per faction. The faction count `F` is the length.
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,

    /// Maximum parts a faction requests per night (`C`).
    #[serde(default = "default_max_parts_per_night")]
    pub max_parts_per_night: usize,
}

impl Default for FactionsConfig {
    fn default() -> Self {
        Self {
            labels: default_labels(),
            max_parts_per_night: default_max_parts_per_night(),
        }
    }
}

/// Fair-share policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FairShareConfig {
    /// Ledger imbalance beyond which a faction is throttled or uncapped (`Δ_max`).
    #[serde(default = "default_imbalance_threshold")]
    pub imbalance_threshold: u64,
}

impl Default for FairShareConfig {
    fn default() -> Self {
        Self {
            imbalance_threshold: default_imbalance_threshold(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable multi-field lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_days() -> u32 {
    100
}

const fn default_parts_per_day() -> usize {
    10
}

fn default_labels() -> Vec<String> {
    vec!["World".to_owned(), "Wednesday".to_owned()]
}

const fn default_max_parts_per_night() -> usize {
    5
}

const fn default_imbalance_threshold() -> u64 {
    2
}

fn default_log_level() -> String {
    "info".to_owned()
}
