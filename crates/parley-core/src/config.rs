//! Configuration loading and typed config structures for the Parley simulation.
//!
//! The canonical configuration lives in `parley-config.yaml` at the project
//! root. Every field has a default, so an empty document is a valid
//! configuration.

use std::path::Path;

use parley_agents::{CultureKind, PlanningConfig};
use parley_types::AgentId;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `logging.level`.
pub const LOG_LEVEL_ENV: &str = "PARLEY_LOG";

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
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// Step loop settings.
    #[serde(default)]
    pub simulation: SimulationSettings,

    /// Planning and negotiation parameters.
    #[serde(default)]
    pub planning: PlanningConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `PARLEY_LOG` overrides `logging.level` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.logging.apply_env_overrides();
        Ok(config)
    }
}

/// Step loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimulationSettings {
    /// Seed for the simulator's random source.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Steps to run before giving up.
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,

    /// Whether agents negotiate before moving.
    #[serde(default = "default_communication")]
    pub communication: bool,

    /// The agent whose collisions reject a step and cost points. Its moves
    /// come from a direction source.
    #[serde(default = "default_primary_agent")]
    pub primary_agent: Option<AgentId>,

    /// Argument catalog.
    #[serde(default)]
    pub culture: CultureKind,

    /// Locutions delivered per step before the rest are dropped.
    #[serde(default = "default_max_locutions_per_step")]
    pub max_locutions_per_step: usize,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            max_steps: default_max_steps(),
            communication: default_communication(),
            primary_agent: default_primary_agent(),
            culture: CultureKind::default(),
            max_locutions_per_step: default_max_locutions_per_step(),
        }
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Line format.
    #[serde(default)]
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Override the level with `PARLEY_LOG` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(LOG_LEVEL_ENV) {
            self.level = val;
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

const fn default_seed() -> u64 {
    42
}

const fn default_max_steps() -> u64 {
    200
}

const fn default_communication() -> bool {
    true
}

const fn default_primary_agent() -> Option<AgentId> {
    Some(AgentId::new(1))
}

const fn default_max_locutions_per_step() -> usize {
    256
}

fn default_log_level() -> String {
    String::from("info")
}
