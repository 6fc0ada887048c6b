//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode during startup and the run so
//! `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: parley_core::config::ConfigError,
    },

    /// The scenario file could not be read or generated.
    #[error("scenario error: {source}")]
    Scenario {
        /// The underlying scenario error.
        #[from]
        source: parley_core::scenario::ScenarioError,
    },

    /// The direction script is invalid.
    #[error("direction script error: {source}")]
    Directions {
        /// The underlying parse error.
        #[from]
        source: parley_core::direction::DirectionError,
    },

    /// Building or stepping the simulation failed.
    #[error("simulation error: {source}")]
    Simulation {
        /// The underlying simulation error.
        #[from]
        source: parley_core::simulator::SimulationError,
    },

    /// The run summary could not be encoded.
    #[error("summary error: {source}")]
    Summary {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}
