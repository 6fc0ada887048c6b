//! Error types for the parley-agents crate.

use parley_types::ArgumentId;
use parley_world::WorldError;

/// Errors raised while building agents or argumentation frameworks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    /// An attack or lookup named an argument the framework does not hold.
    #[error("unknown argument: {0}")]
    UnknownArgument(ArgumentId),

    /// An argument id was registered twice.
    #[error("duplicate argument: {0}")]
    DuplicateArgument(ArgumentId),

    /// The agent's model grid could not be built.
    #[error("world model error: {0}")]
    World(#[from] WorldError),
}
