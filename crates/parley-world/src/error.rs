//! Error types for the `parley-world` crate.
//!
//! Edit operations on a grid or its history return [`WorldError`].
//! Rejected move batches are not errors; see
//! [`MoveRejection`](crate::history::MoveRejection).

use parley_types::{AgentId, Coord};

/// Errors that can occur while editing the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// The coordinate lies outside the grid.
    #[error("coordinate {0} is out of bounds")]
    OutOfBounds(Coord),

    /// The target cell is not empty.
    #[error("cell {0} is already occupied")]
    CellOccupied(Coord),

    /// There is no obstacle to remove at the coordinate.
    #[error("no obstacle at {0}")]
    NoObstacle(Coord),

    /// Agent ids must be positive.
    #[error("invalid agent id {0}")]
    InvalidAgentId(AgentId),

    /// An agent with this id is already placed.
    #[error("agent {0} already exists")]
    DuplicateAgent(AgentId),

    /// The agent is not on the grid.
    #[error("agent {0} not found")]
    AgentNotFound(AgentId),

    /// Obstacles and agents can only be edited before the world is locked.
    #[error("world is locked for simulation")]
    Locked,

    /// A grid dimension is zero or its cell count overflows.
    #[error("invalid grid dimensions {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}
