//! Occupancy values stored in each grid cell.
//!
//! On disk and in the scenario format a cell is a signed integer: `0`
//! empty, `-1` permanent obstacle, `-2` temporary obstacle, and a positive
//! value for the agent occupying it. [`CellValue`] is the typed form.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::AgentId;

/// Raw encoding of an empty cell.
pub const RAW_EMPTY: i64 = 0;
/// Raw encoding of a permanent obstacle.
pub const RAW_PERMANENT_OBSTACLE: i64 = -1;
/// Raw encoding of a temporary obstacle.
pub const RAW_TEMPORARY_OBSTACLE: i64 = -2;

/// The content of one grid cell.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub enum CellValue {
    /// Nothing here.
    #[default]
    Empty,
    /// A wall. Always known to every agent.
    PermanentObstacle,
    /// A blockage that only nearby agents can see.
    TemporaryObstacle,
    /// An agent stands here.
    Agent(AgentId),
}

/// Which kind of obstacle to place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ObstacleKind {
    /// Known to all agents from the start.
    Permanent,
    /// Only perceived within visibility range.
    Temporary,
}

impl From<ObstacleKind> for CellValue {
    fn from(kind: ObstacleKind) -> Self {
        match kind {
            ObstacleKind::Permanent => Self::PermanentObstacle,
            ObstacleKind::Temporary => Self::TemporaryObstacle,
        }
    }
}

impl CellValue {
    /// Decode a raw cell value. Any negative value other than `-2` is a
    /// permanent obstacle; positive values that do not fit an id are
    /// rejected.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            RAW_EMPTY => Some(Self::Empty),
            RAW_TEMPORARY_OBSTACLE => Some(Self::TemporaryObstacle),
            r if r < 0 => Some(Self::PermanentObstacle),
            r => u32::try_from(r).ok().map(|id| Self::Agent(AgentId::new(id))),
        }
    }

    /// Encode to the raw integer form.
    pub fn to_raw(self) -> i64 {
        match self {
            Self::Empty => RAW_EMPTY,
            Self::PermanentObstacle => RAW_PERMANENT_OBSTACLE,
            Self::TemporaryObstacle => RAW_TEMPORARY_OBSTACLE,
            Self::Agent(id) => i64::from(id.into_inner()),
        }
    }

    /// Obstacles block movement; agents do not.
    pub const fn is_obstacle(self) -> bool {
        matches!(self, Self::PermanentObstacle | Self::TemporaryObstacle)
    }

    /// The agent occupying the cell, if any.
    pub const fn agent(self) -> Option<AgentId> {
        match self {
            Self::Agent(id) => Some(id),
            _ => None,
        }
    }

    /// Whether the cell is empty.
    pub const fn is_empty(self) -> bool {
        matches!(self, Self::Empty)
    }
}
