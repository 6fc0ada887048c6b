//! Per-agent attributes that arguments test against.
//!
//! Which fields matter depends on the active culture: the easy culture
//! only looks at rank and task status, the hard culture uses all of them.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Organisational branch an agent belongs to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub enum Department {
    /// Land forces.
    Army,
    /// Naval forces.
    Navy,
    /// Air forces.
    AirForce,
    /// Administrative staff.
    #[default]
    Admin,
}

impl Department {
    /// All departments, in a fixed order.
    pub const ALL: [Self; 4] = [Self::Army, Self::Navy, Self::AirForce, Self::Admin];

    /// Canonical name used by the scenario format.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Army => "Army",
            Self::Navy => "Navy",
            Self::AirForce => "AirForce",
            Self::Admin => "Admin",
        }
    }

    /// Parse a canonical name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(name))
    }
}

/// Whether an agent is currently carrying out a task.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub enum TaskStatus {
    /// Not on a task.
    #[default]
    AtEase,
    /// On a task.
    Tasked,
}

/// Attributes of one agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentProperties {
    /// Military rank (higher outranks lower).
    pub military_rank: u8,
    /// Task status.
    pub task_status: TaskStatus,
    /// Importance of the current task, compared against rank.
    pub task_importance: u8,
    /// Corporate rank, added to military rank in the hard culture.
    pub corporate_rank: u8,
    /// Special operations membership.
    pub special_ops: bool,
    /// Department.
    pub department: Department,
}

impl AgentProperties {
    /// Whether the agent is tasked.
    pub const fn is_tasked(&self) -> bool {
        matches!(self.task_status, TaskStatus::Tasked)
    }

    /// Rank used when comparing against other agents: a tasked agent
    /// carries the importance of its task instead of its rank.
    pub const fn effective_rank(&self) -> u16 {
        if self.is_tasked() {
            self.task_importance as u16
        } else {
            self.military_rank as u16
        }
    }

    /// Effective rank plus corporate rank.
    pub const fn combined_rank(&self) -> u16 {
        self.effective_rank()
            .saturating_add(self.corporate_rank as u16)
    }
}
