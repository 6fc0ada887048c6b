//! Notifications emitted by the simulation for external observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{AgentId, EventId};

/// Score penalty applied to the primary agent for every committed step.
pub const STEP_PENALTY: i32 = -1;
/// Score penalty applied to the primary agent for a rejected collision.
pub const COLLISION_PENALTY: i32 = -20;

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", content = "details")]
pub enum SimEventKind {
    /// A new time step was committed to the world history.
    StepCommitted {
        /// The committed time step.
        time_step: u64,
    },
    /// A move batch involving the primary agent was rejected for a collision.
    Collision {
        /// Every agent in the conflict set.
        agents: Vec<AgentId>,
    },
    /// A concession explanation was generated.
    Hint {
        /// The autonomous agent the explanation concerns.
        agent: AgentId,
        /// Rendered explanation.
        text: String,
    },
    /// The per-step locution budget ran out and the remaining
    /// conversations of the step were dropped.
    CommunicationCut {
        /// Locutions still queued in the conversation that was cut.
        undelivered: usize,
    },
    /// The score of an agent changed.
    ScoreChanged {
        /// Whose score.
        agent: AgentId,
        /// Signed change.
        delta: i32,
    },
}

/// A timestamped notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimEvent {
    /// Unique id.
    pub id: EventId,
    /// Simulation time step the event belongs to.
    pub time_step: u64,
    /// Wall-clock emission time.
    pub emitted_at: DateTime<Utc>,
    /// Payload.
    pub kind: SimEventKind,
}

impl SimEvent {
    /// Stamp a new event.
    pub fn new(time_step: u64, kind: SimEventKind) -> Self {
        Self {
            id: EventId::new(),
            time_step,
            emitted_at: Utc::now(),
            kind,
        }
    }
}
