//! Typed messages exchanged in the negotiation protocol.
//!
//! A [`Locution`] pairs an [`ActType`] with a [`ContentType`] and a
//! [`Payload`]. The payload is carried separately from the content type
//! so that a receiver can detect a message whose payload does not match
//! what its content type promises; such a message is treated as empty.

use serde::{Deserialize, Serialize};

use crate::geometry::{Coord, SpaceTime};
use crate::ids::{AgentId, ArgumentId};

/// What the sender is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActType {
    /// Request information.
    Ask,
    /// Share information.
    Inform,
    /// Put forward an argument.
    Argue,
    /// Give up the dispute.
    Concede,
}

/// What the payload is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    /// Turning points of a plan.
    Waypoints,
    /// Cells found to be blocked.
    ObstacleList,
    /// Where another agent was seen.
    AgentSighting,
    /// A single argument.
    ArgumentId,
    /// Several arguments (the failed ones, on concession).
    MultipleArgumentIds,
}

/// Message body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// No body.
    #[default]
    Empty,
    /// Plan turning points.
    Waypoints(Vec<SpaceTime>),
    /// Blocked cells with the time step they were projected at.
    Obstacles(Vec<SpaceTime>),
    /// One observed agent position.
    Sighting {
        /// The agent seen.
        agent: AgentId,
        /// Where it was.
        pos: Coord,
    },
    /// A single argument, optionally tagged with the conflict it disputes.
    Argument {
        /// The argument put forward.
        id: ArgumentId,
        /// The disputed conflict state, set only on the opening motion.
        conflict: Option<SpaceTime>,
    },
    /// A list of arguments.
    Arguments(Vec<ArgumentId>),
}

/// A single negotiation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locution {
    /// Act.
    pub act: ActType,
    /// Declared content.
    pub content: ContentType,
    /// Body.
    pub payload: Payload,
}

impl Locution {
    /// `ask(waypoints)`.
    pub const fn ask_waypoints() -> Self {
        Self {
            act: ActType::Ask,
            content: ContentType::Waypoints,
            payload: Payload::Empty,
        }
    }

    /// `inform(waypoints)`.
    pub const fn inform_waypoints(waypoints: Vec<SpaceTime>) -> Self {
        Self {
            act: ActType::Inform,
            content: ContentType::Waypoints,
            payload: Payload::Waypoints(waypoints),
        }
    }

    /// `inform(obstacle=...)`.
    pub const fn inform_obstacles(cells: Vec<SpaceTime>) -> Self {
        Self {
            act: ActType::Inform,
            content: ContentType::ObstacleList,
            payload: Payload::Obstacles(cells),
        }
    }

    /// `inform(another_agent=...)`.
    pub const fn inform_sighting(agent: AgentId, pos: Coord) -> Self {
        Self {
            act: ActType::Inform,
            content: ContentType::AgentSighting,
            payload: Payload::Sighting { agent, pos },
        }
    }

    /// `argue(argument_id)`.
    pub const fn argue(id: ArgumentId, conflict: Option<SpaceTime>) -> Self {
        Self {
            act: ActType::Argue,
            content: ContentType::ArgumentId,
            payload: Payload::Argument { id, conflict },
        }
    }

    /// `concede(failed_arguments)`.
    pub const fn concede(failed: Vec<ArgumentId>) -> Self {
        Self {
            act: ActType::Concede,
            content: ContentType::MultipleArgumentIds,
            payload: Payload::Arguments(failed),
        }
    }

    /// Whether the payload has the shape the content type promises.
    /// `Empty` is acceptable for waypoints (an agent without a plan) and
    /// for argument lists.
    pub const fn is_well_formed(&self) -> bool {
        matches!(
            (self.content, &self.payload),
            (ContentType::Waypoints, Payload::Waypoints(_) | Payload::Empty)
                | (ContentType::ObstacleList, Payload::Obstacles(_))
                | (ContentType::AgentSighting, Payload::Sighting { .. })
                | (ContentType::ArgumentId, Payload::Argument { .. })
                | (
                    ContentType::MultipleArgumentIds,
                    Payload::Arguments(_) | Payload::Empty
                )
        )
    }

    /// Informed waypoints, empty when absent or mismatched.
    pub fn waypoints(&self) -> &[SpaceTime] {
        match (&self.content, &self.payload) {
            (ContentType::Waypoints, Payload::Waypoints(w)) => w,
            _ => &[],
        }
    }

    /// Reported obstacle cells, empty when absent or mismatched.
    pub fn obstacles(&self) -> &[SpaceTime] {
        match (&self.content, &self.payload) {
            (ContentType::ObstacleList, Payload::Obstacles(o)) => o,
            _ => &[],
        }
    }

    /// Argument list, empty when absent or mismatched.
    pub fn arguments(&self) -> &[ArgumentId] {
        match (&self.content, &self.payload) {
            (ContentType::MultipleArgumentIds, Payload::Arguments(a)) => a,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_are_well_formed() {
        let pos = Coord::new(1, 2);
        for locution in [
            Locution::ask_waypoints(),
            Locution::inform_waypoints(vec![SpaceTime::new(pos, 3)]),
            Locution::inform_obstacles(vec![SpaceTime::new(pos, 3)]),
            Locution::inform_sighting(AgentId::new(2), pos),
            Locution::argue(ArgumentId::new(0), None),
            Locution::concede(Vec::new()),
        ] {
            assert!(locution.is_well_formed(), "{locution:?}");
        }
    }

    #[test]
    fn mismatched_payload_reads_as_empty() {
        let bogus = Locution {
            act: ActType::Inform,
            content: ContentType::ObstacleList,
            payload: Payload::Waypoints(vec![SpaceTime::new(Coord::new(0, 0), 1)]),
        };
        assert!(!bogus.is_well_formed());
        assert!(bogus.obstacles().is_empty());
        assert!(bogus.waypoints().is_empty());
    }
}
