//! Direction sources for externally controlled agents.
//!
//! Each step, the simulator asks a [`DirectionSource`] which way the
//! primary agent should move. A source may be a human at a keyboard, a
//! scripted sequence, or a test stub. Agents that receive no direction
//! wait in place.

use std::collections::VecDeque;

use parley_types::{AgentId, Direction};

/// Errors that can occur when parsing a direction script.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectionError {
    /// A character is not one of `U`, `D`, `L`, `R`, `W`.
    #[error("invalid direction `{letter}` at position {position}")]
    InvalidLetter {
        /// The offending character.
        letter: char,
        /// Zero-based character index.
        position: usize,
    },
}

/// A source of moves for externally controlled agents.
pub trait DirectionSource {
    /// The direction `agent` should take from `time_step` to the next
    /// step, or `None` to wait.
    fn direction_for(&mut self, agent: AgentId, time_step: u64) -> Option<Direction>;
}

/// A source that always waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoldPosition;

impl HoldPosition {
    /// Create a new holding source.
    pub const fn new() -> Self {
        Self
    }
}

impl DirectionSource for HoldPosition {
    fn direction_for(&mut self, _agent: AgentId, _time_step: u64) -> Option<Direction> {
        Some(Direction::Wait)
    }
}

/// A fixed sequence of directions consumed one per request.
///
/// The same queue serves every controlled agent. Once exhausted, agents
/// wait.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptedDirections {
    queue: VecDeque<Direction>,
}

impl ScriptedDirections {
    /// Build a script from explicit directions.
    pub fn new(directions: impl IntoIterator<Item = Direction>) -> Self {
        Self {
            queue: directions.into_iter().collect(),
        }
    }

    /// Parse a script such as `"RRWD"`. Whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DirectionError::InvalidLetter`] for any other character.
    pub fn parse(script: &str) -> Result<Self, DirectionError> {
        let queue = script
            .chars()
            .enumerate()
            .filter(|(_, c)| !c.is_whitespace())
            .map(|(position, letter)| {
                Direction::from_char(letter)
                    .ok_or(DirectionError::InvalidLetter { letter, position })
            })
            .collect::<Result<VecDeque<_>, _>>()?;
        Ok(Self { queue })
    }

    /// Directions not yet consumed.
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Whether the script is used up.
    pub fn is_exhausted(&self) -> bool {
        self.queue.is_empty()
    }

    /// Put a direction back at the front, so a rejected step is retried.
    pub fn push_front(&mut self, direction: Direction) {
        self.queue.push_front(direction);
    }
}

impl DirectionSource for ScriptedDirections {
    fn direction_for(&mut self, _agent: AgentId, _time_step: u64) -> Option<Direction> {
        self.queue.pop_front()
    }
}
