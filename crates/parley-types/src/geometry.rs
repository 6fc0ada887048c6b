//! Grid coordinates, space-time states, and movement directions.
//!
//! Coordinates are zero-based with `x` growing to the right and `y`
//! growing downward, so [`Direction::Up`] decreases `y`. A [`SpaceTime`]
//! pairs a coordinate with a discrete time step; a plan is an ordered
//! sequence of them with consecutive time steps.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// A cell position on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Coord {
    /// Column, zero at the left edge.
    pub x: u32,
    /// Row, zero at the top edge.
    pub y: u32,
}

impl Coord {
    /// Build a coordinate.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance between two coordinates.
    pub const fn manhattan(self, other: Self) -> u32 {
        self.x
            .abs_diff(other.x)
            .saturating_add(self.y.abs_diff(other.y))
    }

    /// Chebyshev distance (the square visibility metric).
    pub fn chebyshev(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// Whether `other` is a 4-connected neighbour of `self`.
    pub const fn is_adjacent(self, other: Self) -> bool {
        self.manhattan(other) == 1
    }

    /// The coordinate one step away in `direction`, if it stays inside a
    /// `width` x `height` grid.
    pub fn step(self, direction: Direction, width: u32, height: u32) -> Option<Self> {
        let moved = match direction {
            Direction::Wait => Some(self),
            Direction::Left => self.x.checked_sub(1).map(|x| Self::new(x, self.y)),
            Direction::Right => self.x.checked_add(1).map(|x| Self::new(x, self.y)),
            Direction::Up => self.y.checked_sub(1).map(|y| Self::new(self.x, y)),
            Direction::Down => self.y.checked_add(1).map(|y| Self::new(self.x, y)),
        }?;
        (moved.x < width && moved.y < height).then_some(moved)
    }
}

impl core::fmt::Display for Coord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Space-time states
// ---------------------------------------------------------------------------

/// A coordinate occupied at a given time step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SpaceTime {
    /// Where.
    pub pos: Coord,
    /// When.
    pub t: u64,
}

impl SpaceTime {
    /// Build a space-time state.
    pub const fn new(pos: Coord, t: u64) -> Self {
        Self { pos, t }
    }

    /// The state reached by moving to `pos` on the following time step.
    pub const fn then(self, pos: Coord) -> Self {
        Self {
            pos,
            t: self.t.saturating_add(1),
        }
    }
}

impl core::fmt::Display for SpaceTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.pos, self.t)
    }
}

/// A plan: space-time states with strictly consecutive time steps.
pub type Path = Vec<SpaceTime>;

// ---------------------------------------------------------------------------
// Directions
// ---------------------------------------------------------------------------

/// A single-step movement, as issued to an externally controlled agent.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub enum Direction {
    /// Stay in place.
    #[default]
    Wait,
    /// Decrease `y`.
    Up,
    /// Increase `y`.
    Down,
    /// Decrease `x`.
    Left,
    /// Increase `x`.
    Right,
}

impl Direction {
    /// The direction that takes `from` to `to`, if they are equal or
    /// 4-adjacent.
    pub const fn between(from: Coord, to: Coord) -> Option<Self> {
        if from.x == to.x && from.y == to.y {
            return Some(Self::Wait);
        }
        if from.y == to.y {
            if to.x == from.x.wrapping_add(1) {
                return Some(Self::Right);
            }
            if from.x == to.x.wrapping_add(1) {
                return Some(Self::Left);
            }
        }
        if from.x == to.x {
            if to.y == from.y.wrapping_add(1) {
                return Some(Self::Down);
            }
            if from.y == to.y.wrapping_add(1) {
                return Some(Self::Up);
            }
        }
        None
    }

    /// Parse the single-letter script form (`U`, `D`, `L`, `R`, `W`).
    pub const fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'U' => Some(Self::Up),
            'D' => Some(Self::Down),
            'L' => Some(Self::Left),
            'R' => Some(Self::Right),
            'W' => Some(Self::Wait),
            _ => None,
        }
    }
}
