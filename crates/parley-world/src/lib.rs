//! Grid world, conflict detection, and pathfinding for the Parley simulation.
//!
//! # Modules
//!
//! - [`grid`] -- A single occupancy snapshot with edit and visibility queries.
//! - [`history`] -- Append-only snapshot history and the per-step
//!   transaction engine ([`WorldHistory::attempt_move`]).
//! - [`knowledge`] -- An agent's merged beliefs about the grid.
//! - [`conflict`] -- Vertex and swap checks between two paths.
//! - [`pathfinder`] -- Breadth-first search over `(cell, time step)` states
//!   and straight-line legs.
//! - [`error`] -- Error types for world edits.

pub mod conflict;
pub mod error;
pub mod grid;
pub mod history;
pub mod knowledge;
pub mod pathfinder;

// Re-export primary types at crate root.
pub use conflict::{Conflict, ConflictKind};
pub use error::WorldError;
pub use grid::Grid;
pub use history::{MoveRejection, StepCommit, WorldHistory};
pub use knowledge::KnownCells;
pub use pathfinder::{Unreachable, search, straight_line};
