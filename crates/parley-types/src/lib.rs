//! Shared type definitions for the Parley simulation.
//!
//! This crate is the vocabulary used across the workspace. Types that
//! cross the rendering boundary flow to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Integer and UUID identifier wrappers
//! - [`geometry`] -- Coordinates, space-time states, directions
//! - [`cell`] -- Grid cell occupancy values
//! - [`locution`] -- Negotiation messages
//! - [`properties`] -- Agent attributes consumed by arguments
//! - [`events`] -- Notifications for observers

pub mod cell;
pub mod events;
pub mod geometry;
pub mod ids;
pub mod locution;
pub mod properties;

// Re-export all public types at crate root for convenience.
pub use cell::{CellValue, ObstacleKind};
pub use events::{COLLISION_PENALTY, STEP_PENALTY, SimEvent, SimEventKind};
pub use geometry::{Coord, Direction, Path, SpaceTime};
pub use ids::{AgentId, ArgumentId, EventId};
pub use locution::{ActType, ContentType, Locution, Payload};
pub use properties::{AgentProperties, Department, TaskStatus};
