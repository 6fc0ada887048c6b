//! Configuration, world seeds, and the step loop for the Parley simulation.
//!
//! This crate wires agents and the world together: it loads settings,
//! reads scenario files, and drives every agent through observe,
//! communicate, and move for each time step.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `parley-config.yaml` into
//!   strongly-typed structs.
//! - [`scenario`] -- Scenario text format, parsing, saving, and random
//!   generation.
//! - [`direction`] -- [`DirectionSource`] trait with [`HoldPosition`] and
//!   [`ScriptedDirections`].
//! - [`observer`] -- Event log and observer fan-out.
//! - [`simulator`] -- The step loop ([`Simulator::simulate_step`]).
//! - [`runner`] -- Stop conditions and the run summary.
//!
//! [`DirectionSource`]: direction::DirectionSource
//! [`HoldPosition`]: direction::HoldPosition
//! [`ScriptedDirections`]: direction::ScriptedDirections
//! [`Simulator::simulate_step`]: simulator::Simulator::simulate_step

pub mod config;
pub mod direction;
pub mod observer;
pub mod runner;
pub mod scenario;
pub mod simulator;
