//! Agents, argumentation, and negotiation for the Parley simulation.
//!
//! This crate holds everything an individual agent does: what it knows,
//! how it plans, and how it talks its way through conflicts with other
//! agents. It sits between `parley-world` (grids, search, conflict checks)
//! and `parley-core` (the step loop).
//!
//! # Modules
//!
//! - [`agent`] -- Knowledge, planning, waypoints, and path estimates ([`Agent`])
//! - [`negotiation`] -- Handling of incoming locutions ([`Agent::receive_locution`])
//! - [`session`] -- Per-round negotiation bookkeeping ([`NegotiationSession`])
//! - [`argument`] -- Argument rules and templates ([`ArgumentKind`])
//! - [`framework`] -- The attack graph ([`ArgumentationFramework`])
//! - [`culture`] -- Built-in argument catalogs and property distributions
//! - [`explanation`] -- Concession hints
//! - [`config`] -- Planning parameters ([`PlanningConfig`])
//! - [`error`] -- Error types ([`AgentError`])

pub mod agent;
pub mod argument;
pub mod config;
pub mod culture;
pub mod error;
pub mod explanation;
pub mod framework;
pub mod negotiation;
pub mod session;

// Re-export primary types at crate root for convenience.
pub use agent::Agent;
pub use argument::{Argument, ArgumentKind};
pub use config::PlanningConfig;
pub use culture::{Culture, CultureKind};
pub use error::AgentError;
pub use explanation::concession_hint;
pub use framework::{ArgumentationFramework, MOTION};
pub use negotiation::{Counterpart, Hint, Response};
pub use session::NegotiationSession;
