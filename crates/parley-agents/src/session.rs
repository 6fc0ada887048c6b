//! Per-round negotiation bookkeeping.
//!
//! A round lasts one time step. When the agent's knowledge advances to a
//! later step, everything except the set of agents it concedes to is
//! cleared; concessions persist so later plans keep yielding.

use std::collections::BTreeSet;

use parley_types::{AgentId, ArgumentId, SpaceTime};

/// Negotiation state held by one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NegotiationSession {
    time_step: u64,
    negotiated_with: BTreeSet<AgentId>,
    conceding_to: BTreeSet<AgentId>,
    arguments_used: BTreeSet<ArgumentId>,
    current_conflict: Option<SpaceTime>,
}

impl NegotiationSession {
    /// A fresh session at time step zero.
    pub const fn new() -> Self {
        Self {
            time_step: 0,
            negotiated_with: BTreeSet::new(),
            conceding_to: BTreeSet::new(),
            arguments_used: BTreeSet::new(),
            current_conflict: None,
        }
    }

    /// Move to time step `t`. Returns `true` if a new round started.
    pub fn advance_to(&mut self, t: u64) -> bool {
        if t <= self.time_step {
            return false;
        }
        self.time_step = t;
        self.negotiated_with.clear();
        self.arguments_used.clear();
        self.current_conflict = None;
        true
    }

    /// The round's time step.
    pub const fn time_step(&self) -> u64 {
        self.time_step
    }

    /// Whether a negotiation with `id` already happened this round.
    pub fn has_negotiated_with(&self, id: AgentId) -> bool {
        self.negotiated_with.contains(&id)
    }

    /// Agents negotiated with this round.
    pub const fn negotiated_with(&self) -> &BTreeSet<AgentId> {
        &self.negotiated_with
    }

    /// Record a negotiation with `id`.
    pub fn mark_negotiated(&mut self, id: AgentId) {
        self.negotiated_with.insert(id);
    }

    /// Whether this agent yields to `id`.
    pub fn is_conceding_to(&self, id: AgentId) -> bool {
        self.conceding_to.contains(&id)
    }

    /// Every agent this agent yields to.
    pub const fn conceding_to(&self) -> &BTreeSet<AgentId> {
        &self.conceding_to
    }

    /// Give way to `id`. The negotiated set becomes the conceded set so
    /// the winner is not challenged again this round.
    pub fn concede_to(&mut self, id: AgentId) {
        self.conceding_to.insert(id);
        self.negotiated_with.clone_from(&self.conceding_to);
    }

    /// Arguments put forward this round.
    pub const fn arguments_used(&self) -> &BTreeSet<ArgumentId> {
        &self.arguments_used
    }

    /// Record an argument as spent.
    pub fn use_argument(&mut self, id: ArgumentId) {
        self.arguments_used.insert(id);
    }

    /// The conflict under dispute this round, if any.
    pub const fn current_conflict(&self) -> Option<SpaceTime> {
        self.current_conflict
    }

    /// Open a dispute over `state`.
    pub const fn open_conflict(&mut self, state: SpaceTime) {
        self.current_conflict = Some(state);
    }
}
