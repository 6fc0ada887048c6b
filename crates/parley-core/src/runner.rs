//! Run a simulation to completion.
//!
//! [`run_simulation`] wraps [`Simulator::simulate_step`] with the stop
//! conditions:
//!
//! - **Goals reached**: every agent with a goal stands on it.
//! - **Step limit**: `max_steps` steps were attempted.
//! - **Stall**: [`STALL_LIMIT`] consecutive batches were rejected.

use parley_types::{AgentId, Coord};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::direction::DirectionSource;
use crate::simulator::{SimulationError, Simulator, StepOutcome};

/// Consecutive rejected steps after which the run gives up.
pub const STALL_LIMIT: u32 = 3;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Every goal was reached.
    GoalsReached,
    /// The step limit was hit.
    MaxSteps,
    /// The world stopped accepting moves.
    Stalled,
}

/// Final state of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSummary {
    /// Agent id.
    pub id: AgentId,
    /// Committed position at the end of the run.
    pub position: Option<Coord>,
    /// Goal, if any.
    pub goal: Option<Coord>,
    /// Whether the goal was reached.
    pub reached_goal: bool,
    /// Agents this one ended up yielding to.
    pub yielding_to: Vec<AgentId>,
}

/// Outcome of a full run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Why the run ended.
    pub end_reason: EndReason,
    /// Last committed time step.
    pub total_steps: u64,
    /// Steps whose batch was rejected.
    pub rejected_steps: u64,
    /// Net score of the primary agent.
    pub primary_score: i64,
    /// Events published during the run.
    pub events: usize,
    /// Per-agent final state.
    pub agents: Vec<AgentSummary>,
}

/// Step `sim` until a stop condition holds.
///
/// # Errors
///
/// Propagates [`SimulationError`] from a step. Rejected batches are not
/// errors.
pub fn run_simulation<R: Rng>(
    sim: &mut Simulator<R>,
    directions: &mut dyn DirectionSource,
    max_steps: u64,
) -> Result<SimulationResult, SimulationError> {
    let mut rejected_steps: u64 = 0;
    let mut stalled_for: u32 = 0;
    let mut end_reason = EndReason::MaxSteps;

    for _ in 0..max_steps {
        if sim.all_goals_reached() {
            end_reason = EndReason::GoalsReached;
            break;
        }
        match sim.simulate_step(directions)? {
            StepOutcome::Committed(_) => stalled_for = 0,
            StepOutcome::Rejected(_) => {
                rejected_steps = rejected_steps.saturating_add(1);
                stalled_for = stalled_for.saturating_add(1);
            }
        }
        if stalled_for >= STALL_LIMIT {
            warn!(time_step = sim.time_step(), stalled_for, "Simulation stalled");
            end_reason = EndReason::Stalled;
            break;
        }
    }
    if end_reason == EndReason::MaxSteps && sim.all_goals_reached() {
        end_reason = EndReason::GoalsReached;
    }

    let t = sim.time_step();
    let agents = sim
        .agents()
        .map(|agent| AgentSummary {
            id: agent.id(),
            position: sim.world().find_agent(agent.id(), t),
            goal: agent.goal(),
            reached_goal: agent.goal().is_some()
                && agent.goal() == sim.world().find_agent(agent.id(), t),
            yielding_to: agent.session().conceding_to().iter().copied().collect(),
        })
        .collect();

    Ok(SimulationResult {
        end_reason,
        total_steps: t,
        rejected_steps,
        primary_score: sim.primary_score(),
        events: sim.events().len(),
        agents,
    })
}

/// Log the final simulation result.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        end_reason = ?result.end_reason,
        total_steps = result.total_steps,
        rejected_steps = result.rejected_steps,
        primary_score = result.primary_score,
        "Simulation ended"
    );
    for agent in &result.agents {
        info!(
            agent_id = %agent.id,
            reached_goal = agent.reached_goal,
            yielding_to = ?agent.yielding_to,
            "Agent final state"
        );
    }
}
