//! A single planning agent with a partial view of the world.
//!
//! Each time step an [`Agent`] receives the cells it can see, merges them
//! into what it already knows, rebuilds its model grid, and replans twice:
//! once yielding to every agent it has conceded to, and once ignoring
//! everyone (the optimal plan, kept for display). Models and plans are
//! recorded per time step so a front end can replay what the agent
//! believed at any point.
//!
//! Agents never see the true world directly. What other agents intend is
//! reconstructed from the waypoints they send ([`Agent::estimated_path`]),
//! and what the agent cannot see stays at its last observed value.

use std::collections::BTreeMap;

use parley_types::{
    AgentId, AgentProperties, CellValue, Coord, Direction, Locution, Path, SpaceTime,
};
use parley_world::conflict::position_at;
use parley_world::{Grid, KnownCells, search, straight_line};
use tracing::{debug, trace};

use crate::config::PlanningConfig;
use crate::error::AgentError;
use crate::session::NegotiationSession;

/// An agent on the grid.
#[derive(Debug, Clone)]
pub struct Agent {
    pub(crate) id: AgentId,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) planning: PlanningConfig,
    pub(crate) properties: AgentProperties,
    /// Moves come from outside instead of from the plan.
    pub(crate) externally_controlled: bool,
    pub(crate) goal: Option<Coord>,
    pub(crate) position: Option<Coord>,
    pub(crate) time_step: u64,
    pub(crate) known: KnownCells,
    pub(crate) model: Grid,
    pub(crate) plan: Option<Path>,
    pub(crate) optimal_plan: Option<Path>,
    pub(crate) model_history: BTreeMap<u64, Grid>,
    pub(crate) plan_history: BTreeMap<u64, Option<Path>>,
    pub(crate) optimal_history: BTreeMap<u64, Option<Path>>,
    pub(crate) session: NegotiationSession,
    /// Last waypoints received from each agent.
    pub(crate) informed_waypoints: BTreeMap<AgentId, Vec<SpaceTime>>,
    /// Paths reconstructed from those waypoints.
    pub(crate) estimated_plans: BTreeMap<AgentId, Path>,
}

/// Whether a value for time step `t` should be written to `history`.
fn should_record<V>(history: &BTreeMap<u64, V>, t: u64, overwrite: bool) -> bool {
    overwrite || history.len() <= 1 || !history.contains_key(&t)
}

/// Append `leg` to `path`, skipping states equal to the current tail.
fn append_collapsed(path: &mut Path, leg: Path) {
    for state in leg {
        if path.last() != Some(&state) {
            path.push(state);
        }
    }
}

impl Agent {
    /// Create an agent for a `width` x `height` world.
    pub fn new(
        id: AgentId,
        width: u32,
        height: u32,
        planning: PlanningConfig,
    ) -> Result<Self, AgentError> {
        Ok(Self {
            id,
            width,
            height,
            planning,
            properties: AgentProperties::default(),
            externally_controlled: false,
            goal: None,
            position: None,
            time_step: 0,
            known: KnownCells::new(),
            model: Grid::new(width, height)?,
            plan: None,
            optimal_plan: None,
            model_history: BTreeMap::new(),
            plan_history: BTreeMap::new(),
            optimal_history: BTreeMap::new(),
            session: NegotiationSession::new(),
            informed_waypoints: BTreeMap::new(),
            estimated_plans: BTreeMap::new(),
        })
    }

    // -------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------

    /// The agent's id.
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Attributes used by arguments.
    pub const fn properties(&self) -> AgentProperties {
        self.properties
    }

    /// Replace the agent's attributes.
    pub const fn set_properties(&mut self, properties: AgentProperties) {
        self.properties = properties;
    }

    /// Whether moves are supplied from outside.
    pub const fn is_externally_controlled(&self) -> bool {
        self.externally_controlled
    }

    /// Hand the agent over to (or take it back from) an outside
    /// controller. A newly controlled agent holds its position until told
    /// otherwise.
    pub fn set_externally_controlled(&mut self, controlled: bool) {
        self.externally_controlled = controlled;
        if controlled && let Some(pos) = self.position {
            self.plan = Some(vec![SpaceTime::new(pos, self.time_step)]);
        }
    }

    /// Where the agent is trying to go.
    pub const fn goal(&self) -> Option<Coord> {
        self.goal
    }

    /// Set or clear the goal. Takes effect on the next knowledge update.
    pub const fn set_goal(&mut self, goal: Option<Coord>) {
        self.goal = goal;
    }

    /// Where the agent believes it stands.
    pub const fn position(&self) -> Option<Coord> {
        self.position
    }

    /// Whether the agent stands on its goal.
    pub fn has_reached_goal(&self) -> bool {
        self.goal.is_some() && self.goal == self.position
    }

    /// The time step of the agent's latest knowledge.
    pub const fn time_step(&self) -> u64 {
        self.time_step
    }

    /// Planning parameters.
    pub const fn planning(&self) -> &PlanningConfig {
        &self.planning
    }

    /// Everything the agent has observed.
    pub const fn known(&self) -> &KnownCells {
        &self.known
    }

    /// The agent's current model grid.
    pub const fn model(&self) -> &Grid {
        &self.model
    }

    /// The current (yielding) plan.
    pub fn plan(&self) -> Option<&[SpaceTime]> {
        self.plan.as_deref()
    }

    /// The current plan ignoring every other agent.
    pub fn optimal_plan(&self) -> Option<&[SpaceTime]> {
        self.optimal_plan.as_deref()
    }

    /// The model grid recorded for time step `t`.
    pub fn model_at(&self, t: u64) -> Option<&Grid> {
        self.model_history.get(&t)
    }

    /// The plan recorded for time step `t`.
    pub fn plan_at(&self, t: u64) -> Option<&[SpaceTime]> {
        self.plan_history.get(&t).and_then(Option::as_deref)
    }

    /// The optimal plan recorded for time step `t`.
    pub fn optimal_plan_at(&self, t: u64) -> Option<&[SpaceTime]> {
        self.optimal_history.get(&t).and_then(Option::as_deref)
    }

    /// Negotiation state.
    pub const fn session(&self) -> &NegotiationSession {
        &self.session
    }

    /// The path this agent expects `other` to follow.
    pub fn estimated_plan(&self, other: AgentId) -> Option<&[SpaceTime]> {
        self.estimated_plans.get(&other).map(Vec::as_slice)
    }

    /// The last waypoints `other` sent.
    pub fn informed_waypoints(&self, other: AgentId) -> Option<&[SpaceTime]> {
        self.informed_waypoints.get(&other).map(Vec::as_slice)
    }

    // -------------------------------------------------------------------
    // Knowledge and planning
    // -------------------------------------------------------------------

    /// Merge newly visible cells observed at `time_step`, rebuild the
    /// model, and replan.
    ///
    /// Moving to a later time step starts a new negotiation round. Model
    /// and plans are recorded for `time_step` when `overwrite` is set,
    /// when little history exists yet, or when nothing was recorded for
    /// that step before.
    pub fn update_world_knowledge(
        &mut self,
        visible: &BTreeMap<Coord, CellValue>,
        time_step: u64,
        overwrite: bool,
    ) {
        if self.session.advance_to(time_step) {
            trace!(time_step, agent_id = %self.id, "Negotiation round reset");
        }
        self.time_step = time_step;
        self.known.merge(visible);
        self.model.reset_from_known(self.known.as_map());
        if let Some(pos) = self.model.find_agent(self.id) {
            self.position = Some(pos);
        }
        if should_record(&self.model_history, time_step, overwrite) {
            self.model_history.insert(time_step, self.model.clone());
        }
        self.replan(overwrite);
    }

    fn replan(&mut self, overwrite: bool) {
        let Some(pos) = self.position else {
            return;
        };
        let origin = SpaceTime::new(pos, self.time_step);
        let Some(goal) = self.goal else {
            if self.externally_controlled {
                self.plan = Some(vec![origin]);
            }
            return;
        };
        self.plan = self.plan_towards(origin, goal, true);
        self.optimal_plan = self.plan_towards(origin, goal, false);

        let t = self.time_step;
        if should_record(&self.plan_history, t, overwrite) {
            self.plan_history.insert(t, self.plan.clone());
        }
        if should_record(&self.optimal_history, t, overwrite) {
            self.optimal_history.insert(t, self.optimal_plan.clone());
        }
    }

    /// Replan around the estimated paths of every agent conceded to.
    pub fn reroute_yielding(&mut self) {
        let (Some(goal), Some(pos)) = (self.goal, self.position) else {
            return;
        };
        let origin = SpaceTime::new(pos, self.time_step);
        self.plan = self.plan_towards(origin, goal, true);
        self.plan_history.insert(self.time_step, self.plan.clone());
        debug!(
            time_step = self.time_step,
            agent_id = %self.id,
            conceding_to = ?self.session.conceding_to(),
            found = self.plan.is_some(),
            "Rerouted"
        );
    }

    fn plan_towards(&self, origin: SpaceTime, goal: Coord, yielding: bool) -> Option<Path> {
        if !yielding {
            return self.search_from(origin, goal, &[]);
        }
        let yield_to: Vec<&[SpaceTime]> = self
            .session
            .conceding_to()
            .iter()
            .filter_map(|id| self.estimated_plans.get(id))
            .map(Vec::as_slice)
            .collect();
        self.search_from(origin, goal, &yield_to)
    }

    fn search_from(&self, origin: SpaceTime, goal: Coord, yield_to: &[&[SpaceTime]]) -> Option<Path> {
        match search(&self.model, origin, goal, yield_to, self.planning.search_timeout) {
            Ok(path) => Some(path),
            Err(reason) => {
                debug!(
                    time_step = self.time_step,
                    agent_id = %self.id,
                    %goal,
                    %reason,
                    "No path found"
                );
                None
            }
        }
    }

    /// Override the plan with a single step in `direction`. A step off
    /// the grid becomes a wait.
    pub fn apply_direction(&mut self, direction: Direction) {
        let Some(pos) = self.position else {
            return;
        };
        let origin = SpaceTime::new(pos, self.time_step);
        let next = pos.step(direction, self.width, self.height).unwrap_or(pos);
        self.plan = Some(vec![origin, origin.then(next)]);
        self.plan_history.insert(self.time_step, self.plan.clone());
        self.optimal_history
            .insert(self.time_step, self.optimal_plan.clone());
    }

    /// Where the current plan puts the agent on the next time step.
    pub fn proposed_move(&self) -> Option<Coord> {
        let plan = self.plan.as_deref()?;
        position_at(plan, self.time_step.saturating_add(1))
    }

    // -------------------------------------------------------------------
    // Views used by the protocol
    // -------------------------------------------------------------------

    /// The states at which the plan changes direction (waiting counts as a
    /// direction), followed by the final state.
    pub fn next_waypoints(&self) -> Option<Vec<SpaceTime>> {
        let plan = self.plan.as_deref()?;
        let mut turns = Vec::new();
        let mut heading = None;
        for pair in plan.windows(2) {
            let [from, to] = pair else { continue };
            let direction = Direction::between(from.pos, to.pos);
            if heading.is_some() && heading != Some(direction) {
                turns.push(*from);
            }
            heading = Some(direction);
        }
        turns.extend(plan.last().copied());
        Some(turns)
    }

    /// Other agents in the model within the visibility radius.
    pub fn agents_in_range(&self) -> BTreeMap<AgentId, Coord> {
        let Some(pos) = self.position else {
            return BTreeMap::new();
        };
        self.model
            .agent_positions()
            .iter()
            .filter(|&(&id, &at)| {
                id != self.id && pos.chebyshev(at) <= self.planning.visibility_radius
            })
            .map(|(&id, &at)| (id, at))
            .collect()
    }

    /// Open a conversation with every agent in range not yet negotiated
    /// with this round.
    pub fn communicate(&self) -> Vec<(AgentId, Locution)> {
        self.agents_in_range()
            .into_keys()
            .filter(|&id| !self.session.has_negotiated_with(id))
            .map(|id| (id, Locution::ask_waypoints()))
            .collect()
    }

    /// Temporary obstacles this agent knows of on the straight run from
    /// `origin` to `destination`, stamped with when a walker would reach
    /// them.
    pub fn straight_line_obstructions(&self, origin: SpaceTime, destination: Coord) -> Vec<SpaceTime> {
        if origin.pos == destination {
            return Vec::new();
        }
        straight_line(origin, destination)
            .into_iter()
            .filter(|state| self.model.cell(state.pos) == Some(CellValue::TemporaryObstacle))
            .collect()
    }

    /// Reconstruct the path an agent standing at `origin` will follow from
    /// the waypoints it sent.
    ///
    /// Every leg but the last is walked in a straight line (or searched
    /// when the two ends are not aligned) and padded with waits up to the
    /// waypoint's time step. The last leg is searched on this agent's
    /// model without yielding.
    pub fn estimated_path(&self, origin: SpaceTime, waypoints: &[SpaceTime]) -> Path {
        let Some((last, legs)) = waypoints.split_last() else {
            return vec![origin];
        };
        let mut path = Vec::new();
        let mut start = origin;
        for waypoint in legs {
            let mut leg = straight_line(start, waypoint.pos);
            if leg.is_empty() {
                leg = self
                    .search_from(start, waypoint.pos, &[])
                    .unwrap_or_else(|| vec![start]);
            }
            self.pad_until(&mut leg, waypoint.t);
            start = leg.last().copied().unwrap_or(start);
            append_collapsed(&mut path, leg);
        }
        let mut tail = self
            .search_from(start, last.pos, &[])
            .unwrap_or_else(|| vec![start]);
        self.pad_until(&mut tail, last.t);
        append_collapsed(&mut path, tail);
        path
    }

    /// Wait at the end of `leg` until time step `t`, within the search
    /// horizon.
    fn pad_until(&self, leg: &mut Path, t: u64) {
        let Some(&end) = leg.last() else {
            return;
        };
        if t.saturating_sub(end.t) > self.planning.search_timeout {
            return;
        }
        let mut current = end;
        while current.t < t {
            current = current.then(current.pos);
            leg.push(current);
        }
    }
}
