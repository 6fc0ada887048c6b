//! The per-step simulation loop.
//!
//! Each call to [`Simulator::simulate_step`] runs the phases in order:
//!
//! 1. **Lock** -- close world edits (first step only).
//! 2. **Observe** -- every agent merges what it can see at the current
//!    time step and replans.
//! 3. **Communicate** -- when enabled, each agent in id order opens a
//!    conversation with every agent in range it has not negotiated with
//!    yet. Each conversation runs to completion, delivering locutions
//!    first in, first out.
//! 4. **Collect** -- one proposed move per agent: the next state of its
//!    plan, or its current cell. Externally controlled agents take their
//!    move from the [`DirectionSource`].
//! 5. **Commit** -- hand the batch to the transaction engine and publish
//!    the resulting events.

use std::collections::{BTreeMap, VecDeque};

use parley_agents::{Agent, AgentError, Counterpart, Culture};
use parley_types::{
    AgentId, AgentProperties, COLLISION_PENALTY, CellValue, Coord, Direction, Locution,
    ObstacleKind, STEP_PENALTY, SimEvent, SimEventKind,
};
use parley_world::{MoveRejection, StepCommit, WorldError, WorldHistory};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::SimulationConfig;
use crate::direction::DirectionSource;
use crate::observer::{EventBus, SimObserver};
use crate::scenario::Scenario;

/// Highest id handed out when no id is requested.
const MAX_AUTO_AGENT_ID: u32 = 999;

/// Errors that can occur while building or stepping a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// A world edit or snapshot update failed.
    #[error(transparent)]
    World(#[from] WorldError),

    /// An agent could not be created.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Goals may only be placed on empty cells.
    #[error("goal cell {0} is not empty")]
    GoalNotEmpty(Coord),

    /// No agent with this id exists.
    #[error("agent {0} does not exist")]
    UnknownAgent(AgentId),

    /// Every automatic agent id is taken.
    #[error("no free agent id")]
    NoFreeAgentId,

    /// The world history has no snapshot for this time step.
    #[error("no world snapshot for time step {0}")]
    MissingSnapshot(u64),
}

/// The result of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The batch was applied and time advanced.
    Committed(StepCommit),
    /// The batch was refused; time did not advance.
    Rejected(MoveRejection),
}

impl StepOutcome {
    /// Whether time advanced.
    pub const fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

/// A locution in flight.
#[derive(Debug)]
struct Envelope {
    from: AgentId,
    to: AgentId,
    locution: Locution,
}

/// Owns the world, the agents, and the event log.
#[derive(Debug)]
pub struct Simulator<R: Rng> {
    world: WorldHistory,
    agents: BTreeMap<AgentId, Agent>,
    culture: Culture,
    config: SimulationConfig,
    rng: R,
    bus: EventBus,
}

impl<R: Rng> Simulator<R> {
    /// Create an empty `width` x `height` world.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::World`] for zero dimensions.
    pub fn new(
        width: u32,
        height: u32,
        config: SimulationConfig,
        rng: R,
    ) -> Result<Self, SimulationError> {
        let mut world = WorldHistory::new(width, height)?;
        world.set_primary(config.simulation.primary_agent);
        Ok(Self {
            world,
            agents: BTreeMap::new(),
            culture: Culture::new(config.simulation.culture)?,
            config,
            rng,
            bus: EventBus::new(),
        })
    }

    /// Build a world from a parsed scenario. Agents without explicit
    /// properties draw theirs from the configured culture.
    ///
    /// # Errors
    ///
    /// Fails if the scenario places items off the grid, gives a goal on an
    /// occupied cell, or names an agent that is not placed.
    pub fn from_scenario(
        scenario: &Scenario,
        config: SimulationConfig,
        rng: R,
    ) -> Result<Self, SimulationError> {
        let mut sim = Self::new(scenario.width, scenario.height, config, rng)?;
        for (&coord, &value) in &scenario.cells {
            match value {
                CellValue::Empty => {}
                CellValue::PermanentObstacle => sim.add_obstacle(coord, ObstacleKind::Permanent)?,
                CellValue::TemporaryObstacle => sim.add_obstacle(coord, ObstacleKind::Temporary)?,
                CellValue::Agent(id) => {
                    sim.add_agent(coord, Some(id))?;
                }
            }
        }
        for (&id, &goal) in &scenario.goals {
            sim.assign_goal(id, goal)?;
        }
        for (&id, &properties) in &scenario.properties {
            sim.set_properties(id, properties)?;
        }
        info!(
            width = scenario.width,
            height = scenario.height,
            agents = sim.agents.len(),
            goals = scenario.goals.len(),
            "Scenario loaded"
        );
        Ok(sim)
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// The committed world.
    pub const fn world(&self) -> &WorldHistory {
        &self.world
    }

    /// The latest committed time step.
    pub fn time_step(&self) -> u64 {
        self.world.latest_time_step()
    }

    /// One agent.
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    /// Every agent, by id.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// The active culture.
    pub const fn culture(&self) -> &Culture {
        &self.culture
    }

    /// The configuration in use.
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Every event published so far.
    pub fn events(&self) -> &[SimEvent] {
        self.bus.events()
    }

    /// The event bus.
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Net score of the primary agent, or zero without one.
    pub fn primary_score(&self) -> i64 {
        self.world
            .primary()
            .map_or(0, |primary| self.bus.score_of(primary))
    }

    /// Whether every agent with a goal stands on it.
    pub fn all_goals_reached(&self) -> bool {
        let t = self.time_step();
        self.agents.values().all(|agent| {
            agent
                .goal()
                .is_none_or(|goal| self.world.find_agent(agent.id(), t) == Some(goal))
        })
    }

    /// Register an observer for all future events.
    pub fn subscribe(&mut self, observer: Box<dyn SimObserver>) {
        self.bus.subscribe(observer);
    }

    // -------------------------------------------------------------------
    // Edits (before the first step)
    // -------------------------------------------------------------------

    /// Place an obstacle on an empty cell.
    ///
    /// # Errors
    ///
    /// Fails once the simulation has started or if the cell is taken.
    pub fn add_obstacle(&mut self, coord: Coord, kind: ObstacleKind) -> Result<(), SimulationError> {
        self.world.add_obstacle(coord, kind)?;
        self.update_agents(true)
    }

    /// Place an agent on an empty cell. Without an explicit id the lowest
    /// free one is used. The configured primary agent is handed to the
    /// direction source.
    ///
    /// # Errors
    ///
    /// Fails once the simulation has started, if the cell is taken, or if
    /// the id is already in use.
    pub fn add_agent(&mut self, coord: Coord, id: Option<AgentId>) -> Result<AgentId, SimulationError> {
        let id = match id {
            Some(id) => id,
            None => (1..=MAX_AUTO_AGENT_ID)
                .map(AgentId::new)
                .find(|candidate| !self.agents.contains_key(candidate))
                .ok_or(SimulationError::NoFreeAgentId)?,
        };
        let mut agent = Agent::new(
            id,
            self.world.width(),
            self.world.height(),
            self.config.planning.clone(),
        )?;
        self.world.add_agent(id, coord)?;
        agent.set_properties(self.culture.random_properties(&mut self.rng));
        if self.world.primary() == Some(id) {
            agent.set_externally_controlled(true);
        }
        debug!(agent_id = %id, %coord, "Agent added");
        self.agents.insert(id, agent);
        self.update_agents(true)?;
        Ok(id)
    }

    /// Clear whatever occupies a cell and return it.
    ///
    /// # Errors
    ///
    /// Fails once the simulation has started or if `coord` is off the grid.
    pub fn erase_item(&mut self, coord: Coord) -> Result<CellValue, SimulationError> {
        let erased = self.world.erase(coord)?;
        if let Some(id) = erased.agent() {
            self.agents.remove(&id);
            debug!(agent_id = %id, %coord, "Agent erased");
        }
        self.update_agents(true)?;
        Ok(erased)
    }

    /// Give an agent a destination. The cell must be empty.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::UnknownAgent`] for a missing agent and
    /// [`SimulationError::GoalNotEmpty`] for an occupied or off-grid cell.
    pub fn assign_goal(&mut self, id: AgentId, goal: Coord) -> Result<(), SimulationError> {
        let agent = self
            .agents
            .get_mut(&id)
            .ok_or(SimulationError::UnknownAgent(id))?;
        let t = self.world.latest_time_step();
        let empty = self
            .world
            .grid_at(t)
            .is_some_and(|grid| grid.is_empty(goal));
        if !empty {
            return Err(SimulationError::GoalNotEmpty(goal));
        }
        agent.set_goal(Some(goal));
        self.update_agents(true)
    }

    /// Replace an agent's attributes.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::UnknownAgent`] for a missing agent.
    pub fn set_properties(
        &mut self,
        id: AgentId,
        properties: AgentProperties,
    ) -> Result<(), SimulationError> {
        self.agents
            .get_mut(&id)
            .ok_or(SimulationError::UnknownAgent(id))?
            .set_properties(properties);
        Ok(())
    }

    // -------------------------------------------------------------------
    // Step loop
    // -------------------------------------------------------------------

    /// Run one step.
    ///
    /// A rejected batch is an [`StepOutcome::Rejected`] value, not an
    /// error; calling again retries from the same time step.
    ///
    /// # Errors
    ///
    /// Fails only if the world or an agent is internally inconsistent.
    pub fn simulate_step(
        &mut self,
        directions: &mut dyn DirectionSource,
    ) -> Result<StepOutcome, SimulationError> {
        self.world.lock_for_edits();
        let t = self.world.latest_time_step();
        self.update_agents(false)?;
        if self.config.simulation.communication {
            self.communicate(t);
        }
        let moves = self.collect_moves(t, directions)?;

        match self.world.attempt_move(&moves) {
            Ok(commit) => {
                if !commit.unresolved_conflicts.is_empty() {
                    info!(
                        time_step = commit.time_step,
                        agents = ?commit.unresolved_conflicts,
                        "Conflict committed without the primary agent"
                    );
                }
                self.publish(
                    commit.time_step,
                    SimEventKind::StepCommitted {
                        time_step: commit.time_step,
                    },
                );
                self.charge_primary(commit.time_step, STEP_PENALTY);
                debug!(time_step = commit.time_step, "Step committed");
                Ok(StepOutcome::Committed(commit))
            }
            Err(MoveRejection::World(err)) => Err(err.into()),
            Err(rejection) => {
                if let MoveRejection::PrimaryCollision { agents } = &rejection {
                    self.publish(
                        t,
                        SimEventKind::Collision {
                            agents: agents.iter().copied().collect(),
                        },
                    );
                    self.charge_primary(t, COLLISION_PENALTY);
                }
                info!(time_step = t, %rejection, "Step rejected");
                Ok(StepOutcome::Rejected(rejection))
            }
        }
    }

    /// Every agent observes the latest snapshot and replans.
    fn update_agents(&mut self, overwrite: bool) -> Result<(), SimulationError> {
        let t = self.world.latest_time_step();
        let grid = self
            .world
            .grid_at(t)
            .ok_or(SimulationError::MissingSnapshot(t))?;
        let radius = self.config.planning.visibility_radius;
        for (&id, agent) in &mut self.agents {
            let pos = grid
                .find_agent(id)
                .ok_or(SimulationError::UnknownAgent(id))?;
            agent.update_world_knowledge(&grid.visible_from(pos, radius), t, overwrite);
        }
        Ok(())
    }

    /// Run every agent's conversations for this step.
    fn communicate(&mut self, t: u64) {
        let mut budget = self.config.simulation.max_locutions_per_step;
        let ids: Vec<AgentId> = self.agents.keys().copied().collect();
        for id in ids {
            let opening = self
                .agents
                .get(&id)
                .map(Agent::communicate)
                .unwrap_or_default();
            for (to, locution) in opening {
                let mut queue = VecDeque::from([Envelope {
                    from: id,
                    to,
                    locution,
                }]);
                while let Some(envelope) = queue.pop_front() {
                    if budget == 0 {
                        let undelivered = queue.len().saturating_add(1);
                        warn!(time_step = t, undelivered, "Locution budget exhausted");
                        self.publish(t, SimEventKind::CommunicationCut { undelivered });
                        return;
                    }
                    budget = budget.saturating_sub(1);
                    queue.extend(self.deliver(t, &envelope));
                }
            }
        }
    }

    /// Hand one locution to its receiver and return the replies.
    fn deliver(&mut self, t: u64, envelope: &Envelope) -> Vec<Envelope> {
        let Some(sender) = self.agents.get(&envelope.from).map(|agent| Counterpart {
            id: agent.id(),
            properties: agent.properties(),
            externally_controlled: agent.is_externally_controlled(),
        }) else {
            return Vec::new();
        };
        let Some(receiver) = self.agents.get_mut(&envelope.to) else {
            return Vec::new();
        };
        let response = receiver.receive_locution(
            sender,
            &envelope.locution,
            self.culture.framework(),
            &mut self.rng,
        );
        if let Some(hint) = response.hint {
            self.publish(
                t,
                SimEventKind::Hint {
                    agent: hint.about,
                    text: hint.text,
                },
            );
        }
        response
            .replies
            .into_iter()
            .map(|locution| Envelope {
                from: envelope.to,
                to: envelope.from,
                locution,
            })
            .collect()
    }

    /// One move per agent for `t + 1`.
    fn collect_moves(
        &mut self,
        t: u64,
        directions: &mut dyn DirectionSource,
    ) -> Result<BTreeMap<AgentId, Coord>, SimulationError> {
        let mut moves = BTreeMap::new();
        let mut standing = true;
        for (&id, agent) in &mut self.agents {
            let current = self
                .world
                .find_agent(id, t)
                .ok_or(SimulationError::UnknownAgent(id))?;
            if agent.is_externally_controlled() {
                let direction = directions.direction_for(id, t).unwrap_or(Direction::Wait);
                agent.apply_direction(direction);
            }
            let next = agent.proposed_move().unwrap_or(current);
            standing &= next == current;
            moves.insert(id, next);
        }
        if standing && !moves.is_empty() {
            info!(time_step = t, "Standstill: no agent moves");
        }
        Ok(moves)
    }

    fn charge_primary(&mut self, t: u64, delta: i32) {
        if let Some(primary) = self.world.primary()
            && self.agents.contains_key(&primary)
        {
            self.publish(t, SimEventKind::ScoreChanged { agent: primary, delta });
        }
    }

    fn publish(&mut self, t: u64, kind: SimEventKind) {
        self.bus.publish(SimEvent::new(t, kind));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::direction::{HoldPosition, ScriptedDirections};

    fn make_config(primary: Option<u32>) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.simulation.primary_agent = primary.map(AgentId::new);
        config
    }

    fn make_sim(width: u32, height: u32, primary: Option<u32>) -> Simulator<SmallRng> {
        Simulator::new(width, height, make_config(primary), SmallRng::seed_from_u64(7)).unwrap()
    }

    #[test]
    fn auto_ids_fill_the_lowest_gap() {
        let mut sim = make_sim(4, 1, None);
        assert_eq!(sim.add_agent(Coord::new(0, 0), None).unwrap(), AgentId::new(1));
        sim.add_agent(Coord::new(1, 0), Some(AgentId::new(3))).unwrap();
        assert_eq!(sim.add_agent(Coord::new(2, 0), None).unwrap(), AgentId::new(2));
        assert_eq!(sim.add_agent(Coord::new(3, 0), None).unwrap(), AgentId::new(4));
    }

    #[test]
    fn primary_agent_is_externally_controlled() {
        let mut sim = make_sim(3, 1, Some(1));
        sim.add_agent(Coord::new(0, 0), None).unwrap();
        sim.add_agent(Coord::new(2, 0), None).unwrap();
        assert!(sim.agent(AgentId::new(1)).unwrap().is_externally_controlled());
        assert!(!sim.agent(AgentId::new(2)).unwrap().is_externally_controlled());
    }

    #[test]
    fn goals_must_be_empty_cells() {
        let mut sim = make_sim(3, 1, None);
        let id = sim.add_agent(Coord::new(0, 0), None).unwrap();
        sim.add_obstacle(Coord::new(2, 0), ObstacleKind::Permanent).unwrap();
        assert!(matches!(
            sim.assign_goal(id, Coord::new(2, 0)),
            Err(SimulationError::GoalNotEmpty(_))
        ));
        assert!(matches!(
            sim.assign_goal(AgentId::new(9), Coord::new(1, 0)),
            Err(SimulationError::UnknownAgent(_))
        ));
        sim.assign_goal(id, Coord::new(1, 0)).unwrap();
        assert_eq!(sim.agent(id).unwrap().goal(), Some(Coord::new(1, 0)));
    }

    #[test]
    fn erase_removes_agents_and_obstacles() {
        let mut sim = make_sim(3, 1, None);
        let id = sim.add_agent(Coord::new(0, 0), None).unwrap();
        sim.add_obstacle(Coord::new(1, 0), ObstacleKind::Temporary).unwrap();
        assert_eq!(sim.erase_item(Coord::new(0, 0)).unwrap(), CellValue::Agent(id));
        assert!(sim.agent(id).is_none());
        assert_eq!(
            sim.erase_item(Coord::new(1, 0)).unwrap(),
            CellValue::TemporaryObstacle
        );
    }

    #[test]
    fn edits_are_refused_after_the_first_step() {
        let mut sim = make_sim(3, 1, None);
        sim.add_agent(Coord::new(0, 0), None).unwrap();
        sim.simulate_step(&mut HoldPosition::new()).unwrap();
        assert!(matches!(
            sim.add_obstacle(Coord::new(2, 0), ObstacleKind::Permanent),
            Err(SimulationError::World(WorldError::Locked))
        ));
    }

    #[test]
    fn lone_agent_walks_to_its_goal() {
        let mut sim = make_sim(4, 1, None);
        let id = sim.add_agent(Coord::new(0, 0), None).unwrap();
        sim.assign_goal(id, Coord::new(3, 0)).unwrap();
        for _ in 0..3 {
            assert!(sim.simulate_step(&mut HoldPosition::new()).unwrap().is_committed());
        }
        assert!(sim.all_goals_reached());
        assert_eq!(sim.time_step(), 3);
        assert_eq!(sim.world().find_agent(id, 3), Some(Coord::new(3, 0)));
    }

    #[test]
    fn committed_steps_cost_the_primary_a_point() {
        let mut sim = make_sim(3, 1, Some(1));
        sim.add_agent(Coord::new(0, 0), None).unwrap();
        let mut script = ScriptedDirections::parse("RR").unwrap();
        for _ in 0..2 {
            sim.simulate_step(&mut script).unwrap();
        }
        assert_eq!(sim.world().find_agent(AgentId::new(1), 2), Some(Coord::new(2, 0)));
        assert_eq!(sim.primary_score(), -2);
        let committed = sim
            .events()
            .iter()
            .filter(|e| matches!(e.kind, SimEventKind::StepCommitted { .. }))
            .count();
        assert_eq!(committed, 2);
    }

    #[test]
    fn exhausted_locution_budget_is_reported() {
        let mut config = make_config(None);
        config.simulation.communication = true;
        config.simulation.max_locutions_per_step = 1;
        let mut sim = Simulator::new(3, 1, config, SmallRng::seed_from_u64(7)).unwrap();
        sim.add_agent(Coord::new(0, 0), None).unwrap();
        sim.add_agent(Coord::new(2, 0), None).unwrap();

        // The ask goes out; the inform reply does not fit.
        assert!(sim.simulate_step(&mut HoldPosition::new()).unwrap().is_committed());
        let cuts: Vec<_> = sim
            .events()
            .iter()
            .filter_map(|e| match e.kind {
                SimEventKind::CommunicationCut { undelivered } => Some((e.time_step, undelivered)),
                _ => None,
            })
            .collect();
        assert_eq!(cuts, vec![(0, 1)]);
    }

    #[test]
    fn from_scenario_applies_goals_and_properties() {
        let scenario = Scenario::parse(
            "3 1\n1\n0\n-1\nGOALS\n1 1 0\nEND\nPROPERTIES\n1 rank=6 tasked=true\nEND\n",
        )
        .unwrap();
        let sim = Simulator::from_scenario(&scenario, make_config(None), SmallRng::seed_from_u64(1))
            .unwrap();
        let agent = sim.agent(AgentId::new(1)).unwrap();
        assert_eq!(agent.goal(), Some(Coord::new(1, 0)));
        assert_eq!(agent.properties().military_rank, 6);
        assert!(agent.properties().is_tasked());
        assert!(sim.world().latest().unwrap().is_obstacle(Coord::new(2, 0)));
    }
}
