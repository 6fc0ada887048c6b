//! Append-only world history and the per-step transaction engine.
//!
//! [`WorldHistory`] holds one committed [`Grid`] per time step. Before the
//! simulation starts the initial snapshot may be edited freely; once
//! locked, the only way to change the world is [`WorldHistory::attempt_move`],
//! which either appends a new snapshot for the next time step or rejects
//! the whole batch. Committed snapshots are never modified.

use std::collections::{BTreeMap, BTreeSet};

use parley_types::{AgentId, CellValue, Coord, ObstacleKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::conflict::is_swap;
use crate::error::WorldError;
use crate::grid::Grid;

/// Swap checks only apply when committing a time step past this one.
const SWAP_CHECK_AFTER: u64 = 2;

/// Why a move batch was not committed. The committed time step is
/// unchanged after any rejection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveRejection {
    /// Moves may only be attempted once the world is locked.
    #[error("world is not locked for simulation")]
    NotLocked,

    /// Exactly one move per registered agent is required.
    #[error("expected {expected} moves, received {received}")]
    WrongMoveCount {
        /// Registered agents.
        expected: usize,
        /// Moves supplied.
        received: usize,
    },

    /// A move names an agent that is not registered.
    #[error("agent {0} is not registered")]
    UnknownAgent(AgentId),

    /// One or more agents would leave the grid.
    #[error("agents {agents:?} would leave the grid")]
    OutOfBounds {
        /// Offending agents.
        agents: BTreeSet<AgentId>,
    },

    /// One or more agents would crash into an obstacle.
    #[error("agents {agents:?} would crash into an obstacle")]
    ObstacleCrash {
        /// Offending agents.
        agents: BTreeSet<AgentId>,
    },

    /// The primary agent is part of a collision or swap.
    #[error("primary agent collides with {agents:?}")]
    PrimaryCollision {
        /// Every agent in the conflict set.
        agents: BTreeSet<AgentId>,
    },

    /// The time step counter cannot advance further.
    #[error("time step overflow")]
    TimeStepOverflow,

    /// The snapshot could not be updated.
    #[error(transparent)]
    World(#[from] WorldError),
}

/// A successfully committed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCommit {
    /// The newly committed time step.
    pub time_step: u64,
    /// Agents that collided without involving the primary agent. These
    /// are committed anyway and left to negotiation.
    pub unresolved_conflicts: BTreeSet<AgentId>,
}

/// Time-indexed sequence of committed snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldHistory {
    /// Snapshot per time step; index equals time step.
    steps: Vec<Grid>,
    /// Whether edits are closed and moves allowed.
    locked: bool,
    /// The agent whose conflicts reject a batch.
    primary: Option<AgentId>,
    /// Agent id to time step to position.
    positions: BTreeMap<AgentId, BTreeMap<u64, Coord>>,
}

impl WorldHistory {
    /// Start a history with an empty `width` x `height` grid at time 0.
    pub fn new(width: u32, height: u32) -> Result<Self, WorldError> {
        Ok(Self {
            steps: vec![Grid::new(width, height)?],
            locked: false,
            primary: None,
            positions: BTreeMap::new(),
        })
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Grid width.
    pub fn width(&self) -> u32 {
        self.latest().map_or(0, Grid::width)
    }

    /// Grid height.
    pub fn height(&self) -> u32 {
        self.latest().map_or(0, Grid::height)
    }

    /// Whether `coord` is on the grid.
    pub fn within_bounds(&self, coord: Coord) -> bool {
        self.latest().is_some_and(|g| g.within_bounds(coord))
    }

    /// The most recently committed time step.
    pub fn latest_time_step(&self) -> u64 {
        u64::try_from(self.steps.len().saturating_sub(1)).unwrap_or(u64::MAX)
    }

    /// Number of committed snapshots.
    pub fn simulation_size(&self) -> usize {
        self.steps.len()
    }

    /// The committed snapshot for time step `t`.
    pub fn grid_at(&self, t: u64) -> Option<&Grid> {
        usize::try_from(t).ok().and_then(|i| self.steps.get(i))
    }

    /// The latest committed snapshot.
    pub fn latest(&self) -> Option<&Grid> {
        self.steps.last()
    }

    /// Where agent `id` was at time step `t`.
    pub fn find_agent(&self, id: AgentId, t: u64) -> Option<Coord> {
        self.positions.get(&id)?.get(&t).copied()
    }

    /// Registered agent ids.
    pub fn agent_ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.positions.keys().copied()
    }

    /// Number of registered agents.
    pub fn agent_count(&self) -> usize {
        self.positions.len()
    }

    /// Whether edits are closed.
    pub const fn is_locked(&self) -> bool {
        self.locked
    }

    /// The primary agent, if one is flagged.
    pub const fn primary(&self) -> Option<AgentId> {
        self.primary
    }

    // -------------------------------------------------------------------
    // Edits (before locking)
    // -------------------------------------------------------------------

    fn editable(&mut self) -> Result<&mut Vec<Grid>, WorldError> {
        if self.locked {
            return Err(WorldError::Locked);
        }
        Ok(&mut self.steps)
    }

    /// Flag the agent whose collisions reject a batch.
    pub const fn set_primary(&mut self, primary: Option<AgentId>) {
        self.primary = primary;
    }

    /// Place an obstacle on an empty cell.
    pub fn add_obstacle(&mut self, coord: Coord, kind: ObstacleKind) -> Result<(), WorldError> {
        for grid in self.editable()? {
            grid.add_obstacle(coord, kind)?;
        }
        Ok(())
    }

    /// Remove an obstacle.
    pub fn remove_obstacle(&mut self, coord: Coord) -> Result<(), WorldError> {
        for grid in self.editable()? {
            grid.remove_obstacle(coord)?;
        }
        Ok(())
    }

    /// Place a new agent on an empty cell.
    pub fn add_agent(&mut self, id: AgentId, coord: Coord) -> Result<(), WorldError> {
        let t = self.latest_time_step();
        for grid in self.editable()? {
            grid.add_agent(id, coord)?;
        }
        self.positions.insert(id, BTreeMap::from([(t, coord)]));
        Ok(())
    }

    /// Remove an agent.
    pub fn remove_agent(&mut self, id: AgentId) -> Result<(), WorldError> {
        for grid in self.editable()? {
            grid.remove_agent(id)?;
        }
        self.positions.remove(&id);
        Ok(())
    }

    /// Clear whatever occupies a cell.
    pub fn erase(&mut self, coord: Coord) -> Result<CellValue, WorldError> {
        let mut erased = CellValue::Empty;
        for grid in self.editable()? {
            erased = grid.erase(coord)?;
        }
        if let Some(id) = erased.agent() {
            self.positions.remove(&id);
        }
        Ok(erased)
    }

    /// Close edits; moves may be attempted from now on.
    pub fn lock_for_edits(&mut self) {
        if !self.locked {
            debug!(agents = self.positions.len(), "world locked for simulation");
        }
        self.locked = true;
    }

    // -------------------------------------------------------------------
    // Transaction engine
    // -------------------------------------------------------------------

    /// Validate and commit one move per registered agent for the next
    /// time step. Either the whole batch is applied or nothing is.
    pub fn attempt_move(
        &mut self,
        moves: &BTreeMap<AgentId, Coord>,
    ) -> Result<StepCommit, MoveRejection> {
        if !self.locked {
            return Err(MoveRejection::NotLocked);
        }
        if moves.len() != self.positions.len() {
            return Err(MoveRejection::WrongMoveCount {
                expected: self.positions.len(),
                received: moves.len(),
            });
        }
        if let Some(&unknown) = moves.keys().find(|id| !self.positions.contains_key(id)) {
            return Err(MoveRejection::UnknownAgent(unknown));
        }
        let current = self.latest_time_step();
        let next = current
            .checked_add(1)
            .ok_or(MoveRejection::TimeStepOverflow)?;
        let mut snapshot = self
            .latest()
            .cloned()
            .ok_or(MoveRejection::TimeStepOverflow)?;

        let mut out_of_bounds = BTreeSet::new();
        let mut crashing = BTreeSet::new();
        let mut claims: BTreeMap<Coord, Vec<AgentId>> = BTreeMap::new();
        for (&id, &to) in moves {
            match snapshot.cell(to) {
                None => {
                    out_of_bounds.insert(id);
                }
                Some(value) if value.is_obstacle() => {
                    crashing.insert(id);
                }
                Some(_) => {}
            }
            claims.entry(to).or_default().push(id);
        }

        let mut conflicts: BTreeSet<AgentId> = claims
            .values()
            .filter(|ids| ids.len() > 1)
            .flatten()
            .copied()
            .collect();

        if next > SWAP_CHECK_AFTER {
            let pairs: Vec<(AgentId, Coord, Coord)> = moves
                .iter()
                .filter_map(|(&id, &to)| self.find_agent(id, current).map(|from| (id, from, to)))
                .collect();
            for (i, &(a, a_from, a_to)) in pairs.iter().enumerate() {
                for &(b, b_from, b_to) in pairs.iter().skip(i.saturating_add(1)) {
                    if is_swap(a_from, a_to, b_from, b_to) {
                        conflicts.insert(a);
                        conflicts.insert(b);
                    }
                }
            }
        }

        if !crashing.is_empty() {
            warn!(time_step = next, agents = ?crashing, "move batch crashes into obstacles");
            return Err(MoveRejection::ObstacleCrash { agents: crashing });
        }
        if !out_of_bounds.is_empty() {
            warn!(time_step = next, agents = ?out_of_bounds, "move batch leaves the grid");
            return Err(MoveRejection::OutOfBounds {
                agents: out_of_bounds,
            });
        }
        if self.primary.is_some_and(|p| conflicts.contains(&p)) {
            warn!(time_step = next, agents = ?conflicts, "primary agent collision");
            return Err(MoveRejection::PrimaryCollision { agents: conflicts });
        }

        for (&id, &to) in moves {
            snapshot.move_agent(id, to)?;
        }
        for (&id, &to) in moves {
            self.positions.entry(id).or_default().insert(next, to);
        }
        self.steps.push(snapshot);
        if !conflicts.is_empty() {
            debug!(time_step = next, agents = ?conflicts, "committed with unresolved conflicts");
        }
        Ok(StepCommit {
            time_step: next,
            unresolved_conflicts: conflicts,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const A: AgentId = AgentId::new(1);
    const B: AgentId = AgentId::new(2);

    fn make_history() -> WorldHistory {
        let mut world = WorldHistory::new(4, 2).unwrap();
        world.add_agent(A, Coord::new(0, 0)).unwrap();
        world.add_agent(B, Coord::new(1, 0)).unwrap();
        world
            .add_obstacle(Coord::new(3, 1), ObstacleKind::Permanent)
            .unwrap();
        world
    }

    fn batch(a: (u32, u32), b: (u32, u32)) -> BTreeMap<AgentId, Coord> {
        BTreeMap::from([(A, Coord::new(a.0, a.1)), (B, Coord::new(b.0, b.1))])
    }

    fn hold(world: &mut WorldHistory, steps: usize) {
        let t = world.latest_time_step();
        let moves: BTreeMap<AgentId, Coord> = world
            .agent_ids()
            .filter_map(|id| world.find_agent(id, t).map(|c| (id, c)))
            .collect();
        for _ in 0..steps {
            world.attempt_move(&moves).unwrap();
        }
    }

    #[test]
    fn moves_require_lock() {
        let mut world = make_history();
        assert_eq!(
            world.attempt_move(&batch((0, 1), (1, 1))),
            Err(MoveRejection::NotLocked)
        );
    }

    #[test]
    fn edits_rejected_after_lock() {
        let mut world = make_history();
        world.lock_for_edits();
        assert_eq!(
            world.add_obstacle(Coord::new(2, 0), ObstacleKind::Temporary),
            Err(WorldError::Locked)
        );
        assert_eq!(world.remove_agent(A), Err(WorldError::Locked));
    }

    #[test]
    fn commit_appends_snapshot() {
        let mut world = make_history();
        world.lock_for_edits();
        let commit = world.attempt_move(&batch((0, 1), (2, 0))).unwrap();
        assert_eq!(commit.time_step, 1);
        assert_eq!(world.simulation_size(), 2);
        assert_eq!(world.find_agent(A, 0), Some(Coord::new(0, 0)));
        assert_eq!(world.find_agent(A, 1), Some(Coord::new(0, 1)));
        // The committed past is untouched.
        assert_eq!(
            world.grid_at(0).and_then(|g| g.find_agent(B)),
            Some(Coord::new(1, 0))
        );
        assert_eq!(
            world.grid_at(1).and_then(|g| g.cell(Coord::new(1, 0))),
            Some(CellValue::Empty)
        );
    }

    #[test]
    fn wrong_cardinality_is_rejected() {
        let mut world = make_history();
        world.lock_for_edits();
        let moves = BTreeMap::from([(A, Coord::new(0, 1))]);
        assert_eq!(
            world.attempt_move(&moves),
            Err(MoveRejection::WrongMoveCount {
                expected: 2,
                received: 1
            })
        );
    }

    #[test]
    fn invalid_batch_rejection_is_idempotent() {
        let mut world = make_history();
        world.lock_for_edits();
        let moves = batch((0, 1), (3, 1));
        let first = world.attempt_move(&moves);
        let second = world.attempt_move(&moves);
        assert_eq!(first, second);
        assert!(matches!(first, Err(MoveRejection::ObstacleCrash { .. })));
        assert_eq!(world.latest_time_step(), 0);

        let off_grid = BTreeMap::from([(A, Coord::new(0, 5)), (B, Coord::new(1, 0))]);
        assert!(matches!(
            world.attempt_move(&off_grid),
            Err(MoveRejection::OutOfBounds { .. })
        ));
        assert_eq!(world.latest_time_step(), 0);
    }

    #[test]
    fn autonomous_collisions_are_committed() {
        let mut world = make_history();
        world.lock_for_edits();
        let commit = world.attempt_move(&batch((1, 1), (1, 1))).unwrap();
        assert_eq!(commit.unresolved_conflicts, BTreeSet::from([A, B]));
    }

    #[test]
    fn primary_collision_is_rejected() {
        let mut world = make_history();
        world.set_primary(Some(A));
        world.lock_for_edits();
        let result = world.attempt_move(&batch((1, 1), (1, 1)));
        assert_eq!(
            result,
            Err(MoveRejection::PrimaryCollision {
                agents: BTreeSet::from([A, B])
            })
        );
        assert_eq!(world.latest_time_step(), 0);
    }

    #[test]
    fn primary_swap_is_rejected_after_warmup() {
        let mut world = make_history();
        world.set_primary(Some(A));
        world.lock_for_edits();
        // Swapping into time step 1 is not checked.
        let early = world.attempt_move(&batch((1, 0), (0, 0)));
        assert!(early.is_ok());
        hold(&mut world, 1);
        let swap = batch((0, 0), (1, 0));
        for _ in 0..2 {
            assert_eq!(
                world.attempt_move(&swap),
                Err(MoveRejection::PrimaryCollision {
                    agents: BTreeSet::from([A, B])
                })
            );
        }
        assert_eq!(world.latest_time_step(), 2);
    }

    #[test]
    fn erase_removes_agent_registration() {
        let mut world = make_history();
        assert_eq!(world.erase(Coord::new(1, 0)), Ok(CellValue::Agent(B)));
        assert_eq!(world.agent_count(), 1);
        assert_eq!(world.erase(Coord::new(3, 1)), Ok(CellValue::PermanentObstacle));
    }
}
