//! Time-expanded breadth-first search.
//!
//! The search space is every `(cell, time step)` pair. From a state an
//! agent may step to any 4-neighbour that is not an obstacle, or wait in
//! place; agents are not obstacles. Expansion is FIFO so the first goal
//! state reached has the earliest arrival time.
//!
//! When the searching agent yields to other agents, every candidate state
//! is checked inline against their estimated paths: it may neither land
//! on a cell they hold at that time step nor swap places with them. The
//! goal only counts once every yielded-to agent has left the goal cell
//! for good.
//!
//! Visited states are tracked in a fixed ring of two layers indexed by
//! time step, since a FIFO search over a time-expanded graph only ever
//! produces successors one layer ahead of the state being expanded. The
//! node arena is not ringed: parent links reach back to the origin.

use std::collections::VecDeque;

use parley_types::{Coord, Path, SpaceTime};

use crate::conflict::{is_swap, position_at};
use crate::grid::Grid;

/// Why no path was produced. Callers treat both cases identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Unreachable {
    /// Every reachable state was expanded without meeting the goal test.
    #[error("search space exhausted")]
    Exhausted,
    /// The search horizon exceeded the timeout.
    #[error("search timed out")]
    TimedOut,
}

/// Number of time layers kept in the visited ring.
const RING_LAYERS: u64 = 2;

/// Visited flags for `(cell, time step mod RING_LAYERS)`.
struct VisitedRing {
    cells_per_layer: usize,
    width: usize,
    flags: Vec<bool>,
}

impl VisitedRing {
    fn new(grid: &Grid) -> Option<Self> {
        let width = usize::try_from(grid.width()).ok()?;
        let height = usize::try_from(grid.height()).ok()?;
        let cells_per_layer = width.checked_mul(height)?;
        Some(Self {
            cells_per_layer,
            width,
            flags: vec![false; cells_per_layer.checked_mul(usize::try_from(RING_LAYERS).ok()?)?],
        })
    }

    fn slot(&self, state: SpaceTime) -> Option<usize> {
        let layer = usize::try_from(state.t % RING_LAYERS).ok()?;
        let x = usize::try_from(state.pos.x).ok()?;
        let y = usize::try_from(state.pos.y).ok()?;
        layer
            .checked_mul(self.cells_per_layer)?
            .checked_add(y.checked_mul(self.width)?)?
            .checked_add(x)
    }

    /// Mark a state, returning `false` if it was already marked.
    fn insert(&mut self, state: SpaceTime) -> bool {
        let Some(flag) = self.slot(state).and_then(|i| self.flags.get_mut(i)) else {
            return false;
        };
        !std::mem::replace(flag, true)
    }

    /// Forget every state of the layer `t` falls in.
    fn clear_layer(&mut self, t: u64) {
        let Ok(layer) = usize::try_from(t % RING_LAYERS) else {
            return;
        };
        let start = layer.saturating_mul(self.cells_per_layer);
        let end = start.saturating_add(self.cells_per_layer);
        if let Some(flags) = self.flags.get_mut(start..end) {
            flags.fill(false);
        }
    }
}

struct Node {
    state: SpaceTime,
    parent: Option<usize>,
}

/// Search for a path from `origin` to `goal` on `grid`.
///
/// `yield_to` holds the estimated paths of the agents being yielded to;
/// pass an empty slice to plan without yielding. The search gives up once
/// it would expand a state more than `timeout` steps after `origin.t`.
///
/// Memory: the visited flags take `2 * width * height` slots, but every
/// expanded state stays in the node arena for path reconstruction, so a
/// failing search holds up to `(timeout + 1) * width * height` nodes.
pub fn search(
    grid: &Grid,
    origin: SpaceTime,
    goal: Coord,
    yield_to: &[&[SpaceTime]],
    timeout: u64,
) -> Result<Path, Unreachable> {
    let Some(mut visited) = VisitedRing::new(grid) else {
        return Err(Unreachable::Exhausted);
    };
    if !grid.within_bounds(origin.pos) || !grid.within_bounds(goal) {
        return Err(Unreachable::Exhausted);
    }

    let mut nodes = vec![Node {
        state: origin,
        parent: None,
    }];
    let mut queue = VecDeque::from([0_usize]);
    visited.insert(origin);
    let mut layer = origin.t;

    while let Some(index) = queue.pop_front() {
        let Some(current) = nodes.get(index).map(|n| n.state) else {
            continue;
        };
        if current.t.saturating_sub(origin.t) > timeout {
            return Err(Unreachable::TimedOut);
        }
        if current.pos == goal && goal_is_clear(current, yield_to) {
            return Ok(reconstruct(&nodes, index));
        }
        let Some(next_t) = current.t.checked_add(1) else {
            continue;
        };
        if current.t != layer {
            layer = current.t;
            visited.clear_layer(next_t);
        }

        let moves = grid.neighbours(current.pos).chain(std::iter::once(current.pos));
        for pos in moves {
            if grid.is_obstacle(pos) {
                continue;
            }
            let next = SpaceTime::new(pos, next_t);
            if blocked_by_yield(current, next, yield_to) || !visited.insert(next) {
                continue;
            }
            nodes.push(Node {
                state: next,
                parent: Some(index),
            });
            queue.push_back(nodes.len().saturating_sub(1));
        }
    }
    Err(Unreachable::Exhausted)
}

/// Whether stepping `current -> next` lands on, or passes through, any
/// yielded-to agent.
fn blocked_by_yield(current: SpaceTime, next: SpaceTime, yield_to: &[&[SpaceTime]]) -> bool {
    yield_to.iter().any(|path| {
        let theirs_next = position_at(path, next.t);
        if theirs_next == Some(next.pos) {
            return true;
        }
        match (position_at(path, current.t), theirs_next) {
            (Some(from), Some(to)) => is_swap(current.pos, next.pos, from, to),
            _ => false,
        }
    })
}

/// The goal counts only after every yielded-to agent's last visit to it.
/// An agent whose path ends on the goal holds it forever.
fn goal_is_clear(arrival: SpaceTime, yield_to: &[&[SpaceTime]]) -> bool {
    yield_to.iter().all(|path| {
        if path.last().is_some_and(|s| s.pos == arrival.pos) {
            return false;
        }
        path.iter()
            .filter(|s| s.pos == arrival.pos)
            .map(|s| s.t)
            .max()
            .is_none_or(|last_visit| arrival.t > last_visit)
    })
}

fn reconstruct(nodes: &[Node], goal_index: usize) -> Path {
    let mut path = Vec::new();
    let mut cursor = Some(goal_index);
    while let Some(node) = cursor.and_then(|i| nodes.get(i)) {
        path.push(node.state);
        cursor = node.parent;
    }
    path.reverse();
    path
}

/// The straight run from `origin` to `destination`, both ends included,
/// one cell per time step from `origin.t`. Empty when the two cells do not
/// share a row or a column.
pub fn straight_line(origin: SpaceTime, destination: Coord) -> Path {
    let from = origin.pos;
    if from.x != destination.x && from.y != destination.y {
        return Vec::new();
    }
    let mut path = vec![origin];
    let mut current = origin;
    while current.pos != destination {
        let pos = current.pos;
        let next = if pos.x < destination.x {
            Coord::new(pos.x.saturating_add(1), pos.y)
        } else if pos.x > destination.x {
            Coord::new(pos.x.saturating_sub(1), pos.y)
        } else if pos.y < destination.y {
            Coord::new(pos.x, pos.y.saturating_add(1))
        } else {
            Coord::new(pos.x, pos.y.saturating_sub(1))
        };
        current = current.then(next);
        path.push(current);
    }
    path
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use parley_types::ObstacleKind;

    use super::*;
    use crate::conflict::{first_vertex_conflict, illegal_swap};

    const TIMEOUT: u64 = 100;

    fn at(x: u32, y: u32, t: u64) -> SpaceTime {
        SpaceTime::new(Coord::new(x, y), t)
    }

    fn make_walled_grid() -> Grid {
        // 5x5 with a wall down column 2 except at the bottom row.
        let mut grid = Grid::new(5, 5).unwrap();
        for y in 0..4 {
            grid.add_obstacle(Coord::new(2, y), ObstacleKind::Permanent)
                .unwrap();
        }
        grid
    }

    fn assert_well_formed(path: &[SpaceTime]) {
        for pair in path.windows(2) {
            let [a, b] = pair else { continue };
            assert_eq!(b.t, a.t + 1);
            assert!(a.pos.manhattan(b.pos) <= 1);
        }
    }

    #[test]
    fn open_grid_path_is_manhattan_length() {
        let grid = Grid::new(6, 6).unwrap();
        for (from, to) in [
            (Coord::new(0, 0), Coord::new(5, 5)),
            (Coord::new(3, 1), Coord::new(0, 4)),
            (Coord::new(2, 2), Coord::new(2, 2)),
        ] {
            let path = search(&grid, SpaceTime::new(from, 7), to, &[], TIMEOUT).unwrap();
            assert_well_formed(&path);
            assert_eq!(path.len(), from.manhattan(to) as usize + 1);
            assert_eq!(path.first().map(|s| s.t), Some(7));
            assert_eq!(path.last().map(|s| s.pos), Some(to));
        }
    }

    #[test]
    fn detours_around_walls() {
        let grid = make_walled_grid();
        let path = search(&grid, at(0, 0, 0), Coord::new(4, 0), &[], TIMEOUT).unwrap();
        assert_well_formed(&path);
        // Down 4, across 4, up 4.
        assert_eq!(path.len(), 13);
        assert!(path.iter().all(|s| !grid.is_obstacle(s.pos)));
    }

    #[test]
    fn walled_off_goal_times_out() {
        let mut grid = Grid::new(3, 3).unwrap();
        grid.add_obstacle(Coord::new(1, 2), ObstacleKind::Permanent)
            .unwrap();
        grid.add_obstacle(Coord::new(2, 1), ObstacleKind::Permanent)
            .unwrap();
        let result = search(&grid, at(0, 0, 0), Coord::new(2, 2), &[], 10);
        assert_eq!(result, Err(Unreachable::TimedOut));
    }

    #[test]
    fn out_of_bounds_goal_is_unreachable() {
        let grid = Grid::new(3, 3).unwrap();
        let result = search(&grid, at(0, 0, 0), Coord::new(5, 5), &[], TIMEOUT);
        assert_eq!(result, Err(Unreachable::Exhausted));
    }

    #[test]
    fn agents_are_passable_without_yielding() {
        let mut grid = Grid::new(3, 1).unwrap();
        grid.add_agent(parley_types::AgentId::new(9), Coord::new(1, 0))
            .unwrap();
        let path = search(&grid, at(0, 0, 0), Coord::new(2, 0), &[], TIMEOUT).unwrap();
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn yielding_waits_for_crossing_agent() {
        // The other agent walks down column 1 through our row.
        let grid = Grid::new(3, 3).unwrap();
        let theirs = vec![at(1, 0, 0), at(1, 1, 1), at(1, 2, 2)];
        let path = search(
            &grid,
            at(0, 1, 0),
            Coord::new(2, 1),
            &[theirs.as_slice()],
            TIMEOUT,
        )
        .unwrap();
        assert_well_formed(&path);
        assert_eq!(first_vertex_conflict(&path, &theirs, 0, u64::MAX), None);
        assert_eq!(illegal_swap(&path, &theirs, usize::MAX), None);
        assert!(path.len() > 3);
    }

    #[test]
    fn yielding_never_swaps() {
        // Corridor with a pocket at (1, 0); the other agent walks left.
        let mut grid = Grid::new(4, 2).unwrap();
        for x in [0, 2, 3] {
            grid.add_obstacle(Coord::new(x, 0), ObstacleKind::Permanent)
                .unwrap();
        }
        let theirs = vec![at(3, 1, 0), at(2, 1, 1), at(1, 1, 2), at(0, 1, 3)];
        let path = search(
            &grid,
            at(1, 1, 0),
            Coord::new(3, 1),
            &[theirs.as_slice()],
            TIMEOUT,
        )
        .unwrap();
        assert_well_formed(&path);
        assert!(path.iter().any(|s| s.pos == Coord::new(1, 0)));
        assert_eq!(first_vertex_conflict(&path, &theirs, 0, u64::MAX), None);
        assert_eq!(illegal_swap(&path, &theirs, usize::MAX), None);
    }

    #[test]
    fn goal_held_forever_is_unreachable() {
        let grid = Grid::new(3, 1).unwrap();
        let parked = vec![at(2, 0, 0)];
        let result = search(
            &grid,
            at(0, 0, 0),
            Coord::new(2, 0),
            &[parked.as_slice()],
            20,
        );
        assert_eq!(result, Err(Unreachable::TimedOut));
    }

    #[test]
    fn arrival_waits_until_goal_is_vacated() {
        let grid = Grid::new(3, 3).unwrap();
        // The other agent passes over our goal at t=3 and leaves.
        let theirs = vec![
            at(2, 0, 0),
            at(2, 1, 1),
            at(2, 2, 2),
            at(1, 2, 3),
            at(0, 2, 4),
        ];
        let goal = Coord::new(2, 2);
        let path = search(&grid, at(0, 0, 0), goal, &[theirs.as_slice()], TIMEOUT).unwrap();
        let arrival = path.last().unwrap();
        assert_eq!(arrival.pos, goal);
        assert!(arrival.t > 2);
        assert_eq!(first_vertex_conflict(&path, &theirs, 0, u64::MAX), None);
    }

    #[test]
    fn straight_line_steps_one_cell_per_tick() {
        let line = straight_line(at(4, 1, 3), Coord::new(1, 1));
        assert_eq!(line, vec![at(4, 1, 3), at(3, 1, 4), at(2, 1, 5), at(1, 1, 6)]);
        assert_eq!(straight_line(at(0, 0, 0), Coord::new(0, 0)), vec![at(0, 0, 0)]);
        assert!(straight_line(at(0, 0, 0), Coord::new(1, 1)).is_empty());
    }
}
