//! Pairwise conflict checks between two time-indexed paths.
//!
//! Both checks treat a path as holding its final position forever after
//! its last state, so a shorter path is padded to align with a longer one.
//! A path says nothing about time steps before its first state.

use parley_types::{Coord, SpaceTime};
use serde::{Deserialize, Serialize};

/// How two paths collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictKind {
    /// Both agents occupy the same cell at the same time step.
    Vertex,
    /// The agents pass through each other between two time steps.
    Swap,
}

/// A detected conflict, located at a state of the first path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Conflict {
    /// Where and when.
    pub state: SpaceTime,
    /// Which kind.
    pub kind: ConflictKind,
}

/// Position on `path` at time `t`, holding the last position once the
/// path has ended. `None` before the path starts or for an empty path.
pub fn position_at(path: &[SpaceTime], t: u64) -> Option<Coord> {
    let first = path.first()?;
    let last = path.last()?;
    if t < first.t {
        return None;
    }
    if t >= last.t {
        return Some(last.pos);
    }
    let offset = usize::try_from(t.checked_sub(first.t)?).ok()?;
    match path.get(offset) {
        Some(state) if state.t == t => Some(state.pos),
        // Not strictly consecutive; fall back to a scan.
        _ => path.iter().rev().find(|s| s.t <= t).map(|s| s.pos),
    }
}

/// Whether moving `a_from -> a_to` while the other agent moves
/// `b_from -> b_to` makes the two pass through each other.
pub fn is_swap(a_from: Coord, a_to: Coord, b_from: Coord, b_to: Coord) -> bool {
    a_from != b_from && a_to == b_from && b_to == a_from
}

/// The first state of `a` that `b` also occupies, looking only at time
/// steps before `current_t + window`.
pub fn first_vertex_conflict(
    a: &[SpaceTime],
    b: &[SpaceTime],
    current_t: u64,
    window: u64,
) -> Option<SpaceTime> {
    let (a_first, a_last) = (a.first()?, a.last()?);
    let b_last = b.last()?;
    let horizon = current_t.saturating_add(window);
    let end = a_last.t.max(b_last.t);
    (a_first.t..=end)
        .take_while(|&t| t < horizon)
        .find_map(|t| {
            let pos = position_at(a, t)?;
            (position_at(b, t) == Some(pos)).then_some(SpaceTime::new(pos, t))
        })
}

/// The time step at which `a` and `b` pass through each other, looking at
/// the first `prefix` aligned states of both paths.
pub fn illegal_swap(a: &[SpaceTime], b: &[SpaceTime], prefix: usize) -> Option<u64> {
    let start = a.first()?.t.max(b.first()?.t);
    let end = a.last()?.t.max(b.last()?.t);
    let steps = u64::try_from(prefix).unwrap_or(u64::MAX).saturating_sub(1);
    let stop = end.min(start.saturating_add(steps));
    (start..stop).find(|&t| {
        let next = t.saturating_add(1);
        match (
            position_at(a, t),
            position_at(a, next),
            position_at(b, t),
            position_at(b, next),
        ) {
            (Some(a_from), Some(a_to), Some(b_from), Some(b_to)) => {
                is_swap(a_from, a_to, b_from, b_to)
            }
            _ => false,
        }
    })
}

/// The conflict that should drive negotiation between `a` and `b`: a swap
/// governs when it happens strictly before the first vertex conflict.
pub fn governing_conflict(
    a: &[SpaceTime],
    b: &[SpaceTime],
    current_t: u64,
    window: u64,
    prefix: usize,
) -> Option<Conflict> {
    let vertex = first_vertex_conflict(a, b, current_t, window);
    let swap = illegal_swap(a, b, prefix);
    match (vertex, swap) {
        (Some(v), Some(t)) if t < v.t => swap_conflict(a, t),
        (None, Some(t)) => swap_conflict(a, t),
        (Some(v), _) => Some(Conflict {
            state: v,
            kind: ConflictKind::Vertex,
        }),
        (None, None) => None,
    }
}

fn swap_conflict(a: &[SpaceTime], t: u64) -> Option<Conflict> {
    position_at(a, t).map(|pos| Conflict {
        state: SpaceTime::new(pos, t),
        kind: ConflictKind::Swap,
    })
}
