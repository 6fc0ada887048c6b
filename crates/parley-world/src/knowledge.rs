//! An agent's accumulated beliefs about the grid.
//!
//! Observations are merged cell by cell; fresher values overwrite older
//! ones and cells outside the latest observation keep their stale value.
//! An agent can only stand in one place, so a fresh sighting of an agent
//! clears every older sighting of the same agent.

use std::collections::BTreeMap;

use parley_types::{AgentId, CellValue, Coord};
use serde::{Deserialize, Serialize};

/// Coordinate to last-observed cell value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownCells {
    cells: BTreeMap<Coord, CellValue>,
}

impl KnownCells {
    /// Nothing known yet.
    pub const fn new() -> Self {
        Self {
            cells: BTreeMap::new(),
        }
    }

    /// Merge an observation. Merging the same observation twice leaves the
    /// map unchanged the second time.
    pub fn merge(&mut self, update: &BTreeMap<Coord, CellValue>) {
        let fresh: BTreeMap<AgentId, Coord> = update
            .iter()
            .filter_map(|(&coord, value)| value.agent().map(|id| (id, coord)))
            .collect();

        for (coord, value) in &mut self.cells {
            if let Some(id) = value.agent()
                && fresh.get(&id).is_some_and(|seen| seen != coord)
            {
                *value = CellValue::Empty;
            }
        }

        for (&coord, &value) in update {
            let value = match value.agent() {
                Some(id) if fresh.get(&id) != Some(&coord) => CellValue::Empty,
                _ => value,
            };
            self.cells.insert(coord, value);
        }
    }

    /// Record a single cell.
    pub fn merge_cell(&mut self, coord: Coord, value: CellValue) {
        self.merge(&BTreeMap::from([(coord, value)]));
    }

    /// The believed value of a cell.
    pub fn get(&self, coord: Coord) -> Option<CellValue> {
        self.cells.get(&coord).copied()
    }

    /// The full map.
    pub const fn as_map(&self) -> &BTreeMap<Coord, CellValue> {
        &self.cells
    }

    /// Number of known cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether nothing is known.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
