//! A single occupancy snapshot of the world.
//!
//! [`Grid`] stores one [`CellValue`] per cell in row-major order plus an
//! index of where every agent stands. It is used both for the committed
//! world history and for each agent's partial model of the world.

use std::collections::BTreeMap;

use parley_types::{AgentId, CellValue, Coord, ObstacleKind};
use serde::{Deserialize, Serialize};

use crate::error::WorldError;

/// A rectangular occupancy grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    /// Number of columns.
    width: u32,
    /// Number of rows.
    height: u32,
    /// Row-major cell values, `width * height` long.
    cells: Vec<CellValue>,
    /// Agent id to the cell it stands on.
    agents: BTreeMap<AgentId, Coord>,
}

impl Grid {
    /// Create an empty grid.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidDimensions`] if either dimension is zero
    /// or the cell count does not fit in memory.
    pub fn new(width: u32, height: u32) -> Result<Self, WorldError> {
        let invalid = WorldError::InvalidDimensions { width, height };
        if width == 0 || height == 0 {
            return Err(invalid);
        }
        let count = usize::try_from(width)
            .ok()
            .zip(usize::try_from(height).ok())
            .and_then(|(w, h)| w.checked_mul(h))
            .ok_or(invalid)?;
        Ok(Self {
            width,
            height,
            cells: vec![CellValue::Empty; count],
            agents: BTreeMap::new(),
        })
    }

    /// Build an agent's model grid from its known cells. Coordinates outside
    /// the grid are ignored.
    pub fn from_known(
        width: u32,
        height: u32,
        known: &BTreeMap<Coord, CellValue>,
    ) -> Result<Self, WorldError> {
        let mut grid = Self::new(width, height)?;
        grid.reset_from_known(known);
        Ok(grid)
    }

    /// Overwrite this grid with known cells, keeping its dimensions.
    pub fn reset_from_known(&mut self, known: &BTreeMap<Coord, CellValue>) {
        self.cells.fill(CellValue::Empty);
        self.agents.clear();
        for (&coord, &value) in known {
            let Some(slot) = self.index(coord).and_then(|i| self.cells.get_mut(i)) else {
                continue;
            };
            *slot = value;
            if let Some(id) = value.agent() {
                self.agents.insert(id, coord);
            }
        }
    }

    /// Number of columns.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Whether the coordinate lies on the grid.
    pub const fn within_bounds(&self, coord: Coord) -> bool {
        coord.x < self.width && coord.y < self.height
    }

    fn index(&self, coord: Coord) -> Option<usize> {
        if !self.within_bounds(coord) {
            return None;
        }
        let x = usize::try_from(coord.x).ok()?;
        let y = usize::try_from(coord.y).ok()?;
        let w = usize::try_from(self.width).ok()?;
        y.checked_mul(w)?.checked_add(x)
    }

    fn set(&mut self, coord: Coord, value: CellValue) -> Result<(), WorldError> {
        let slot = self
            .index(coord)
            .and_then(|i| self.cells.get_mut(i))
            .ok_or(WorldError::OutOfBounds(coord))?;
        *slot = value;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// The value of a cell, `None` when out of bounds.
    pub fn cell(&self, coord: Coord) -> Option<CellValue> {
        self.index(coord).and_then(|i| self.cells.get(i)).copied()
    }

    /// Whether the cell holds an obstacle of either kind.
    pub fn is_obstacle(&self, coord: Coord) -> bool {
        self.cell(coord).is_some_and(CellValue::is_obstacle)
    }

    /// Whether the cell is in bounds and empty.
    pub fn is_empty(&self, coord: Coord) -> bool {
        self.cell(coord).is_some_and(CellValue::is_empty)
    }

    /// Where an agent stands.
    pub fn find_agent(&self, id: AgentId) -> Option<Coord> {
        self.agents.get(&id).copied()
    }

    /// All agent positions.
    pub const fn agent_positions(&self) -> &BTreeMap<AgentId, Coord> {
        &self.agents
    }

    /// In-bounds 4-neighbours in the order left, right, up, down.
    pub fn neighbours(&self, coord: Coord) -> impl Iterator<Item = Coord> + use<> {
        let (w, h) = (self.width, self.height);
        let candidates = [
            coord.x.checked_sub(1).map(|x| Coord::new(x, coord.y)),
            coord.x.checked_add(1).map(|x| Coord::new(x, coord.y)),
            coord.y.checked_sub(1).map(|y| Coord::new(coord.x, y)),
            coord.y.checked_add(1).map(|y| Coord::new(coord.x, y)),
        ];
        candidates
            .into_iter()
            .flatten()
            .filter(move |c| c.x < w && c.y < h)
    }

    /// Every cell with its coordinate, row by row.
    pub fn cells(&self) -> impl Iterator<Item = (Coord, CellValue)> + '_ {
        let w = self.width;
        (0..self.height)
            .flat_map(move |y| (0..w).map(move |x| Coord::new(x, y)))
            .zip(self.cells.iter().copied())
    }

    /// What an observer at `centre` can see: every cell within Chebyshev
    /// distance `radius`, plus every permanent obstacle on the grid.
    pub fn visible_from(&self, centre: Coord, radius: u32) -> BTreeMap<Coord, CellValue> {
        let mut visible: BTreeMap<Coord, CellValue> = self
            .cells()
            .filter(|(_, v)| matches!(v, CellValue::PermanentObstacle))
            .collect();
        let max_x = self.width.saturating_sub(1);
        let max_y = self.height.saturating_sub(1);
        for y in centre.y.saturating_sub(radius)..=centre.y.saturating_add(radius).min(max_y) {
            for x in centre.x.saturating_sub(radius)..=centre.x.saturating_add(radius).min(max_x) {
                let coord = Coord::new(x, y);
                if let Some(value) = self.cell(coord) {
                    visible.insert(coord, value);
                }
            }
        }
        visible
    }

    // -------------------------------------------------------------------
    // Edits
    // -------------------------------------------------------------------

    /// Place an obstacle on an empty cell.
    pub fn add_obstacle(&mut self, coord: Coord, kind: ObstacleKind) -> Result<(), WorldError> {
        match self.cell(coord) {
            None => Err(WorldError::OutOfBounds(coord)),
            Some(CellValue::Empty) => self.set(coord, kind.into()),
            Some(_) => Err(WorldError::CellOccupied(coord)),
        }
    }

    /// Remove an obstacle, returning what was there.
    pub fn remove_obstacle(&mut self, coord: Coord) -> Result<CellValue, WorldError> {
        match self.cell(coord) {
            None => Err(WorldError::OutOfBounds(coord)),
            Some(value) if value.is_obstacle() => {
                self.set(coord, CellValue::Empty)?;
                Ok(value)
            }
            Some(_) => Err(WorldError::NoObstacle(coord)),
        }
    }

    /// Place a new agent on an empty cell.
    pub fn add_agent(&mut self, id: AgentId, coord: Coord) -> Result<(), WorldError> {
        if !id.is_valid() {
            return Err(WorldError::InvalidAgentId(id));
        }
        if self.agents.contains_key(&id) {
            return Err(WorldError::DuplicateAgent(id));
        }
        match self.cell(coord) {
            None => Err(WorldError::OutOfBounds(coord)),
            Some(CellValue::Empty) => {
                self.set(coord, CellValue::Agent(id))?;
                self.agents.insert(id, coord);
                Ok(())
            }
            Some(_) => Err(WorldError::CellOccupied(coord)),
        }
    }

    /// Take an agent off the grid, returning where it stood.
    pub fn remove_agent(&mut self, id: AgentId) -> Result<Coord, WorldError> {
        let coord = self.agents.remove(&id).ok_or(WorldError::AgentNotFound(id))?;
        if self.cell(coord) == Some(CellValue::Agent(id)) {
            self.set(coord, CellValue::Empty)?;
        }
        Ok(coord)
    }

    /// Move an agent. The previous cell is cleared only if the agent is
    /// still recorded there; another agent may already have stepped in.
    pub fn move_agent(&mut self, id: AgentId, to: Coord) -> Result<(), WorldError> {
        let from = self.find_agent(id).ok_or(WorldError::AgentNotFound(id))?;
        if !self.within_bounds(to) {
            return Err(WorldError::OutOfBounds(to));
        }
        if from != to && self.cell(from) == Some(CellValue::Agent(id)) {
            self.set(from, CellValue::Empty)?;
        }
        self.set(to, CellValue::Agent(id))?;
        self.agents.insert(id, to);
        Ok(())
    }

    /// Clear whatever occupies a cell.
    pub fn erase(&mut self, coord: Coord) -> Result<CellValue, WorldError> {
        let value = self.cell(coord).ok_or(WorldError::OutOfBounds(coord))?;
        match value {
            CellValue::Agent(id) => {
                self.remove_agent(id)?;
            }
            CellValue::Empty => {}
            CellValue::PermanentObstacle | CellValue::TemporaryObstacle => {
                self.set(coord, CellValue::Empty)?;
            }
        }
        Ok(value)
    }
}
