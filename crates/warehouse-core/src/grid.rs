//! Multi-occupancy cell grid with bounded or toroidal topology.

use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use std::fmt;

use crate::entity::EntityId;
use crate::error::GridError;

/// Integer grid coordinate.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance `|dx| + |dy|`, never wrapped.
    #[must_use]
    pub const fn manhattan(self, other: Cell) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl From<(i32, i32)> for Cell {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Edge behaviour of the grid, fixed for the lifetime of a world.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Cells outside the extent do not exist.
    Bounded,
    /// Coordinates wrap modulo width/height.
    #[default]
    Toroidal,
}

/// Up, down, left, right.
const ORTHOGONAL: [(i32, i32); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];

/// Cell space mapping entities to positions. Each cell keeps its occupants in arrival order.
#[derive(Debug, Clone)]
pub struct Grid {
    width: u32,
    height: u32,
    topology: Topology,
    cells: Vec<Vec<EntityId>>,
    locations: SecondaryMap<EntityId, Cell>,
}

impl Grid {
    pub fn new(width: u32, height: u32, topology: Topology) -> Result<Self, GridError> {
        if width == 0 || height == 0 || width > i32::MAX as u32 || height > i32::MAX as u32 {
            return Err(GridError::InvalidDimensions { width, height });
        }
        let mut cells = Vec::new();
        cells.resize_with((width as usize) * (height as usize), Vec::new);
        Ok(Self {
            width,
            height,
            topology,
            cells,
            locations: SecondaryMap::new(),
        })
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub const fn topology(&self) -> Topology {
        self.topology
    }

    /// Map `cell` into the grid: wrapped when toroidal, `None` when bounded and outside.
    #[must_use]
    pub fn normalize(&self, cell: Cell) -> Option<Cell> {
        match self.topology {
            Topology::Bounded => self.in_extent(cell).then_some(cell),
            Topology::Toroidal => Some(Cell {
                x: cell.x.rem_euclid(self.width as i32),
                y: cell.y.rem_euclid(self.height as i32),
            }),
        }
    }

    /// Whether `cell` lies inside `[0,width) x [0,height)` without wrapping.
    #[must_use]
    pub fn in_extent(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as u32) < self.width && (cell.y as u32) < self.height
    }

    fn slot(&self, cell: Cell) -> Result<usize, GridError> {
        let cell = self.normalize(cell).ok_or(GridError::OutOfBounds(cell))?;
        Ok((cell.y as usize) * (self.width as usize) + (cell.x as usize))
    }

    /// Entities at `cell`, in arrival order.
    pub fn cell_contents(&self, cell: Cell) -> Result<&[EntityId], GridError> {
        let slot = self.slot(cell)?;
        Ok(&self.cells[slot])
    }

    /// Whether nothing occupies `cell`.
    pub fn is_cell_empty(&self, cell: Cell) -> Result<bool, GridError> {
        Ok(self.cell_contents(cell)?.is_empty())
    }

    /// The orthogonal neighbours of `cell` (up, down, left, right).
    ///
    /// Toroidal grids wrap and drop duplicates on narrow extents; bounded grids omit
    /// cells outside the extent.
    #[must_use]
    pub fn neighbors4(&self, cell: Cell) -> Vec<Cell> {
        let mut neighbors = Vec::with_capacity(ORTHOGONAL.len());
        for (dx, dy) in ORTHOGONAL {
            if let Some(next) = self.normalize(cell.offset(dx, dy))
                && next != cell
                && !neighbors.contains(&next)
            {
                neighbors.push(next);
            }
        }
        neighbors
    }

    /// Current position of `id`, if placed.
    #[must_use]
    pub fn position_of(&self, id: EntityId) -> Option<Cell> {
        self.locations.get(id).copied()
    }

    /// Put an unplaced entity on `cell`.
    pub fn place(&mut self, id: EntityId, cell: Cell) -> Result<Cell, GridError> {
        if self.locations.contains_key(id) {
            return Err(GridError::AlreadyPlaced(id));
        }
        let slot = self.slot(cell)?;
        let cell = self.cell_at(slot);
        self.cells[slot].push(id);
        self.locations.insert(id, cell);
        Ok(cell)
    }

    /// Take `id` off the grid, returning the cell it occupied.
    pub fn remove(&mut self, id: EntityId) -> Result<Cell, GridError> {
        let cell = self.locations.remove(id).ok_or(GridError::NotPlaced(id))?;
        let slot = self.slot(cell)?;
        self.cells[slot].retain(|&occupant| occupant != id);
        Ok(cell)
    }

    /// Relocate `id` to `cell`, returning the previous cell.
    ///
    /// The destination is validated before the source is touched, so a failed move
    /// leaves the entity where it was.
    pub fn move_entity(&mut self, id: EntityId, cell: Cell) -> Result<Cell, GridError> {
        let from = self.position_of(id).ok_or(GridError::NotPlaced(id))?;
        let to_slot = self.slot(cell)?;
        let from_slot = self.slot(from)?;
        let to = self.cell_at(to_slot);
        self.cells[from_slot].retain(|&occupant| occupant != id);
        self.cells[to_slot].push(id);
        self.locations.insert(id, to);
        Ok(from)
    }

    /// Iterate over every cell of the extent in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.cells.len()).map(|slot| self.cell_at(slot))
    }

    fn cell_at(&self, slot: usize) -> Cell {
        let width = self.width as usize;
        Cell::new((slot % width) as i32, (slot / width) as i32)
    }
}
