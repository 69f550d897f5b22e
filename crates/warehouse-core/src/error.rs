use thiserror::Error;
use warehouse_index::IndexError;

use crate::entity::EntityId;
use crate::grid::Cell;

/// Errors raised by grid queries and mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    /// Grid dimensions that cannot hold any cell or overflow `i32` coordinates.
    #[error("invalid grid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    /// A bounded grid was asked about a cell outside `[0,width) x [0,height)`.
    #[error("cell ({}, {}) is out of bounds", .0.x, .0.y)]
    OutOfBounds(Cell),
    /// The entity has no grid position.
    #[error("entity {0:?} is not placed on the grid")]
    NotPlaced(EntityId),
    /// The entity already has a grid position.
    #[error("entity {0:?} is already placed on the grid")]
    AlreadyPlaced(EntityId),
}

/// Errors that can occur when constructing or advancing a world.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("spatial index: {0}")]
    Index(#[from] IndexError),
    /// An explicit spawn targeted a cell whose occupant excludes the new entity.
    #[error("cell ({}, {}) is already occupied", .0.x, .0.y)]
    Occupied(Cell),
    /// Live state contradicts an engine invariant.
    #[error("internal consistency failure: {0}")]
    Consistency(String),
    /// The run already terminated; finished worlds do not tick.
    #[error("simulation already finished")]
    Finished,
}
