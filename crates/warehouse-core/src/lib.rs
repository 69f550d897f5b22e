//! Core types and the tick engine for the warehouse robots simulation.
//!
//! A [`World`] owns a grid of cells, the entities living on it (robots, boxes, shelves,
//! obstacles), and a seeded random stream. Each [`World::step`] activates every entity
//! once in a freshly shuffled order; robots fetch boxes and stack them onto shelves until
//! every box is stacked.

use serde::{Deserialize, Serialize};

pub mod config;
pub mod entity;
pub mod error;
pub mod grid;
pub mod robot;
pub mod scheduler;
pub mod search;
pub mod stats;
pub mod world;

pub use config::{
    MAX_GRID_CELLS, RetrievalPolicy, TargetSearch, WarehouseConfig, default_shelf_positions,
};
pub use entity::{
    DEFAULT_SHELF_HEIGHT, Entity, EntityId, EntityKind, EntityStore, Obstacle, ObstacleSnapshot,
    Parcel, ParcelSnapshot, Robot, RobotSnapshot, RobotState, Shelf, ShelfSnapshot,
};
pub use error::{GridError, WorldError};
pub use grid::{Cell, Grid, Topology};
pub use robot::{MoveReason, Perception, RobotAction};
pub use scheduler::RandomActivation;
pub use search::{KindBuckets, TargetFinder, find_closest_object};
pub use stats::{NullObserver, TickEvents, TickObserver, TickSummary};
pub use world::{RunOutcome, World, create_world};

/// Simulation tick counter.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}
