use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};

use crate::entity::DEFAULT_SHELF_HEIGHT;
use crate::error::WorldError;
use crate::grid::{Cell, Topology};

/// Largest grid, in cells, a world will allocate.
pub const MAX_GRID_CELLS: u64 = 1 << 22;

/// How a robot that carries nothing looks for work.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalPolicy {
    /// Roam randomly and pick up whatever is underfoot.
    #[default]
    Explore,
    /// Step greedily toward the nearest unstacked box on the floor.
    SeekNearest,
}

/// Backing structure for nearest-target searches.
///
/// Both variants return the same target: closest by Manhattan distance, earliest
/// registered on ties.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TargetSearch {
    /// Scan the whole entity registry.
    #[default]
    Registry,
    /// Query per-kind bucket grids with buckets of `cell_size x cell_size` cells.
    Bucketed { cell_size: u32 },
}

/// Static configuration for a warehouse world.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WarehouseConfig {
    /// Grid width in cells.
    pub width: u32,
    /// Grid height in cells.
    pub height: u32,
    /// Robots placed at random free cells.
    pub num_robots: usize,
    /// Boxes placed at random free cells.
    pub num_boxes: usize,
    /// Fixed shelf cells; out-of-range or occupied entries are skipped.
    pub shelf_positions: Vec<Cell>,
    /// Fixed obstacle cells, one list per group; out-of-range or occupied entries are skipped.
    pub obstacle_groups: Vec<Vec<Cell>>,
    pub topology: Topology,
    /// Capacity of every configured shelf.
    pub shelf_max_height: u32,
    /// Optional RNG seed for reproducible worlds.
    pub rng_seed: Option<u64>,
    pub retrieval_policy: RetrievalPolicy,
    pub target_search: TargetSearch,
    /// Manhattan radius robots can see targets within; `None` means the whole grid.
    pub vision_radius: Option<u32>,
    /// Maximum number of recent tick summaries retained in-memory.
    pub history_capacity: usize,
    /// Random re-rolls tried per spawn before falling back to enumerating free cells.
    pub placement_attempts: u32,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let (width, height) = (20, 20);
        Self {
            width,
            height,
            num_robots: 5,
            num_boxes: 20,
            shelf_positions: default_shelf_positions(width, height),
            obstacle_groups: Vec::new(),
            topology: Topology::Toroidal,
            shelf_max_height: DEFAULT_SHELF_HEIGHT,
            rng_seed: None,
            retrieval_policy: RetrievalPolicy::default(),
            target_search: TargetSearch::default(),
            vision_radius: None,
            history_capacity: 512,
            placement_attempts: 1_000,
        }
    }
}

/// Corner-ish and centre shelves: `(2,2)`, `(w-3,2)`, `(2,h-3)`, `(w-3,h-3)`, `(w/2,h/2)`.
#[must_use]
pub fn default_shelf_positions(width: u32, height: u32) -> Vec<Cell> {
    let (w, h) = (width as i32, height as i32);
    vec![
        Cell::new(2, 2),
        Cell::new(w - 3, 2),
        Cell::new(2, h - 3),
        Cell::new(w - 3, h - 3),
        Cell::new(w / 2, h / 2),
    ]
}

impl WarehouseConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), WorldError> {
        if self.width == 0 || self.height == 0 {
            return Err(WorldError::InvalidConfig(
                "grid dimensions must be non-zero",
            ));
        }
        if self.width > i32::MAX as u32 || self.height > i32::MAX as u32 {
            return Err(WorldError::InvalidConfig(
                "grid dimensions must fit in i32 coordinates",
            ));
        }
        if self.shelf_max_height == 0 {
            return Err(WorldError::InvalidConfig(
                "shelf_max_height must be positive",
            ));
        }
        if self.history_capacity == 0 {
            return Err(WorldError::InvalidConfig(
                "history_capacity must be positive",
            ));
        }
        if self.placement_attempts == 0 {
            return Err(WorldError::InvalidConfig(
                "placement_attempts must be positive",
            ));
        }
        if let TargetSearch::Bucketed { cell_size: 0 } = self.target_search {
            return Err(WorldError::InvalidConfig(
                "bucketed search cell_size must be positive",
            ));
        }
        let cells = u64::from(self.width)
            .checked_mul(u64::from(self.height))
            .filter(|&cells| cells <= MAX_GRID_CELLS)
            .ok_or(WorldError::InvalidConfig(
                "grid exceeds the maximum cell count",
            ))?;
        if self.num_robots as u64 > cells {
            return Err(WorldError::InvalidConfig(
                "more robots than grid cells",
            ));
        }
        Ok(())
    }

    /// Returns the configured RNG seed, generating one from entropy if absent.
    pub(crate) fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_matches_twenty_by_twenty() {
        let config = WarehouseConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.shelf_positions,
            vec![
                Cell::new(2, 2),
                Cell::new(17, 2),
                Cell::new(2, 17),
                Cell::new(17, 17),
                Cell::new(10, 10)
            ]
        );
        assert_eq!(config.shelf_max_height, 5);
    }

    #[test]
    fn rejects_bad_values() {
        let zero = WarehouseConfig {
            width: 0,
            ..WarehouseConfig::default()
        };
        assert!(matches!(
            zero.validate(),
            Err(WorldError::InvalidConfig("grid dimensions must be non-zero"))
        ));

        let crowded = WarehouseConfig {
            width: 2,
            height: 2,
            num_robots: 5,
            ..WarehouseConfig::default()
        };
        assert!(matches!(
            crowded.validate(),
            Err(WorldError::InvalidConfig("more robots than grid cells"))
        ));

        let huge = WarehouseConfig {
            width: 70_000,
            height: 70_000,
            ..WarehouseConfig::default()
        };
        assert!(matches!(
            huge.validate(),
            Err(WorldError::InvalidConfig("grid exceeds the maximum cell count"))
        ));
        let widest = WarehouseConfig {
            width: 4_096,
            height: 1_024,
            ..WarehouseConfig::default()
        };
        assert!(widest.validate().is_ok());

        let bucket = WarehouseConfig {
            target_search: TargetSearch::Bucketed { cell_size: 0 },
            ..WarehouseConfig::default()
        };
        assert!(bucket.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: WarehouseConfig = serde_json::from_str(
            r#"{
                "width": 8,
                "height": 6,
                "topology": "bounded",
                "retrieval_policy": "seek_nearest",
                "target_search": { "kind": "bucketed", "cell_size": 3 },
                "shelf_positions": [{ "x": 1, "y": 1 }]
            }"#,
        )
        .expect("config");
        assert_eq!(config.width, 8);
        assert_eq!(config.topology, Topology::Bounded);
        assert_eq!(config.retrieval_policy, RetrievalPolicy::SeekNearest);
        assert_eq!(config.target_search, TargetSearch::Bucketed { cell_size: 3 });
        assert_eq!(config.num_robots, 5);
        assert_eq!(config.shelf_positions, vec![Cell::new(1, 1)]);
    }
}
