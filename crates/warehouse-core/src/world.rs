//! World ownership, bootstrap, the tick pipeline, and read-only observation.

use rand::seq::IndexedRandom;
use rand::{Rng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info, trace, warn};

use crate::Tick;
use crate::config::{TargetSearch, WarehouseConfig};
use crate::entity::{
    Entity, EntityId, EntityKind, EntityStore, Obstacle, ObstacleSnapshot, Parcel,
    ParcelSnapshot, Robot, RobotSnapshot, Shelf, ShelfSnapshot,
};
use crate::error::{GridError, WorldError};
use crate::grid::{Cell, Grid, Topology};
use crate::robot::{self, Perception, RobotAction};
use crate::scheduler::RandomActivation;
use crate::search::{KindBuckets, TargetFinder};
use crate::stats::{NullObserver, TickEvents, TickObserver, TickSummary};

/// How a bounded run ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunOutcome {
    /// Ticks executed by this call.
    pub ticks: u64,
    /// Whether every box ended up stacked.
    pub finished: bool,
}

/// Build a populated world from positional parameters and default settings.
///
/// Shelves and obstacles use the caller's coordinates, skipping any that are out of range
/// or already occupied; robots and boxes go to random free cells.
pub fn create_world(
    width: u32,
    height: u32,
    num_robots: usize,
    num_boxes: usize,
    shelf_positions: Vec<Cell>,
    obstacle_groups: Vec<Vec<Cell>>,
    topology: Topology,
) -> Result<World, WorldError> {
    World::new(WarehouseConfig {
        width,
        height,
        num_robots,
        num_boxes,
        shelf_positions,
        obstacle_groups,
        topology,
        ..WarehouseConfig::default()
    })
}

/// Owns the grid, every entity, and the random stream.
pub struct World {
    config: WarehouseConfig,
    tick: Tick,
    running: bool,
    rng: SmallRng,
    grid: Grid,
    entities: EntityStore,
    scheduler: RandomActivation,
    finder: TargetFinder,
    observer: Box<dyn TickObserver>,
    history: VecDeque<TickSummary>,
    num_boxes: usize,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("config", &self.config)
            .field("tick", &self.tick)
            .field("running", &self.running)
            .field("entity_count", &self.entities.len())
            .field("num_boxes", &self.num_boxes)
            .finish()
    }
}

impl World {
    /// Validate `config` and populate a world from its layout.
    pub fn new(config: WarehouseConfig) -> Result<Self, WorldError> {
        Self::with_observer(config, Box::new(NullObserver))
    }

    /// Like [`World::new`], forwarding every tick summary to `observer`.
    pub fn with_observer(
        config: WarehouseConfig,
        observer: Box<dyn TickObserver>,
    ) -> Result<Self, WorldError> {
        let mut world = Self::blank_with_observer(config, observer)?;
        world.populate()?;
        info!(
            width = world.grid.width(),
            height = world.grid.height(),
            topology = ?world.grid.topology(),
            robots = world.robots().count(),
            shelves = world.shelves().count(),
            obstacles = world.obstacles().count(),
            boxes = world.num_boxes,
            "Warehouse world created",
        );
        Ok(world)
    }

    /// Validate `config` but place nothing; the layout fields are not applied.
    ///
    /// Entities are then added with the `spawn_*` methods.
    pub fn blank(config: WarehouseConfig) -> Result<Self, WorldError> {
        Self::blank_with_observer(config, Box::new(NullObserver))
    }

    fn blank_with_observer(
        config: WarehouseConfig,
        observer: Box<dyn TickObserver>,
    ) -> Result<Self, WorldError> {
        config.validate()?;
        let grid = Grid::new(config.width, config.height, config.topology)?;
        let finder = match config.target_search {
            TargetSearch::Registry => TargetFinder::Registry,
            TargetSearch::Bucketed { cell_size } => {
                TargetFinder::Bucketed(KindBuckets::new(cell_size, config.width, config.height)?)
            }
        };
        let rng = config.seeded_rng();
        let history = VecDeque::with_capacity(config.history_capacity);
        Ok(Self {
            config,
            tick: Tick::zero(),
            running: true,
            rng,
            grid,
            entities: EntityStore::new(),
            scheduler: RandomActivation::new(),
            finder,
            observer,
            history,
            num_boxes: 0,
        })
    }

    fn populate(&mut self) -> Result<(), WorldError> {
        let shelf_height = self.config.shelf_max_height;
        for cell in self.config.shelf_positions.clone() {
            if !self.fixed_cell_free(cell) {
                debug!(%cell, "skipping shelf on unavailable cell");
                continue;
            }
            self.spawn_shelf(cell, shelf_height)?;
        }

        for (group, cells) in self.config.obstacle_groups.clone().into_iter().enumerate() {
            for cell in cells {
                if !self.fixed_cell_free(cell) {
                    debug!(%cell, group, "skipping obstacle on unavailable cell");
                    continue;
                }
                self.spawn_obstacle(cell, group as u32)?;
            }
        }

        let excluded = |entity: &Entity| {
            matches!(
                entity,
                Entity::Shelf(_) | Entity::Robot(_) | Entity::Obstacle(_)
            )
        };
        for _ in 0..self.config.num_robots {
            let cell = self.random_cell_without(excluded)?;
            self.spawn_robot(cell)?;
        }
        for _ in 0..self.config.num_boxes {
            let cell = self.random_cell_without(excluded)?;
            self.spawn_parcel(cell)?;
        }

        let capacity: u64 = self.shelves().map(|shelf| u64::from(shelf.max_height)).sum();
        if capacity < self.num_boxes as u64 {
            warn!(
                capacity,
                boxes = self.num_boxes,
                "shelf capacity is below the box count; the run cannot finish"
            );
        }
        Ok(())
    }

    /// Inside the extent (never wrapped) and holding nothing.
    fn fixed_cell_free(&self, cell: Cell) -> bool {
        self.grid.in_extent(cell) && matches!(self.grid.is_cell_empty(cell), Ok(true))
    }

    fn cell_has(&self, cell: Cell, mut pred: impl FnMut(&Entity) -> bool) -> Result<bool, WorldError> {
        Ok(self
            .grid
            .cell_contents(cell)?
            .iter()
            .any(|&id| self.entities.get(id).is_some_and(&mut pred)))
    }

    /// Re-roll random cells until one holds nothing `excluded`, then fall back to a uniform
    /// pick among every qualifying cell.
    fn random_cell_without(
        &mut self,
        excluded: impl Fn(&Entity) -> bool + Copy,
    ) -> Result<Cell, WorldError> {
        for _ in 0..self.config.placement_attempts {
            let x = self.rng.random_range(0..self.grid.width()) as i32;
            let y = self.rng.random_range(0..self.grid.height()) as i32;
            let cell = Cell::new(x, y);
            if !self.cell_has(cell, excluded)? {
                return Ok(cell);
            }
        }
        let mut free = Vec::new();
        for cell in self.grid.cells() {
            if !self.cell_has(cell, excluded)? {
                free.push(cell);
            }
        }
        free.choose(&mut self.rng)
            .copied()
            .ok_or(WorldError::InvalidConfig(
                "no free cell left for random placement",
            ))
    }

    fn register(&mut self, entity: Entity, cell: Cell) -> Result<EntityId, WorldError> {
        let cell = self
            .grid
            .normalize(cell)
            .ok_or(GridError::OutOfBounds(cell))?;
        let kind = entity.kind();
        let id = self.entities.insert(entity);
        self.grid.place(id, cell)?;
        let rank = self.entities.rank(id).unwrap_or_default();
        self.finder.track(kind, rank, cell, id)?;
        if kind == EntityKind::Parcel {
            self.num_boxes += 1;
        }
        trace!(?id, ?kind, %cell, "registered entity");
        Ok(id)
    }

    fn normalized(&self, cell: Cell) -> Result<Cell, WorldError> {
        Ok(self
            .grid
            .normalize(cell)
            .ok_or(GridError::OutOfBounds(cell))?)
    }

    /// Add a shelf at `cell`. Fails if another shelf already stands there.
    pub fn spawn_shelf(&mut self, cell: Cell, max_height: u32) -> Result<EntityId, WorldError> {
        if max_height == 0 {
            return Err(WorldError::InvalidConfig("shelf max_height must be positive"));
        }
        let cell = self.normalized(cell)?;
        if self.cell_has(cell, |entity| matches!(entity, Entity::Shelf(_)))? {
            return Err(WorldError::Occupied(cell));
        }
        self.register(Entity::Shelf(Shelf::new(max_height)), cell)
    }

    /// Add an obstacle at `cell`. Fails if a robot or obstacle is already there.
    pub fn spawn_obstacle(&mut self, cell: Cell, group_id: u32) -> Result<EntityId, WorldError> {
        let cell = self.normalized(cell)?;
        if self.cell_has(cell, Entity::blocks_movement)? {
            return Err(WorldError::Occupied(cell));
        }
        self.register(Entity::Obstacle(Obstacle::new(group_id)), cell)
    }

    /// Add an idle robot at `cell`. Fails if a robot or obstacle is already there.
    pub fn spawn_robot(&mut self, cell: Cell) -> Result<EntityId, WorldError> {
        let cell = self.normalized(cell)?;
        if self.cell_has(cell, Entity::blocks_movement)? {
            return Err(WorldError::Occupied(cell));
        }
        self.register(Entity::Robot(Robot::default()), cell)
    }

    /// Add an unstacked box at `cell`.
    pub fn spawn_parcel(&mut self, cell: Cell) -> Result<EntityId, WorldError> {
        let cell = self.normalized(cell)?;
        self.register(Entity::Parcel(Parcel::default()), cell)
    }

    /// Execute one tick: record statistics, activate everyone once in a fresh random
    /// order, then run the termination check.
    pub fn step(&mut self) -> Result<TickEvents, WorldError> {
        if !self.running {
            return Err(WorldError::Finished);
        }
        let next_tick = self.tick.next();
        self.record_summary(next_tick);

        let order = self
            .scheduler
            .plan(self.entities.order(), &mut self.rng)
            .to_vec();
        let mut events = TickEvents {
            tick: next_tick,
            ..TickEvents::default()
        };
        for id in order {
            self.activate(id, &mut events)?;
        }
        self.tick = next_tick;

        let stacked = self.total_stacked();
        if stacked >= self.num_boxes as u64 {
            self.running = false;
            events.finished = true;
            info!(
                tick = next_tick.0,
                stacked,
                movements = self.total_movements(),
                "All boxes stacked; simulation finished"
            );
        }
        Ok(events)
    }

    /// Step until finished or `max_ticks` ticks have run.
    pub fn run(&mut self, max_ticks: u64) -> Result<RunOutcome, WorldError> {
        let mut ticks = 0;
        while self.running && ticks < max_ticks {
            self.step()?;
            ticks += 1;
        }
        Ok(RunOutcome {
            ticks,
            finished: !self.running,
        })
    }

    fn activate(&mut self, id: EntityId, events: &mut TickEvents) -> Result<(), WorldError> {
        let robot = match self.entities.get(id) {
            Some(Entity::Robot(robot)) => *robot,
            Some(_) => return Ok(()),
            None => {
                return Err(WorldError::Consistency(format!(
                    "scheduled entity {id:?} is not registered"
                )));
            }
        };
        let view = Perception {
            grid: &self.grid,
            entities: &self.entities,
            finder: &self.finder,
            policy: self.config.retrieval_policy,
            vision_radius: self.config.vision_radius,
        };
        let action = robot::decide(id, &robot, &view, &mut self.rng)?;
        trace!(?id, ?action, "robot decided");
        match action {
            RobotAction::PickUp { parcel } => {
                self.pick_up(id, parcel)?;
                events.pickups += 1;
            }
            RobotAction::Place { shelf } => {
                self.place(id, shelf)?;
                events.placements += 1;
            }
            RobotAction::Move { to, .. } => {
                self.move_robot(id, to)?;
                events.moves += 1;
            }
            RobotAction::Stay => events.idle += 1,
        }
        Ok(())
    }

    fn robot_cell(&self, id: EntityId) -> Result<Cell, WorldError> {
        self.grid
            .position_of(id)
            .ok_or_else(|| WorldError::Consistency(format!("robot {id:?} is off the grid")))
    }

    fn pick_up(&mut self, robot_id: EntityId, parcel: EntityId) -> Result<(), WorldError> {
        let at = self.robot_cell(robot_id)?;
        let lying_here = self.grid.position_of(parcel) == Some(at)
            && self
                .entities
                .get(parcel)
                .and_then(Entity::as_parcel)
                .is_some_and(|p| !p.is_stacked());
        let hands_free = self
            .entities
            .get(robot_id)
            .and_then(Entity::as_robot)
            .is_some_and(|r| !r.carrying_box());
        if !lying_here || !hands_free {
            return Err(WorldError::Consistency(format!(
                "robot {robot_id:?} cannot pick up {parcel:?} at {at}"
            )));
        }
        let cell = self.grid.remove(parcel)?;
        self.finder.untrack(EntityKind::Parcel, cell, parcel);
        if let Some(robot) = self.entities.robot_mut(robot_id) {
            robot.take(parcel);
        }
        debug!(robot = ?robot_id, ?parcel, %cell, "picked up box");
        Ok(())
    }

    fn place(&mut self, robot_id: EntityId, shelf_id: EntityId) -> Result<(), WorldError> {
        let at = self.robot_cell(robot_id)?;
        let shelf_cell = self.grid.position_of(shelf_id);
        let eligible = shelf_cell == Some(at)
            && self
                .entities
                .get(shelf_id)
                .and_then(Entity::as_shelf)
                .is_some_and(Shelf::has_room)
            && !self.cell_has(at, |entity| matches!(entity, Entity::Obstacle(_)))?;
        let carried = self
            .entities
            .get(robot_id)
            .and_then(Entity::as_robot)
            .and_then(Robot::carried);
        let Some(parcel) = carried.filter(|_| eligible) else {
            return Err(WorldError::Consistency(format!(
                "robot {robot_id:?} cannot place on shelf {shelf_id:?} at {at}"
            )));
        };
        if let Some(shelf) = self.entities.shelf_mut(shelf_id)
            && !shelf.push()
        {
            return Err(WorldError::Consistency(format!(
                "shelf {shelf_id:?} overflowed"
            )));
        }
        if let Some(stacked) = self.entities.parcel_mut(parcel) {
            stacked.stack_on(shelf_id);
        }
        if let Some(robot) = self.entities.robot_mut(robot_id) {
            robot.release();
        }
        debug!(robot = ?robot_id, shelf = ?shelf_id, %at, "placed box");
        Ok(())
    }

    fn move_robot(&mut self, robot_id: EntityId, to: Cell) -> Result<(), WorldError> {
        let from = self.robot_cell(robot_id)?;
        let adjacent = self.grid.neighbors4(from).contains(&to);
        if !adjacent || self.cell_has(to, Entity::blocks_movement)? {
            return Err(WorldError::Consistency(format!(
                "robot {robot_id:?} cannot move from {from} to {to}"
            )));
        }
        self.grid.move_entity(robot_id, to)?;
        if let Some(robot) = self.entities.robot_mut(robot_id) {
            robot.record_move();
        }
        Ok(())
    }

    fn record_summary(&mut self, tick: Tick) {
        let summary = TickSummary {
            tick,
            total_movements: self.total_movements(),
            boxes_stacked: self.total_stacked(),
            robots_carrying: self.robots().filter(|robot| robot.carrying_box).count(),
            boxes_remaining: self
                .parcels()
                .filter(|parcel| parcel.position.is_some())
                .count(),
        };
        self.observer.on_tick(&summary);
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary);
    }

    /// Re-derive every engine invariant from live state.
    pub fn check_invariants(&self) -> Result<(), WorldError> {
        let fail = |message: String| -> Result<(), WorldError> {
            Err(WorldError::Consistency(message))
        };

        for shelf in self.shelves() {
            if shelf.stack_height > shelf.max_height {
                return fail(format!("shelf {:?} exceeds its capacity", shelf.id));
            }
        }

        for cell in self.grid.cells() {
            let blockers = self
                .grid
                .cell_contents(cell)?
                .iter()
                .filter(|&&id| self.entities.get(id).is_some_and(Entity::blocks_movement))
                .count();
            if blockers > 1 {
                return fail(format!("cell {cell} holds {blockers} robots/obstacles"));
            }
        }

        let mut carried = Vec::new();
        for (id, entity) in self.entities.iter_kind(EntityKind::Robot) {
            if self.grid.position_of(id).is_none() {
                return fail(format!("robot {id:?} is off the grid"));
            }
            if let Some(parcel) = entity.as_robot().and_then(Robot::carried) {
                if carried.contains(&parcel) {
                    return fail(format!("box {parcel:?} carried twice"));
                }
                carried.push(parcel);
            }
        }

        let mut stacked = 0u64;
        for parcel in self.parcels() {
            let held = carried.contains(&parcel.id);
            let consistent = match (parcel.is_stacked, parcel.position, held) {
                (true, None, false) => parcel.shelf.is_some(),
                (false, Some(_), false) | (false, None, true) => true,
                _ => false,
            };
            if !consistent {
                return fail(format!("box {:?} is in an impossible state", parcel.id));
            }
            stacked += u64::from(parcel.is_stacked);
        }
        if stacked != self.total_stacked() {
            return fail(format!(
                "{stacked} boxes stacked but shelves report {}",
                self.total_stacked()
            ));
        }
        Ok(())
    }

    /// Replace the tick observer.
    pub fn set_observer(&mut self, observer: Box<dyn TickObserver>) {
        self.observer = observer;
    }

    #[must_use]
    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Ticks executed so far.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// False once every box is stacked.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Boxes registered in this world.
    #[must_use]
    pub const fn num_boxes(&self) -> usize {
        self.num_boxes
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[must_use]
    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    /// Iterate over retained tick summaries.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }

    /// Sum of robot movements, recomputed from live state.
    #[must_use]
    pub fn total_movements(&self) -> u64 {
        self.robots().map(|robot| robot.movements_made).sum()
    }

    /// Sum of shelf heights, recomputed from live state.
    #[must_use]
    pub fn total_stacked(&self) -> u64 {
        self.shelves().map(|shelf| u64::from(shelf.stack_height)).sum()
    }

    /// Snapshot of one robot.
    #[must_use]
    pub fn robot(&self, id: EntityId) -> Option<RobotSnapshot> {
        let robot = self.entities.get(id)?.as_robot()?;
        Some(RobotSnapshot {
            id,
            position: self.grid.position_of(id)?,
            carrying_box: robot.carrying_box(),
            movements_made: robot.movements_made(),
            state: robot.state(),
        })
    }

    /// Snapshot of one shelf.
    #[must_use]
    pub fn shelf(&self, id: EntityId) -> Option<ShelfSnapshot> {
        let shelf = self.entities.get(id)?.as_shelf()?;
        Some(ShelfSnapshot {
            id,
            position: self.grid.position_of(id)?,
            stack_height: shelf.stack_height(),
            max_height: shelf.max_height(),
        })
    }

    /// Snapshot of one box.
    #[must_use]
    pub fn parcel(&self, id: EntityId) -> Option<ParcelSnapshot> {
        let parcel = self.entities.get(id)?.as_parcel()?;
        Some(ParcelSnapshot {
            id,
            position: self.grid.position_of(id),
            is_stacked: parcel.is_stacked(),
            shelf: parcel.shelf(),
        })
    }

    /// Robots in registration order.
    pub fn robots(&self) -> impl Iterator<Item = RobotSnapshot> + '_ {
        self.entities
            .iter_kind(EntityKind::Robot)
            .filter_map(|(id, _)| self.robot(id))
    }

    /// Shelves in registration order.
    pub fn shelves(&self) -> impl Iterator<Item = ShelfSnapshot> + '_ {
        self.entities
            .iter_kind(EntityKind::Shelf)
            .filter_map(|(id, _)| self.shelf(id))
    }

    /// Boxes in registration order.
    pub fn parcels(&self) -> impl Iterator<Item = ParcelSnapshot> + '_ {
        self.entities
            .iter_kind(EntityKind::Parcel)
            .filter_map(|(id, _)| self.parcel(id))
    }

    /// Obstacles in registration order.
    pub fn obstacles(&self) -> impl Iterator<Item = ObstacleSnapshot> + '_ {
        self.entities
            .iter_kind(EntityKind::Obstacle)
            .filter_map(|(id, entity)| match entity {
                Entity::Obstacle(obstacle) => Some(ObstacleSnapshot {
                    id,
                    position: self.grid.position_of(id)?,
                    group_id: obstacle.group_id(),
                }),
                _ => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalPolicy;
    use std::sync::{Arc, Mutex};

    fn blank(width: u32, height: u32, topology: Topology) -> World {
        World::blank(WarehouseConfig {
            width,
            height,
            topology,
            num_robots: 0,
            num_boxes: 0,
            rng_seed: Some(17),
            ..WarehouseConfig::default()
        })
        .expect("world")
    }

    #[test]
    fn bootstrap_places_requested_counts() {
        let config = WarehouseConfig {
            rng_seed: Some(42),
            obstacle_groups: vec![vec![Cell::new(5, 5), Cell::new(5, 6)], vec![Cell::new(12, 3)]],
            ..WarehouseConfig::default()
        };
        let world = World::new(config).expect("world");
        assert_eq!(world.robots().count(), 5);
        assert_eq!(world.shelves().count(), 5);
        assert_eq!(world.parcels().count(), 20);
        assert_eq!(world.num_boxes(), 20);
        let groups: Vec<u32> = world.obstacles().map(|o| o.group_id).collect();
        assert_eq!(groups, vec![0, 0, 1]);
        assert!(world.is_running());
        world.check_invariants().expect("invariants");

        let shelf_cells: Vec<Cell> = world.shelves().map(|s| s.position).collect();
        for robot in world.robots() {
            assert!(!shelf_cells.contains(&robot.position));
        }
        for parcel in world.parcels() {
            let cell = parcel.position.expect("on the floor");
            assert!(!shelf_cells.contains(&cell));
        }
    }

    #[test]
    fn fixed_positions_skip_out_of_range_and_occupied() {
        let world = create_world(
            6,
            6,
            0,
            0,
            vec![Cell::new(1, 1), Cell::new(1, 1), Cell::new(6, 0), Cell::new(-1, 2)],
            vec![vec![Cell::new(1, 1), Cell::new(3, 3), Cell::new(3, 3), Cell::new(9, 9)]],
            Topology::Toroidal,
        )
        .expect("world");
        assert_eq!(world.shelves().count(), 1);
        let obstacles: Vec<Cell> = world.obstacles().map(|o| o.position).collect();
        assert_eq!(obstacles, vec![Cell::new(3, 3)]);
    }

    #[test]
    fn invalid_dimensions_are_fatal() {
        let err = create_world(0, 5, 1, 1, Vec::new(), Vec::new(), Topology::Bounded).unwrap_err();
        assert!(matches!(err, WorldError::InvalidConfig(_)));
    }

    #[test]
    fn impossible_placement_is_a_configuration_error() {
        let config = WarehouseConfig {
            width: 2,
            height: 1,
            num_robots: 1,
            num_boxes: 1,
            shelf_positions: vec![Cell::new(0, 0)],
            obstacle_groups: vec![vec![Cell::new(1, 0)]],
            rng_seed: Some(1),
            placement_attempts: 4,
            ..WarehouseConfig::default()
        };
        let err = World::new(config).unwrap_err();
        assert!(matches!(
            err,
            WorldError::InvalidConfig("no free cell left for random placement")
        ));
    }

    #[test]
    fn explicit_spawns_enforce_exclusion() {
        let mut world = blank(4, 4, Topology::Bounded);
        let cell = Cell::new(1, 1);
        world.spawn_robot(cell).expect("robot");
        assert!(matches!(world.spawn_robot(cell), Err(WorldError::Occupied(c)) if c == cell));
        assert!(matches!(world.spawn_obstacle(cell, 0), Err(WorldError::Occupied(_))));
        world.spawn_shelf(cell, 2).expect("shelf under robot");
        assert!(matches!(world.spawn_shelf(cell, 2), Err(WorldError::Occupied(_))));
        world.spawn_parcel(cell).expect("box");
        assert!(matches!(
            world.spawn_parcel(Cell::new(4, 0)),
            Err(WorldError::Grid(GridError::OutOfBounds(_)))
        ));
    }

    #[test]
    fn step_refuses_after_finish() {
        let mut world = blank(3, 3, Topology::Bounded);
        world.spawn_robot(Cell::new(0, 0)).expect("robot");
        let events = world.step().expect("first tick");
        assert!(events.finished);
        assert!(!world.is_running());
        assert!(matches!(world.step(), Err(WorldError::Finished)));
        assert_eq!(world.tick(), Tick(1));
    }

    #[test]
    fn pickup_then_place_updates_bookkeeping() {
        let mut world = blank(3, 1, Topology::Bounded);
        let robot = world.spawn_robot(Cell::new(0, 0)).expect("robot");
        let parcel = world.spawn_parcel(Cell::new(0, 0)).expect("box");
        let shelf = world.spawn_shelf(Cell::new(1, 0), 1).expect("shelf");

        let first = world.step().expect("tick 1");
        assert_eq!(first.pickups, 1);
        assert_eq!(world.parcel(parcel).expect("box").position, None);
        assert!(world.robot(robot).expect("robot").carrying_box);

        let second = world.step().expect("tick 2");
        assert_eq!(second.moves, 1);
        let third = world.step().expect("tick 3");
        assert_eq!(third.placements, 1);
        assert!(third.finished);

        let snapshot = world.parcel(parcel).expect("box");
        assert!(snapshot.is_stacked);
        assert_eq!(snapshot.shelf, Some(shelf));
        assert_eq!(world.shelf(shelf).expect("shelf").stack_height, 1);
        assert_eq!(world.total_movements(), 1);
        world.check_invariants().expect("invariants");
    }

    #[test]
    fn doubled_up_robots_fail_the_audit() {
        let mut world = blank(3, 3, Topology::Bounded);
        world.spawn_robot(Cell::new(0, 0)).expect("robot");
        world.check_invariants().expect("valid world");

        let intruder = world.entities.insert(Entity::Robot(Robot::default()));
        world.grid.place(intruder, Cell::new(0, 0)).expect("place");
        assert!(matches!(
            world.check_invariants(),
            Err(WorldError::Consistency(_))
        ));
    }

    #[test]
    fn lost_box_fails_the_audit() {
        let mut world = blank(3, 3, Topology::Bounded);
        let parcel = world.spawn_parcel(Cell::new(2, 2)).expect("box");
        world.grid.remove(parcel).expect("remove");
        assert!(matches!(
            world.check_invariants(),
            Err(WorldError::Consistency(_))
        ));
    }

    #[test]
    fn move_onto_occupied_or_distant_cell_is_rejected() {
        let mut world = blank(3, 3, Topology::Bounded);
        let mover = world.spawn_robot(Cell::new(0, 0)).expect("robot");
        world.spawn_robot(Cell::new(1, 0)).expect("robot");
        world.spawn_obstacle(Cell::new(0, 1), 0).expect("obstacle");

        for target in [Cell::new(1, 0), Cell::new(0, 1), Cell::new(2, 2)] {
            assert!(matches!(
                world.move_robot(mover, target),
                Err(WorldError::Consistency(_))
            ));
        }
        let robot = world.robot(mover).expect("robot");
        assert_eq!(robot.position, Cell::new(0, 0));
        assert_eq!(robot.movements_made, 0);
        world.check_invariants().expect("state untouched");
    }

    #[test]
    fn place_and_pickup_are_validated() {
        let mut world = blank(3, 3, Topology::Bounded);
        let robot = world.spawn_robot(Cell::new(1, 1)).expect("robot");
        let shelf = world.spawn_shelf(Cell::new(1, 1), 2).expect("shelf");
        let parcel = world.spawn_parcel(Cell::new(2, 2)).expect("box");

        assert!(matches!(
            world.place(robot, shelf),
            Err(WorldError::Consistency(_))
        ));
        assert_eq!(world.shelf(shelf).expect("shelf").stack_height, 0);

        assert!(matches!(
            world.pick_up(robot, parcel),
            Err(WorldError::Consistency(_))
        ));
        assert_eq!(
            world.parcel(parcel).expect("box").position,
            Some(Cell::new(2, 2))
        );
        assert!(!world.robot(robot).expect("robot").carrying_box);
        world.check_invariants().expect("state untouched");
    }

    #[derive(Clone, Default)]
    struct SpyObserver {
        seen: Arc<Mutex<Vec<TickSummary>>>,
    }

    impl TickObserver for SpyObserver {
        fn on_tick(&mut self, summary: &TickSummary) {
            self.seen.lock().expect("lock").push(*summary);
        }
    }

    #[test]
    fn summaries_are_recorded_before_activation() {
        let spy = SpyObserver::default();
        let config = WarehouseConfig {
            width: 3,
            height: 1,
            topology: Topology::Bounded,
            num_robots: 0,
            num_boxes: 0,
            rng_seed: Some(3),
            history_capacity: 2,
            ..WarehouseConfig::default()
        };
        let mut world = World::blank(config).expect("world");
        world.set_observer(Box::new(spy.clone()));
        world.spawn_robot(Cell::new(0, 0)).expect("robot");
        world.spawn_parcel(Cell::new(0, 0)).expect("box");
        world.spawn_shelf(Cell::new(2, 0), 1).expect("shelf");

        world.run(10).expect("run");
        let seen = spy.seen.lock().expect("lock").clone();
        assert_eq!(seen[0].tick, Tick(1));
        assert_eq!(seen[0].boxes_remaining, 1);
        assert_eq!(seen[0].robots_carrying, 0);
        assert_eq!(seen[1].robots_carrying, 1);
        assert_eq!(world.history().count(), 2);
        assert_eq!(world.history().last(), seen.last());
    }

    #[test]
    fn bucketed_and_registry_worlds_match() {
        let base = WarehouseConfig {
            width: 16,
            height: 12,
            num_robots: 4,
            num_boxes: 10,
            shelf_positions: crate::config::default_shelf_positions(16, 12),
            retrieval_policy: RetrievalPolicy::SeekNearest,
            rng_seed: Some(0xC0FFEE),
            ..WarehouseConfig::default()
        };
        let bucketed = WarehouseConfig {
            target_search: TargetSearch::Bucketed { cell_size: 4 },
            ..base.clone()
        };
        let mut a = World::new(base).expect("registry world");
        let mut b = World::new(bucketed).expect("bucketed world");
        for _ in 0..200 {
            if !a.is_running() {
                break;
            }
            assert_eq!(a.step().expect("a"), b.step().expect("b"));
            let robots_a: Vec<_> = a.robots().collect();
            let robots_b: Vec<_> = b.robots().collect();
            assert_eq!(
                robots_a.iter().map(|r| (r.position, r.movements_made)).collect::<Vec<_>>(),
                robots_b.iter().map(|r| (r.position, r.movements_made)).collect::<Vec<_>>()
            );
        }
        assert_eq!(a.is_running(), b.is_running());
        assert_eq!(a.total_stacked(), b.total_stacked());
    }
}
