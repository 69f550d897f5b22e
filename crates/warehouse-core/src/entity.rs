//! Entity variants and the registration-ordered registry that owns them.

use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap, new_key_type};

use crate::grid::Cell;

new_key_type! {
    /// Stable handle for entities backed by a generational slot map.
    pub struct EntityId;
}

/// Default capacity of a shelf.
pub const DEFAULT_SHELF_HEIGHT: u32 = 5;

/// Discriminant of [`Entity`], used to key searches and indices.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Parcel,
    Shelf,
    Obstacle,
    Robot,
}

/// A box waiting on the floor, riding on a robot, or stacked on a shelf.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Parcel {
    is_stacked: bool,
    shelf: Option<EntityId>,
}

impl Parcel {
    #[must_use]
    pub const fn is_stacked(&self) -> bool {
        self.is_stacked
    }

    /// Shelf the parcel was stacked on.
    #[must_use]
    pub const fn shelf(&self) -> Option<EntityId> {
        self.shelf
    }

    pub(crate) fn stack_on(&mut self, shelf: EntityId) {
        self.is_stacked = true;
        self.shelf = Some(shelf);
    }
}

/// Fixed storage location with bounded capacity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Shelf {
    stack_height: u32,
    max_height: u32,
}

impl Default for Shelf {
    fn default() -> Self {
        Self::new(DEFAULT_SHELF_HEIGHT)
    }
}

impl Shelf {
    #[must_use]
    pub const fn new(max_height: u32) -> Self {
        Self {
            stack_height: 0,
            max_height,
        }
    }

    #[must_use]
    pub const fn stack_height(&self) -> u32 {
        self.stack_height
    }

    #[must_use]
    pub const fn max_height(&self) -> u32 {
        self.max_height
    }

    #[must_use]
    pub const fn has_room(&self) -> bool {
        self.stack_height < self.max_height
    }

    /// Add one box. Returns false, leaving the height untouched, when full.
    pub(crate) fn push(&mut self) -> bool {
        if !self.has_room() {
            return false;
        }
        self.stack_height += 1;
        true
    }
}

/// Static blocker. `group_id` only labels which configured group it came from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Obstacle {
    group_id: u32,
}

impl Obstacle {
    #[must_use]
    pub const fn new(group_id: u32) -> Self {
        Self { group_id }
    }

    #[must_use]
    pub const fn group_id(&self) -> u32 {
        self.group_id
    }
}

/// Phase of a robot, a pure function of whether it carries a box.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RobotState {
    Retrieving,
    Stacking,
}

/// The only active entity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Robot {
    carrying: Option<EntityId>,
    movements_made: u64,
}

impl Robot {
    #[must_use]
    pub const fn carrying_box(&self) -> bool {
        self.carrying.is_some()
    }

    /// The parcel currently held.
    #[must_use]
    pub const fn carried(&self) -> Option<EntityId> {
        self.carrying
    }

    #[must_use]
    pub const fn movements_made(&self) -> u64 {
        self.movements_made
    }

    /// Derived from `carrying_box`; never stored.
    #[must_use]
    pub const fn state(&self) -> RobotState {
        if self.carrying_box() {
            RobotState::Stacking
        } else {
            RobotState::Retrieving
        }
    }

    pub(crate) fn take(&mut self, parcel: EntityId) {
        self.carrying = Some(parcel);
    }

    pub(crate) fn release(&mut self) -> Option<EntityId> {
        self.carrying.take()
    }

    pub(crate) fn record_move(&mut self) {
        self.movements_made += 1;
    }
}

/// Closed set of things that live in a warehouse.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Entity {
    Parcel(Parcel),
    Shelf(Shelf),
    Obstacle(Obstacle),
    Robot(Robot),
}

impl Entity {
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Parcel(_) => EntityKind::Parcel,
            Self::Shelf(_) => EntityKind::Shelf,
            Self::Obstacle(_) => EntityKind::Obstacle,
            Self::Robot(_) => EntityKind::Robot,
        }
    }

    /// Robots and obstacles exclude each other from a cell.
    #[must_use]
    pub const fn blocks_movement(&self) -> bool {
        matches!(self, Self::Robot(_) | Self::Obstacle(_))
    }

    #[must_use]
    pub const fn as_parcel(&self) -> Option<&Parcel> {
        match self {
            Self::Parcel(parcel) => Some(parcel),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_shelf(&self) -> Option<&Shelf> {
        match self {
            Self::Shelf(shelf) => Some(shelf),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_robot(&self) -> Option<&Robot> {
        match self {
            Self::Robot(robot) => Some(robot),
            _ => None,
        }
    }
}

/// Owns every entity and remembers the order in which they were registered.
#[derive(Debug, Default)]
pub struct EntityStore {
    slots: SlotMap<EntityId, Entity>,
    order: Vec<EntityId>,
    rank: SecondaryMap<EntityId, usize>,
}

impl EntityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new entity and return its handle.
    pub fn insert(&mut self, entity: Entity) -> EntityId {
        let id = self.slots.insert(entity);
        self.rank.insert(id, self.order.len());
        self.order.push(id);
        id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slots.get(id)
    }

    /// Registration index of `id`; lower means registered earlier.
    #[must_use]
    pub fn rank(&self, id: EntityId) -> Option<usize> {
        self.rank.get(id).copied()
    }

    /// Handles in registration order.
    #[must_use]
    pub fn order(&self) -> &[EntityId] {
        &self.order
    }

    /// Entities in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
        self.order.iter().map(|&id| (id, &self.slots[id]))
    }

    /// Entities of one kind in registration order.
    pub fn iter_kind(&self, kind: EntityKind) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
        self.iter().filter(move |(_, entity)| entity.kind() == kind)
    }

    pub(crate) fn robot_mut(&mut self, id: EntityId) -> Option<&mut Robot> {
        match self.slots.get_mut(id)? {
            Entity::Robot(robot) => Some(robot),
            _ => None,
        }
    }

    pub(crate) fn shelf_mut(&mut self, id: EntityId) -> Option<&mut Shelf> {
        match self.slots.get_mut(id)? {
            Entity::Shelf(shelf) => Some(shelf),
            _ => None,
        }
    }

    pub(crate) fn parcel_mut(&mut self, id: EntityId) -> Option<&mut Parcel> {
        match self.slots.get_mut(id)? {
            Entity::Parcel(parcel) => Some(parcel),
            _ => None,
        }
    }
}

/// Read-only view of a robot for reporting layers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RobotSnapshot {
    pub id: EntityId,
    pub position: Cell,
    pub carrying_box: bool,
    pub movements_made: u64,
    pub state: RobotState,
}

/// Read-only view of a shelf for reporting layers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShelfSnapshot {
    pub id: EntityId,
    pub position: Cell,
    pub stack_height: u32,
    pub max_height: u32,
}

/// Read-only view of a box. `position` is `None` once a robot picked it up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParcelSnapshot {
    pub id: EntityId,
    pub position: Option<Cell>,
    pub is_stacked: bool,
    pub shelf: Option<EntityId>,
}

/// Read-only view of an obstacle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObstacleSnapshot {
    pub id: EntityId,
    pub position: Cell,
    pub group_id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_preserves_registration_order() {
        let mut store = EntityStore::new();
        let shelf = store.insert(Entity::Shelf(Shelf::new(2)));
        let robot = store.insert(Entity::Robot(Robot::default()));
        let parcel = store.insert(Entity::Parcel(Parcel::default()));
        assert_eq!(store.order(), &[shelf, robot, parcel]);
        assert_eq!(store.rank(robot), Some(1));
        let robots: Vec<_> = store.iter_kind(EntityKind::Robot).map(|(id, _)| id).collect();
        assert_eq!(robots, vec![robot]);
        assert!(store.robot_mut(shelf).is_none());
    }

    #[test]
    fn shelf_push_stops_at_capacity() {
        let mut shelf = Shelf::new(2);
        assert!(shelf.push());
        assert!(shelf.push());
        assert!(!shelf.push());
        assert_eq!(shelf.stack_height(), 2);
        assert!(!shelf.has_room());
    }

    #[test]
    fn robot_state_tracks_carried_box() {
        let mut store = EntityStore::new();
        let parcel = store.insert(Entity::Parcel(Parcel::default()));
        let mut robot = Robot::default();
        assert_eq!(robot.state(), RobotState::Retrieving);
        robot.take(parcel);
        assert!(robot.carrying_box());
        assert_eq!(robot.state(), RobotState::Stacking);
        assert_eq!(robot.release(), Some(parcel));
        assert_eq!(robot.state(), RobotState::Retrieving);
    }

    #[test]
    fn blocking_kinds() {
        assert!(Entity::Robot(Robot::default()).blocks_movement());
        assert!(Entity::Obstacle(Obstacle::new(3)).blocks_movement());
        assert!(!Entity::Shelf(Shelf::default()).blocks_movement());
        assert!(!Entity::Parcel(Parcel::default()).blocks_movement());
    }
}
