//! Per-tick robot decisions: target choice, greedy stepping, and the random fallback.
//!
//! Decisions are computed against a read-only [`Perception`] of the world and returned
//! as a [`RobotAction`]; the world applies the action afterwards and re-validates it.

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::config::RetrievalPolicy;
use crate::entity::{Entity, EntityId, EntityKind, EntityStore, Robot, RobotState};
use crate::error::WorldError;
use crate::grid::{Cell, Grid};
use crate::search::TargetFinder;

/// What a robot does with its turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RobotAction {
    /// Lift the parcel lying on the robot's cell.
    PickUp { parcel: EntityId },
    /// Put the carried parcel on the shelf at the robot's cell.
    Place { shelf: EntityId },
    /// Step to an adjacent free cell.
    Move { to: Cell, reason: MoveReason },
    /// No legal action this tick.
    Stay,
}

/// Why a move was chosen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MoveReason {
    /// Greedy step toward a target.
    Directed,
    /// Exploration, or the fallback when no directed step is legal.
    Random,
}

/// Read-only view a robot decides against.
pub struct Perception<'a> {
    pub grid: &'a Grid,
    pub entities: &'a EntityStore,
    pub finder: &'a TargetFinder,
    pub policy: RetrievalPolicy,
    pub vision_radius: Option<u32>,
}

impl Perception<'_> {
    /// A cell robots may enter: inside the topology and free of robots and obstacles.
    #[must_use]
    pub fn is_cell_available(&self, cell: Cell) -> bool {
        match self.grid.cell_contents(cell) {
            Ok(contents) => !contents.iter().any(|&id| {
                self.entities
                    .get(id)
                    .is_some_and(Entity::blocks_movement)
            }),
            Err(_) => false,
        }
    }

    fn first_in_cell<F>(&self, cell: Cell, mut pick: F) -> Result<Option<EntityId>, WorldError>
    where
        F: FnMut(&Entity) -> bool,
    {
        let contents = self.grid.cell_contents(cell)?;
        Ok(contents
            .iter()
            .copied()
            .find(|&id| self.entities.get(id).is_some_and(&mut pick)))
    }

    fn has_obstacle(&self, cell: Cell) -> Result<bool, WorldError> {
        Ok(self
            .first_in_cell(cell, |entity| matches!(entity, Entity::Obstacle(_)))?
            .is_some())
    }

    /// A shelf with room whose cell holds no obstacle.
    pub fn is_eligible_shelf(&self, id: EntityId) -> bool {
        let has_room = self
            .entities
            .get(id)
            .and_then(Entity::as_shelf)
            .is_some_and(|shelf| shelf.has_room());
        has_room
            && self
                .grid
                .position_of(id)
                .is_some_and(|cell| matches!(self.has_obstacle(cell), Ok(false)))
    }

    fn closest(
        &self,
        origin: Cell,
        kind: EntityKind,
        accept: &mut dyn FnMut(EntityId, &Entity) -> bool,
    ) -> Option<Cell> {
        let id = self.finder.find(
            self.entities,
            self.grid,
            origin,
            kind,
            self.vision_radius,
            accept,
        )?;
        self.grid.position_of(id)
    }
}

/// Decide the action for robot `id` this tick.
pub fn decide<R: Rng + ?Sized>(
    id: EntityId,
    robot: &Robot,
    view: &Perception<'_>,
    rng: &mut R,
) -> Result<RobotAction, WorldError> {
    let position = view
        .grid
        .position_of(id)
        .ok_or_else(|| WorldError::Consistency(format!("robot {id:?} has no position")))?;
    match robot.state() {
        RobotState::Retrieving => retrieve(position, view, rng),
        RobotState::Stacking => stack(position, view, rng),
    }
}

fn retrieve<R: Rng + ?Sized>(
    position: Cell,
    view: &Perception<'_>,
    rng: &mut R,
) -> Result<RobotAction, WorldError> {
    let underfoot = view.first_in_cell(position, |entity| {
        entity.as_parcel().is_some_and(|parcel| !parcel.is_stacked())
    })?;
    if let Some(parcel) = underfoot {
        return Ok(RobotAction::PickUp { parcel });
    }

    match view.policy {
        RetrievalPolicy::Explore => Ok(random_move(position, view, rng)),
        RetrievalPolicy::SeekNearest => {
            let target = view.closest(position, EntityKind::Parcel, &mut |_, entity| {
                entity.as_parcel().is_some_and(|parcel| !parcel.is_stacked())
            });
            Ok(match target {
                Some(target) => move_towards(position, target, view, rng),
                None => random_move(position, view, rng),
            })
        }
    }
}

fn stack<R: Rng + ?Sized>(
    position: Cell,
    view: &Perception<'_>,
    rng: &mut R,
) -> Result<RobotAction, WorldError> {
    let shelf = view.first_in_cell(position, |entity| matches!(entity, Entity::Shelf(_)))?;
    if let Some(shelf) = shelf
        && view.is_eligible_shelf(shelf)
    {
        return Ok(RobotAction::Place { shelf });
    }

    let target = view.closest(position, EntityKind::Shelf, &mut |id, _| {
        view.is_eligible_shelf(id)
    });
    Ok(match target {
        Some(target) => move_towards(position, target, view, rng),
        None => random_move(position, view, rng),
    })
}

/// Greedy step: horizontal first, then vertical; random move when both are blocked.
pub fn move_towards<R: Rng + ?Sized>(
    position: Cell,
    target: Cell,
    view: &Perception<'_>,
    rng: &mut R,
) -> RobotAction {
    let dx = (target.x - position.x).signum();
    let dy = (target.y - position.y).signum();
    let candidates = [
        (dx != 0).then(|| position.offset(dx, 0)),
        (dy != 0).then(|| position.offset(0, dy)),
    ];
    for candidate in candidates.into_iter().flatten() {
        if let Some(next) = view.grid.normalize(candidate)
            && view.is_cell_available(next)
        {
            return RobotAction::Move {
                to: next,
                reason: MoveReason::Directed,
            };
        }
    }
    random_move(position, view, rng)
}

/// Uniform choice among free orthogonal neighbours; stays put when boxed in.
pub fn random_move<R: Rng + ?Sized>(
    position: Cell,
    view: &Perception<'_>,
    rng: &mut R,
) -> RobotAction {
    let free: Vec<Cell> = view
        .grid
        .neighbors4(position)
        .into_iter()
        .filter(|&cell| view.is_cell_available(cell))
        .collect();
    match free.choose(rng) {
        Some(&to) => RobotAction::Move {
            to,
            reason: MoveReason::Random,
        },
        None => RobotAction::Stay,
    }
}
