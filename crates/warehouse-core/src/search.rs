//! Nearest-target lookup over the entity registry.

use std::collections::HashMap;

use warehouse_index::{NearestIndex, UniformGridIndex};

use crate::entity::{Entity, EntityId, EntityKind, EntityStore};
use crate::error::WorldError;
use crate::grid::{Cell, Grid};

/// Entity kinds robots ever search for.
const TARGET_KINDS: [EntityKind; 2] = [EntityKind::Parcel, EntityKind::Shelf];

/// Closest on-grid entity of `kind` accepted by `accept`.
///
/// Scans in registration order and keeps the strict minimum, so the earliest registered
/// entity wins at equal distance. Entities without a grid position are skipped.
pub fn find_closest_object(
    entities: &EntityStore,
    grid: &Grid,
    origin: Cell,
    kind: EntityKind,
    radius: Option<u32>,
    accept: &mut dyn FnMut(EntityId, &Entity) -> bool,
) -> Option<EntityId> {
    let mut best: Option<(u32, EntityId)> = None;
    for (id, entity) in entities.iter_kind(kind) {
        let Some(position) = grid.position_of(id) else {
            continue;
        };
        if !accept(id, entity) {
            continue;
        }
        let distance = origin.manhattan(position);
        if radius.is_some_and(|limit| distance > limit) {
            continue;
        }
        if best.is_none_or(|(closest, _)| distance < closest) {
            best = Some((distance, id));
        }
    }
    best.map(|(_, id)| id)
}

/// Bucket grids for the searchable kinds, kept in step with grid placement.
#[derive(Debug)]
pub struct KindBuckets {
    buckets: HashMap<EntityKind, UniformGridIndex<EntityId>>,
}

impl KindBuckets {
    pub fn new(cell_size: u32, width: u32, height: u32) -> Result<Self, WorldError> {
        let mut buckets = HashMap::with_capacity(TARGET_KINDS.len());
        for kind in TARGET_KINDS {
            buckets.insert(kind, UniformGridIndex::new(cell_size, width, height)?);
        }
        Ok(Self { buckets })
    }

    /// Track an entity that was just placed. Non-target kinds are ignored.
    pub fn insert(
        &mut self,
        kind: EntityKind,
        rank: usize,
        cell: Cell,
        id: EntityId,
    ) -> Result<(), WorldError> {
        if let Some(index) = self.buckets.get_mut(&kind) {
            index.insert(rank, cell.x, cell.y, id)?;
        }
        Ok(())
    }

    /// Forget an entity that left `cell`.
    pub fn remove(&mut self, kind: EntityKind, cell: Cell, id: EntityId) -> bool {
        self.buckets
            .get_mut(&kind)
            .is_some_and(|index| index.remove(cell.x, cell.y, &id))
    }

    /// Same contract as [`find_closest_object`], answered from the buckets.
    pub fn find_closest(
        &self,
        entities: &EntityStore,
        origin: Cell,
        kind: EntityKind,
        radius: Option<u32>,
        accept: &mut dyn FnMut(EntityId, &Entity) -> bool,
    ) -> Option<EntityId> {
        let index = self.buckets.get(&kind)?;
        index
            .nearest_within(origin.x, origin.y, radius, &mut |&id| {
                entities.get(id).is_some_and(|entity| accept(id, entity))
            })
            .map(|hit| hit.item)
    }
}

/// Registry scan or bucket lookup, chosen once per world.
#[derive(Debug)]
pub enum TargetFinder {
    Registry,
    Bucketed(KindBuckets),
}

impl TargetFinder {
    pub fn find(
        &self,
        entities: &EntityStore,
        grid: &Grid,
        origin: Cell,
        kind: EntityKind,
        radius: Option<u32>,
        accept: &mut dyn FnMut(EntityId, &Entity) -> bool,
    ) -> Option<EntityId> {
        match self {
            Self::Registry => find_closest_object(entities, grid, origin, kind, radius, accept),
            Self::Bucketed(buckets) => buckets.find_closest(entities, origin, kind, radius, accept),
        }
    }

    pub(crate) fn track(
        &mut self,
        kind: EntityKind,
        rank: usize,
        cell: Cell,
        id: EntityId,
    ) -> Result<(), WorldError> {
        match self {
            Self::Registry => Ok(()),
            Self::Bucketed(buckets) => buckets.insert(kind, rank, cell, id),
        }
    }

    pub(crate) fn untrack(&mut self, kind: EntityKind, cell: Cell, id: EntityId) {
        if let Self::Bucketed(buckets) = self {
            buckets.remove(kind, cell, id);
        }
    }
}
