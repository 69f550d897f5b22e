//! Spatial indexing abstractions for nearest-target queries on integer grids.

use thiserror::Error;

/// Errors emitted by spatial index implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., zero cell size).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The coordinate lies outside the indexed extent.
    #[error("cell ({x}, {y}) lies outside the indexed extent")]
    OutOfBounds { x: i32, y: i32 },
}

/// Result of a nearest query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit<T> {
    pub item: T,
    /// Manhattan distance from the query cell.
    pub distance: u32,
    /// Registration order of the item; lower wins ties.
    pub order: usize,
}

/// Common behaviour exposed by nearest-target indices.
pub trait NearestIndex<T> {
    /// Register `item` at `(x, y)` with its registration order.
    fn insert(&mut self, order: usize, x: i32, y: i32, item: T) -> Result<(), IndexError>;

    /// Drop `item` previously inserted at `(x, y)`. Returns whether it was present.
    fn remove(&mut self, x: i32, y: i32, item: &T) -> bool;

    /// Closest accepted item by Manhattan distance, lowest registration order on ties.
    ///
    /// `max_distance` bounds the search radius; `None` searches the whole extent.
    fn nearest_within(
        &self,
        x: i32,
        y: i32,
        max_distance: Option<u32>,
        accept: &mut dyn FnMut(&T) -> bool,
    ) -> Option<Hit<T>>;

    /// Number of indexed items.
    fn len(&self) -> usize;

    /// Returns true when nothing is indexed.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
struct Entry<T> {
    order: usize,
    x: i32,
    y: i32,
    item: T,
}

/// Uniform bucket grid over a `width x height` cell extent.
///
/// Buckets are visited in order of their lower-bound distance to the query, so the
/// search stops as soon as no unvisited bucket can hold a closer (or equally close but
/// earlier registered) item.
#[derive(Debug, Clone)]
pub struct UniformGridIndex<T> {
    /// Edge length of each bucket in cells.
    pub cell_size: u32,
    width: u32,
    height: u32,
    buckets_x: u32,
    buckets_y: u32,
    buckets: Vec<Vec<Entry<T>>>,
    len: usize,
}

impl<T> UniformGridIndex<T> {
    /// Create an empty index covering `width x height` cells.
    pub fn new(cell_size: u32, width: u32, height: u32) -> Result<Self, IndexError> {
        if cell_size == 0 {
            return Err(IndexError::InvalidConfig("cell_size must be positive"));
        }
        if width == 0 || height == 0 {
            return Err(IndexError::InvalidConfig(
                "index extent must be non-zero",
            ));
        }
        let buckets_x = width.div_ceil(cell_size);
        let buckets_y = height.div_ceil(cell_size);
        let count = (buckets_x as usize) * (buckets_y as usize);
        let mut buckets = Vec::with_capacity(count);
        buckets.resize_with(count, Vec::new);
        Ok(Self {
            cell_size,
            width,
            height,
            buckets_x,
            buckets_y,
            buckets,
            len: 0,
        })
    }

    /// Number of buckets along each axis.
    #[must_use]
    pub const fn bucket_dims(&self) -> (u32, u32) {
        (self.buckets_x, self.buckets_y)
    }

    /// Drop every entry while keeping the bucket layout.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.len = 0;
    }

    fn bucket_of(&self, x: i32, y: i32) -> Result<usize, IndexError> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return Err(IndexError::OutOfBounds { x, y });
        }
        let bx = (x as u32 / self.cell_size) as usize;
        let by = (y as u32 / self.cell_size) as usize;
        Ok(by * self.buckets_x as usize + bx)
    }

    /// Lower bound on the Manhattan distance from `(x, y)` to any cell of `bucket`.
    fn bucket_floor(&self, bucket: usize, x: i32, y: i32) -> u32 {
        let bx = (bucket % self.buckets_x as usize) as u32;
        let by = (bucket / self.buckets_x as usize) as u32;
        let x0 = (bx * self.cell_size) as i32;
        let y0 = (by * self.cell_size) as i32;
        let x1 = (((bx + 1) * self.cell_size).min(self.width) - 1) as i32;
        let y1 = (((by + 1) * self.cell_size).min(self.height) - 1) as i32;
        axis_gap(x, x0, x1) + axis_gap(y, y0, y1)
    }
}

fn axis_gap(value: i32, low: i32, high: i32) -> u32 {
    if value < low {
        low.abs_diff(value)
    } else if value > high {
        value.abs_diff(high)
    } else {
        0
    }
}

/// Manhattan distance between two cells.
#[inline]
#[must_use]
pub fn manhattan(ax: i32, ay: i32, bx: i32, by: i32) -> u32 {
    ax.abs_diff(bx) + ay.abs_diff(by)
}

impl<T: Copy + PartialEq> NearestIndex<T> for UniformGridIndex<T> {
    fn insert(&mut self, order: usize, x: i32, y: i32, item: T) -> Result<(), IndexError> {
        let bucket = self.bucket_of(x, y)?;
        self.buckets[bucket].push(Entry { order, x, y, item });
        self.len += 1;
        Ok(())
    }

    fn remove(&mut self, x: i32, y: i32, item: &T) -> bool {
        let Ok(bucket) = self.bucket_of(x, y) else {
            return false;
        };
        let entries = &mut self.buckets[bucket];
        match entries.iter().position(|entry| entry.item == *item) {
            Some(pos) => {
                entries.remove(pos);
                self.len -= 1;
                true
            }
            None => false,
        }
    }

    fn nearest_within(
        &self,
        x: i32,
        y: i32,
        max_distance: Option<u32>,
        accept: &mut dyn FnMut(&T) -> bool,
    ) -> Option<Hit<T>> {
        let mut visit: Vec<(u32, usize)> = (0..self.buckets.len())
            .filter(|&bucket| !self.buckets[bucket].is_empty())
            .map(|bucket| (self.bucket_floor(bucket, x, y), bucket))
            .collect();
        visit.sort_unstable();

        let mut best: Option<Hit<T>> = None;
        for (floor, bucket) in visit {
            if max_distance.is_some_and(|limit| floor > limit) {
                break;
            }
            if best.as_ref().is_some_and(|hit| floor > hit.distance) {
                break;
            }
            for entry in &self.buckets[bucket] {
                let distance = manhattan(x, y, entry.x, entry.y);
                if max_distance.is_some_and(|limit| distance > limit) {
                    continue;
                }
                let closer = best
                    .as_ref()
                    .is_none_or(|hit| (distance, entry.order) < (hit.distance, hit.order));
                if closer && accept(&entry.item) {
                    best = Some(Hit {
                        item: entry.item,
                        distance,
                        order: entry.order,
                    });
                }
            }
        }
        best
    }

    fn len(&self) -> usize {
        self.len
    }
}
