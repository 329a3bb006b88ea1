//! Uniform spatial hash used as the broad phase
//!
//! The simulation bounds are divided into a grid of equally sized buckets.
//! Each bucket keeps handles to the dynamic bodies and static shapes whose
//! bounds overlap its cell. Anything outside the grid lands in a single void
//! bucket so it can still be found by queries that reach outside the bounds.
//!
//! Cell `(i, j)` covers the half-open span
//! `[origin + i * size, origin + (i + 1) * size)` on each axis. Query
//! rectangles are closed.

use planar_math::{Rect, Vec2};

use crate::body::BodyKey;
use crate::collision::StaticShapeId;

/// Upper bound on the number of cells a grid may allocate
pub const MAX_BUCKETS: u64 = 1 << 22;

/// Integer cell coordinate in the bucket grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridCoord {
    pub x: i32,
    pub y: i32,
}

impl GridCoord {
    /// Coordinate reported for the void bucket and for disabled grids
    pub const VOID: Self = Self { x: -1, y: -1 };

    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Handle to a bucket: either a grid cell (by index) or the void bucket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BucketSlot {
    Cell(usize),
    Void,
}

/// One cell of the spatial hash
///
/// Holds non-owning handles; the [`Space`](crate::Space) owns the bodies and
/// shapes they refer to.
#[derive(Clone, Debug, Default)]
pub struct SpaceBucket {
    coordinate: Option<GridCoord>,
    dynamic_bodies: Vec<BodyKey>,
    static_shapes: Vec<StaticShapeId>,
}

impl SpaceBucket {
    fn new(coordinate: Option<GridCoord>) -> Self {
        Self {
            coordinate,
            dynamic_bodies: Vec::new(),
            static_shapes: Vec::new(),
        }
    }

    /// Grid coordinate of this bucket, [`GridCoord::VOID`] for the void bucket
    pub fn coordinate(&self) -> GridCoord {
        self.coordinate.unwrap_or(GridCoord::VOID)
    }

    pub fn is_void(&self) -> bool {
        self.coordinate.is_none()
    }

    /// Dynamic bodies currently overlapping this bucket
    pub fn dynamic_bodies(&self) -> &[BodyKey] {
        &self.dynamic_bodies
    }

    /// Static shapes overlapping this bucket
    pub fn static_shapes(&self) -> &[StaticShapeId] {
        &self.static_shapes
    }

    /// Add a body handle; returns false if it was already present
    pub(crate) fn add_body(&mut self, key: BodyKey) -> bool {
        if self.dynamic_bodies.contains(&key) {
            return false;
        }
        self.dynamic_bodies.push(key);
        true
    }

    /// Remove a body handle; returns false if it was not present
    pub(crate) fn remove_body(&mut self, key: BodyKey) -> bool {
        match self.dynamic_bodies.iter().position(|&k| k == key) {
            Some(index) => {
                self.dynamic_bodies.remove(index);
                true
            }
            None => false,
        }
    }

    /// Add a static shape handle; returns false if it was already present
    pub(crate) fn add_shape(&mut self, id: StaticShapeId) -> bool {
        if self.static_shapes.contains(&id) {
            return false;
        }
        self.static_shapes.push(id);
        true
    }
}

/// The bucket grid covering the simulation bounds, plus the void bucket
#[derive(Clone, Debug)]
pub struct BucketGrid {
    origin: Vec2,
    bucket_size: Vec2,
    count: GridCoord,
    buckets: Vec<SpaceBucket>,
    void_bucket: SpaceBucket,
}

impl BucketGrid {
    /// Build a grid covering `bounds` with cells of `bucket_size`
    ///
    /// Returns `None` when the bucket size has a zero, negative or
    /// non-finite component, when the bounds are invalid, or when the grid
    /// would exceed [`MAX_BUCKETS`] cells.
    pub fn new(bounds: Rect, bucket_size: Vec2) -> Option<Self> {
        if !bucket_size.is_finite() || bucket_size.x <= 0.0 || bucket_size.y <= 0.0 {
            return None;
        }
        if !bounds.is_valid() {
            return None;
        }

        let cells = bounds.size().component_div(bucket_size).ceil();
        let count_x = (cells.x as u64).max(1);
        let count_y = (cells.y as u64).max(1);
        if count_x.saturating_mul(count_y) > MAX_BUCKETS {
            return None;
        }

        let count = GridCoord::new(count_x as i32, count_y as i32);
        let mut buckets = Vec::with_capacity((count_x * count_y) as usize);
        for y in 0..count.y {
            for x in 0..count.x {
                buckets.push(SpaceBucket::new(Some(GridCoord::new(x, y))));
            }
        }

        Some(Self {
            origin: bounds.min,
            bucket_size,
            count,
            buckets,
            void_bucket: SpaceBucket::new(None),
        })
    }

    /// Number of buckets along each axis
    pub fn bucket_count(&self) -> GridCoord {
        self.count
    }

    pub fn bucket_size(&self) -> Vec2 {
        self.bucket_size
    }

    /// Number of grid cells (the void bucket is not counted)
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// World-space rectangle covered by a cell
    pub fn cell_rect(&self, coord: GridCoord) -> Rect {
        let min = self.origin
            + Vec2::new(coord.x as f32, coord.y as f32).component_mul(self.bucket_size);
        Rect::new(min, min + self.bucket_size)
    }

    /// Cell coordinate containing a point
    ///
    /// The result may lie outside the grid; non-finite points map to
    /// [`GridCoord::VOID`].
    pub fn coordinates(&self, point: Vec2) -> GridCoord {
        if !point.is_finite() {
            return GridCoord::VOID;
        }
        let cell = (point - self.origin).component_div(self.bucket_size).floor();
        GridCoord::new(cell.x as i32, cell.y as i32)
    }

    /// Row-major index of a cell, `None` if outside the grid
    pub fn index(&self, coord: GridCoord) -> Option<usize> {
        if coord.x < 0 || coord.y < 0 || coord.x >= self.count.x || coord.y >= self.count.y {
            return None;
        }
        Some((coord.y * self.count.x + coord.x) as usize)
    }

    /// Slot for a coordinate; outside coordinates map to the void bucket
    pub fn slot(&self, coord: GridCoord) -> BucketSlot {
        match self.index(coord) {
            Some(index) => BucketSlot::Cell(index),
            None => BucketSlot::Void,
        }
    }

    pub fn bucket(&self, slot: BucketSlot) -> &SpaceBucket {
        match slot {
            BucketSlot::Cell(index) => self.buckets.get(index).unwrap_or(&self.void_bucket),
            BucketSlot::Void => &self.void_bucket,
        }
    }

    fn bucket_mut(&mut self, slot: BucketSlot) -> &mut SpaceBucket {
        match slot {
            BucketSlot::Cell(index) if index < self.buckets.len() => &mut self.buckets[index],
            _ => &mut self.void_bucket,
        }
    }

    /// Bucket at a coordinate, or the void bucket
    pub fn bucket_at(&self, coord: GridCoord) -> &SpaceBucket {
        self.bucket(self.slot(coord))
    }

    /// Bucket containing a point, or the void bucket
    pub fn bucket_by_point(&self, point: Vec2) -> &SpaceBucket {
        self.bucket_at(self.coordinates(point))
    }

    pub fn void_bucket(&self) -> &SpaceBucket {
        &self.void_bucket
    }

    /// Lazily walk the buckets overlapping `rect`
    pub fn clipped_slots(&self, rect: &Rect) -> ClippedBuckets {
        ClippedBuckets::new(self, rect)
    }

    /// Buckets overlapping `rect`, in the order of [`ClippedBuckets`]
    pub fn clipped_buckets<'a>(&'a self, rect: &Rect) -> impl Iterator<Item = &'a SpaceBucket> + 'a {
        self.clipped_slots(rect).map(move |slot| self.bucket(slot))
    }

    /// Resume a clipped walk: the bucket after `previous`, or the first when
    /// `previous` is `None`
    pub fn next_clipped(&self, rect: &Rect, previous: Option<BucketSlot>) -> Option<BucketSlot> {
        let mut walk = self.clipped_slots(rect);
        match previous {
            None => walk.next(),
            Some(previous) => {
                walk.by_ref().find(|&slot| slot == previous)?;
                walk.next()
            }
        }
    }

    /// Insert a body into every bucket its bounds overlap, recording the
    /// slots it now occupies
    pub(crate) fn insert_body(&mut self, key: BodyKey, bounds: &Rect, slots: &mut Vec<BucketSlot>) {
        for slot in self.clipped_slots(bounds) {
            if self.bucket_mut(slot).add_body(key) {
                slots.push(slot);
            }
        }
    }

    /// Remove a body from every bucket it occupies
    pub(crate) fn remove_body(&mut self, key: BodyKey, slots: &mut Vec<BucketSlot>) {
        for slot in slots.drain(..) {
            self.bucket_mut(slot).remove_body(key);
        }
    }

    /// Remove then reinsert a body for its current bounds
    pub(crate) fn relocate_body(&mut self, key: BodyKey, bounds: &Rect, slots: &mut Vec<BucketSlot>) {
        self.remove_body(key, slots);
        self.insert_body(key, bounds, slots);
    }

    /// Insert a static shape into every bucket its bounds overlap
    ///
    /// Returns the number of buckets that gained the shape.
    pub(crate) fn insert_static(&mut self, id: StaticShapeId, bounds: &Rect) -> usize {
        let mut added = 0;
        for slot in self.clipped_slots(bounds) {
            if self.bucket_mut(slot).add_shape(id) {
                added += 1;
            }
        }
        added
    }
}

/// Cursor over the buckets overlapping one query rectangle
///
/// Yields every in-grid cell the rectangle touches exactly once, in row-major
/// order, then the void bucket once if the rectangle reaches outside the grid.
/// The cursor holds no borrow of the grid, so buckets can be mutated while
/// walking.
#[derive(Clone, Debug)]
pub struct ClippedBuckets {
    columns: i32,
    min: GridCoord,
    max: GridCoord,
    next: Option<GridCoord>,
    include_void: bool,
}

impl ClippedBuckets {
    fn new(grid: &BucketGrid, rect: &Rect) -> Self {
        let mut walk = Self {
            columns: grid.count.x,
            min: GridCoord::new(0, 0),
            max: GridCoord::VOID,
            next: None,
            include_void: false,
        };
        if !rect.is_valid() {
            return walk;
        }

        let lo = grid.coordinates(rect.min);
        let hi = grid.coordinates(rect.max);
        walk.include_void =
            lo.x < 0 || lo.y < 0 || hi.x >= grid.count.x || hi.y >= grid.count.y;

        walk.min = GridCoord::new(lo.x.max(0), lo.y.max(0));
        walk.max = GridCoord::new(hi.x.min(grid.count.x - 1), hi.y.min(grid.count.y - 1));
        if walk.min.x <= walk.max.x && walk.min.y <= walk.max.y {
            walk.next = Some(walk.min);
        }
        walk
    }
}

impl Iterator for ClippedBuckets {
    type Item = BucketSlot;

    fn next(&mut self) -> Option<BucketSlot> {
        if let Some(coord) = self.next {
            self.next = if coord.x < self.max.x {
                Some(GridCoord::new(coord.x + 1, coord.y))
            } else if coord.y < self.max.y {
                Some(GridCoord::new(self.min.x, coord.y + 1))
            } else {
                None
            };
            return Some(BucketSlot::Cell((coord.y * self.columns + coord.x) as usize));
        }

        if self.include_void {
            self.include_void = false;
            return Some(BucketSlot::Void);
        }
        None
    }
}

impl std::iter::FusedIterator for ClippedBuckets {}
