//! The simulation space: registration, per-frame update and queries

use planar_math::{Rect, Vec2};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::body::{Body, BodyKey};
use crate::bucket::{BucketGrid, BucketSlot, ClippedBuckets, GridCoord, SpaceBucket};
use crate::collision::{bounds_contact, shape_contact, Collision, CollisionLayer, Hit, StaticShapeId};
use crate::dynamic_body::DynamicBody;
use crate::shapes::Shape;

/// Upper bound on the substeps a single frame may run
pub const MAX_SUBSTEPS: u32 = 1000;

/// How a frame's motion is spread over its substeps
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstepMode {
    /// Apply the full velocity once on the first substep, then re-test and
    /// re-resolve at that position on every remaining substep
    #[default]
    Aggregate,
    /// Apply `velocity / substeps` on every substep, testing after each move
    Integrate,
}

/// Configuration for a [`Space`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    /// Maximum passes of the overlap-fix step
    pub precision: u8,
    /// Absolute rectangle of the simulation
    pub bounds: Rect,
    /// Substep fraction of a frame, in (0, 1]
    pub time_step: f32,
    /// Gravity added to velocity each frame
    pub gravity: Vec2,
    /// Fraction of velocity removed each frame
    pub dampening: f32,
    /// Penetration-correction distance
    pub slop: f32,
    /// Use the spatial hash instead of testing everything against everything
    pub use_buckets: bool,
    /// Size of one bucket
    pub bucket_size: Vec2,
    pub substep_mode: SubstepMode,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            precision: 5,
            bounds: Rect::from_xywh(0.0, 0.0, 1200.0, 720.0),
            time_step: 0.1,
            gravity: Vec2::ZERO,
            dampening: 0.0,
            slop: 0.1,
            use_buckets: true,
            bucket_size: Vec2::splat(64.0),
            substep_mode: SubstepMode::Aggregate,
        }
    }
}

impl SpaceConfig {
    /// Create a config for the given bounds with default parameters
    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds,
            ..Self::default()
        }
    }

    pub fn with_precision(mut self, precision: u8) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_time_step(mut self, time_step: f32) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_dampening(mut self, dampening: f32) -> Self {
        self.dampening = dampening;
        self
    }

    pub fn with_slop(mut self, slop: f32) -> Self {
        self.slop = slop;
        self
    }

    /// Enable the spatial hash with the given bucket size
    pub fn with_buckets(mut self, bucket_size: Vec2) -> Self {
        self.use_buckets = true;
        self.bucket_size = bucket_size;
        self
    }

    /// Disable the spatial hash (linear scan)
    pub fn without_buckets(mut self) -> Self {
        self.use_buckets = false;
        self
    }

    pub fn with_substep_mode(mut self, substep_mode: SubstepMode) -> Self {
        self.substep_mode = substep_mode;
        self
    }

    /// Replace unusable values with working ones, logging each fix
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();

        if !self.bounds.is_valid() {
            log::warn!("Space bounds {:?} are invalid, using {:?}", self.bounds, defaults.bounds);
            self.bounds = defaults.bounds;
        }
        if !(self.time_step.is_finite() && self.time_step > 0.0 && self.time_step <= 1.0) {
            log::warn!(
                "Space time step {} is outside (0, 1], using {}",
                self.time_step,
                defaults.time_step
            );
            self.time_step = defaults.time_step;
        }
        let min_time_step = 1.0 / MAX_SUBSTEPS as f32;
        if self.time_step < min_time_step {
            log::warn!(
                "Space time step {} needs more than {} substeps, using {}",
                self.time_step,
                MAX_SUBSTEPS,
                min_time_step
            );
            self.time_step = min_time_step;
        }
        if !self.gravity.is_finite() {
            log::warn!("Space gravity {:?} is not finite, disabling gravity", self.gravity);
            self.gravity = Vec2::ZERO;
        }
        if !(0.0..=1.0).contains(&self.dampening) {
            log::warn!("Space dampening {} is outside [0, 1], clamping", self.dampening);
            self.dampening = if self.dampening.is_nan() { 0.0 } else { self.dampening.clamp(0.0, 1.0) };
        }
        if !(self.slop.is_finite() && self.slop >= 0.0) {
            log::warn!("Space slop {} is invalid, using {}", self.slop, defaults.slop);
            self.slop = defaults.slop;
        }
        self
    }
}

/// Outcome of [`Space::fix_overlaps`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlapFix {
    /// Resolution passes actually performed
    pub passes: u8,
    /// Whether no overlaps remain
    pub resolved: bool,
}

/// Counters describing the work the space has done
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpaceStats {
    /// Frames simulated
    pub frames: u64,
    /// Body-vs-body shape tests performed
    pub narrow_phase_tests: u64,
    /// Body-vs-static shape tests performed
    pub static_tests: u64,
    /// Collisions recorded during substeps
    pub collisions: u64,
    /// Overlap-fix resolution passes performed
    pub overlap_passes: u64,
}

/// Work counted by one collision sweep
#[derive(Clone, Copy, Default)]
struct TestCounts {
    pairs: u64,
    statics: u64,
}

/// The collision and rigid-body simulation
///
/// Owns the registered bodies, copies of the static geometry and the bucket
/// grid. Registration and update all take `&mut self`, so bodies can never be
/// added or removed while an update is running.
pub struct Space {
    config: SpaceConfig,
    bodies: SlotMap<BodyKey, DynamicBody>,
    static_shapes: Vec<Shape>,
    grid: Option<BucketGrid>,
    next_id: u32,
    stats: SpaceStats,
}

impl Space {
    /// Create a new space
    ///
    /// Invalid parameters are replaced with defaults and logged. If the
    /// bucket grid cannot be built the space falls back to a linear scan.
    pub fn new(config: SpaceConfig) -> Self {
        let config = config.sanitized();

        let grid = if config.use_buckets {
            let grid = BucketGrid::new(config.bounds, config.bucket_size);
            if grid.is_none() {
                log::warn!(
                    "Cannot build bucket grid for bounds {:?} with bucket size {:?}, using linear scan",
                    config.bounds,
                    config.bucket_size
                );
            }
            grid
        } else {
            None
        };

        if let Some(grid) = &grid {
            log::debug!(
                "Created space {:?} with {}x{} buckets",
                config.bounds,
                grid.bucket_count().x,
                grid.bucket_count().y
            );
        }

        Self {
            config,
            bodies: SlotMap::with_key(),
            static_shapes: Vec::new(),
            grid,
            next_id: 0,
            stats: SpaceStats::default(),
        }
    }

    /// The (sanitized) configuration in use
    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    /// Whether the spatial hash is active
    pub fn uses_buckets(&self) -> bool {
        self.grid.is_some()
    }

    pub fn stats(&self) -> SpaceStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = SpaceStats::default();
    }

    // ==================== Registration ====================

    /// Add a copy of a world-space shape as permanent static geometry
    ///
    /// Returns `None` (and logs) if the shape is degenerate.
    pub fn add_static_shape(&mut self, shape: Shape) -> Option<StaticShapeId> {
        if !shape.is_valid() {
            log::warn!("Ignoring degenerate static shape {:?}", shape);
            return None;
        }

        let id = StaticShapeId(self.static_shapes.len());
        self.static_shapes.push(shape);
        if let Some(grid) = self.grid.as_mut() {
            grid.insert_static(id, &shape.bounds());
        }
        Some(id)
    }

    /// Static shapes registered so far, indexed by [`StaticShapeId`]
    pub fn static_shapes(&self) -> &[Shape] {
        &self.static_shapes
    }

    pub fn static_shape(&self, id: StaticShapeId) -> Option<&Shape> {
        self.static_shapes.get(id.0)
    }

    /// Register a body and return its key
    ///
    /// Returns `None` (and logs) if the body's shape or state is unusable.
    pub fn add_body(&mut self, body: Body) -> Option<BodyKey> {
        if !body.is_valid() {
            log::warn!("Ignoring body '{}' with degenerate shape or state", body.name);
            return None;
        }

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let key = self.bodies.insert(DynamicBody::new(body, id));
        self.refresh_buckets(key);
        Some(key)
    }

    /// Unregister a body and hand it back to the caller
    pub fn remove_body(&mut self, key: BodyKey) -> Option<Body> {
        let Some(mut dynamic) = self.bodies.remove(key) else {
            log::debug!("remove_body called with a stale key {:?}", key);
            return None;
        };
        if let Some(grid) = self.grid.as_mut() {
            grid.remove_body(key, &mut dynamic.buckets);
        }
        Some(dynamic.body)
    }

    /// Get an immutable reference to a body by key
    pub fn body(&self, key: BodyKey) -> Option<&Body> {
        self.bodies.get(key).map(|d| &d.body)
    }

    /// Get a mutable reference to a body by key
    ///
    /// Moving the body here is picked up by the next update. A body whose
    /// shape or state is made degenerate is dropped from the buckets and
    /// skipped by updates and queries until it is valid again.
    pub fn body_mut(&mut self, key: BodyKey) -> Option<&mut Body> {
        self.bodies.get_mut(key).map(|d| &mut d.body)
    }

    /// Simulation state of a registered body
    pub fn dynamic_body(&self, key: BodyKey) -> Option<&DynamicBody> {
        self.bodies.get(key)
    }

    /// Stable id assigned when the body was added
    pub fn body_id(&self, key: BodyKey) -> Option<u32> {
        self.bodies.get(key).map(|d| d.id)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Iterate over all body keys
    pub fn body_keys(&self) -> impl Iterator<Item = BodyKey> + '_ {
        self.bodies.keys()
    }

    /// Collisions a body had during the last update
    pub fn collisions(&self, key: BodyKey) -> &[Collision] {
        self.bodies.get(key).map(|d| d.collisions()).unwrap_or(&[])
    }

    /// Whether a body was blocked during the last update
    pub fn is_blocked(&self, key: BodyKey) -> bool {
        self.bodies.get(key).is_some_and(|d| d.blocked)
    }

    /// Buckets a body currently occupies
    pub fn bucket_slots(&self, key: BodyKey) -> &[BucketSlot] {
        self.bodies.get(key).map(|d| d.buckets()).unwrap_or(&[])
    }

    // ==================== Bucket queries ====================

    /// Grid coordinate containing a point, [`GridCoord::VOID`] without buckets
    pub fn bucket_coordinates(&self, point: Vec2) -> GridCoord {
        match &self.grid {
            Some(grid) => grid.coordinates(point),
            None => GridCoord::VOID,
        }
    }

    /// Row-major bucket index of a coordinate, `None` if outside the grid
    pub fn bucket_index(&self, coord: GridCoord) -> Option<usize> {
        self.grid.as_ref().and_then(|grid| grid.index(coord))
    }

    /// Bucket index containing a point
    pub fn bucket_index_by_point(&self, point: Vec2) -> Option<usize> {
        self.bucket_index(self.bucket_coordinates(point))
    }

    /// Bucket at a coordinate (the void bucket if outside); `None` without
    /// buckets
    pub fn bucket_at(&self, coord: GridCoord) -> Option<&SpaceBucket> {
        self.grid.as_ref().map(|grid| grid.bucket_at(coord))
    }

    /// Bucket containing a point (the void bucket if outside); `None`
    /// without buckets
    pub fn bucket_by_point(&self, point: Vec2) -> Option<&SpaceBucket> {
        self.grid.as_ref().map(|grid| grid.bucket_by_point(point))
    }

    pub fn bucket(&self, slot: BucketSlot) -> Option<&SpaceBucket> {
        self.grid.as_ref().map(|grid| grid.bucket(slot))
    }

    pub fn bucket_grid(&self) -> Option<&BucketGrid> {
        self.grid.as_ref()
    }

    /// Walk the buckets overlapping a rectangle; `None` without buckets
    pub fn clipped_buckets(&self, rect: &Rect) -> Option<ClippedBuckets> {
        self.grid.as_ref().map(|grid| grid.clipped_slots(rect))
    }

    // ==================== Shape queries ====================

    /// Static shapes overlapping an arbitrary world-space shape
    pub fn static_shape_check(&self, shape: &Shape) -> Vec<Collision> {
        let mut collisions = Vec::new();
        self.static_shape_check_into(shape, &mut collisions);
        collisions
    }

    /// Like [`static_shape_check`](Self::static_shape_check) but appends to
    /// an existing list
    pub fn static_shape_check_into(&self, shape: &Shape, collisions: &mut Vec<Collision>) {
        for id in self.static_candidates(&shape.bounds()) {
            if let Some(contact) = shape_contact(shape, &self.static_shapes[id.0]) {
                collisions.push(Collision::new(contact, 0.0, Hit::StaticShape(id)));
            }
        }
    }

    /// Static shapes and bodies overlapping a world-space shape
    ///
    /// Bodies are filtered by `touchlayer` against their clip layers; static
    /// shapes are included when `touchlayer` has [`CollisionLayer::WORLD`].
    pub fn shape_check(&self, shape: &Shape, touchlayer: CollisionLayer) -> Vec<Collision> {
        let mut collisions = Vec::new();
        if touchlayer.intersects(CollisionLayer::WORLD) {
            self.static_shape_check_into(shape, &mut collisions);
        }
        for key in self.body_candidates(&shape.bounds()) {
            let other = &self.bodies[key];
            if !touchlayer.intersects(other.body.cliplayer) || !other.body.is_valid() {
                continue;
            }
            if let Some(contact) = shape_contact(shape, &other.world_shape()) {
                collisions.push(Collision::new(contact, 0.0, Hit::Body(key)));
            }
        }
        collisions
    }

    /// Bodies whose bounds intersect a rectangle
    pub fn bodies_in_rect(&self, rect: &Rect) -> Vec<BodyKey> {
        self.body_candidates(rect)
            .into_iter()
            .filter(|&key| {
                let body = &self.bodies[key].body;
                body.is_valid() && body.world_bounds().intersects(rect)
            })
            .collect()
    }

    // ==================== Simulation ====================

    /// Advance the simulation by one frame
    pub fn update(&mut self) {
        self.stats.frames += 1;

        let fix = self.fix_overlaps(self.config.precision);
        if !fix.resolved {
            log::debug!("Overlaps remain after {} passes", fix.passes);
        }

        for dynamic in self.bodies.values_mut() {
            dynamic.reset();
        }

        let order = self.step_order();
        let substeps = self.substep_count();
        let mut loops = 0u32;
        for substep in 0..substeps {
            let t = (substep as f32 * self.config.time_step).min(1.0);
            for &key in &order {
                self.step_body(key, t, substeps);
            }
            loops += 1;
        }

        // Aggregate walks t over [0, 1] in time_step increments; Integrate
        // spreads the whole frame over its substeps
        let elapsed = match self.config.substep_mode {
            SubstepMode::Aggregate => (loops as f32 * self.config.time_step).min(1.0),
            SubstepMode::Integrate => loops as f32 / substeps as f32,
        };
        self.finalize(elapsed);
    }

    /// Push overlapping bodies apart, making at most `tries` passes
    ///
    /// Each pass detects every overlap at the current positions and moves each
    /// overlapping body out along its combined contact normal. Stops early once
    /// a pass finds nothing.
    pub fn fix_overlaps(&mut self, tries: u8) -> OverlapFix {
        self.refresh_all_buckets();
        let order = self.step_order();
        let slop = self.config.slop;

        for pass in 0..tries {
            let mut any = false;
            for &key in &order {
                let found = self.detect(key, 0.0);
                if found.is_empty() {
                    continue;
                }
                any = true;
                if let Some(dynamic) = self.bodies.get_mut(key) {
                    dynamic.push_out(&found, slop);
                }
                self.refresh_buckets(key);
            }

            if !any {
                return OverlapFix {
                    passes: pass,
                    resolved: true,
                };
            }
            self.stats.overlap_passes += 1;
        }

        let resolved = order.iter().all(|&key| self.detect(key, 0.0).is_empty());
        OverlapFix {
            passes: tries,
            resolved,
        }
    }

    /// Number of substeps in one frame
    fn substep_count(&self) -> u32 {
        let steps = ((1.0 / self.config.time_step).round().max(1.0) as u32).min(MAX_SUBSTEPS);
        match self.config.substep_mode {
            // t = 0, dt, 2dt, ..., 1 inclusive
            SubstepMode::Aggregate => steps.saturating_add(1),
            SubstepMode::Integrate => steps,
        }
    }

    /// Keys of the bodies to simulate, ordered by id so results do not
    /// depend on slot reuse
    ///
    /// Bodies made degenerate through [`body_mut`](Self::body_mut) are left
    /// out until they are valid again.
    fn step_order(&self) -> Vec<BodyKey> {
        let mut order: Vec<(u32, BodyKey)> = self
            .bodies
            .iter()
            .filter(|(key, d)| {
                let valid = d.body.is_valid();
                if !valid {
                    log::warn!("Skipping body '{}' ({:?}) with degenerate shape or state", d.body.name, key);
                }
                valid
            })
            .map(|(k, d)| (d.id, k))
            .collect();
        order.sort_unstable_by_key(|&(id, _)| id);
        order.into_iter().map(|(_, k)| k).collect()
    }

    /// Run one substep for one body
    fn step_body(&mut self, key: BodyKey, t: f32, substeps: u32) {
        let mode = self.config.substep_mode;
        let Some(dynamic) = self.bodies.get_mut(key) else {
            return;
        };
        if dynamic.body.velocity.is_zero() {
            return;
        }

        match mode {
            SubstepMode::Aggregate => {
                if !dynamic.moved {
                    let velocity = dynamic.body.velocity;
                    dynamic.begin_move(velocity);
                    self.refresh_buckets(key);
                }
            }
            SubstepMode::Integrate => {
                let delta = dynamic.body.velocity / substeps as f32;
                dynamic.begin_move(delta);
                self.refresh_buckets(key);
            }
        }

        let found = self.detect(key, t);
        if found.is_empty() {
            return;
        }

        self.stats.collisions += found.len() as u64;
        let slop = self.config.slop;
        if let Some(dynamic) = self.bodies.get_mut(key) {
            log::trace!(
                "Body '{}' (#{}) blocked by {} collision(s) at t={}",
                dynamic.body.name,
                dynamic.id,
                found.len(),
                t
            );
            dynamic.blocked = true;
            dynamic.rollback();
            dynamic.resolve_overlap(&found, slop);
            dynamic.respond(&found);
            dynamic.collisions.extend_from_slice(&found);
        }
        self.refresh_buckets(key);
    }

    /// Apply the frame's integration, settle bucket membership and notify
    /// touch callbacks
    ///
    /// `elapsed` is the fraction of the frame that was simulated.
    fn finalize(&mut self, elapsed: f32) {
        let (gravity, dampening) = (self.config.gravity, self.config.dampening);

        for dynamic in self.bodies.values_mut() {
            dynamic.finalize(gravity, dampening, elapsed);
        }
        self.refresh_all_buckets();
        for dynamic in self.bodies.values_mut() {
            dynamic.notify_touch();
        }
    }

    /// Every overlap a body has at its current position
    fn detect(&mut self, key: BodyKey, t: f32) -> Vec<Collision> {
        let mut found = Vec::new();
        let counts = self.collect_collisions(key, t, &mut found);
        self.stats.narrow_phase_tests += counts.pairs;
        self.stats.static_tests += counts.statics;
        found
    }

    fn collect_collisions(&self, key: BodyKey, t: f32, found: &mut Vec<Collision>) -> TestCounts {
        let mut counts = TestCounts::default();
        let Some(dynamic) = self.bodies.get(key) else {
            return counts;
        };

        let shape = dynamic.world_shape();
        let bounds = shape.bounds();

        // Dynamic vs dynamic
        for other_key in self.body_candidates(&bounds) {
            if other_key == key {
                continue;
            }
            let other = &self.bodies[other_key];
            if !dynamic.body.touches(&other.body) || !other.body.is_valid() {
                continue;
            }
            counts.pairs += 1;
            if let Some(contact) = shape_contact(&shape, &other.world_shape()) {
                found.push(Collision::new(contact, t, Hit::Body(other_key)));
            }
        }

        // Dynamic vs static
        if dynamic.body.touches_world() {
            for id in self.static_candidates(&bounds) {
                counts.statics += 1;
                if let Some(contact) = shape_contact(&shape, &self.static_shapes[id.0]) {
                    found.push(Collision::new(contact, t, Hit::StaticShape(id)));
                }
            }
        }

        // Dynamic vs world bounds
        if dynamic.body.worldclip {
            if let Some(contact) = bounds_contact(&bounds, &self.config.bounds) {
                found.push(Collision::new(contact, t, Hit::WorldBound));
            }
        }

        counts
    }

    /// Bodies that may overlap `rect`, each listed once
    fn body_candidates(&self, rect: &Rect) -> Vec<BodyKey> {
        let Some(grid) = &self.grid else {
            return self.bodies.keys().collect();
        };

        let mut keys = Vec::new();
        for bucket in grid.clipped_buckets(rect) {
            for &key in bucket.dynamic_bodies() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Static shapes that may overlap `rect`, each listed once
    fn static_candidates(&self, rect: &Rect) -> Vec<StaticShapeId> {
        let Some(grid) = &self.grid else {
            return (0..self.static_shapes.len()).map(StaticShapeId).collect();
        };

        let mut ids = Vec::new();
        for bucket in grid.clipped_buckets(rect) {
            for &id in bucket.static_shapes() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    /// Re-bucket one body for its current bounds
    fn refresh_buckets(&mut self, key: BodyKey) {
        let (Some(grid), Some(dynamic)) = (self.grid.as_mut(), self.bodies.get_mut(key)) else {
            return;
        };
        rebucket(grid, key, dynamic);
    }

    fn refresh_all_buckets(&mut self) {
        let Some(grid) = self.grid.as_mut() else {
            return;
        };
        for (key, dynamic) in self.bodies.iter_mut() {
            rebucket(grid, key, dynamic);
        }
    }
}

/// Move a body's bucket membership to match its bounds; degenerate bodies
/// are taken out of the grid
fn rebucket(grid: &mut BucketGrid, key: BodyKey, dynamic: &mut DynamicBody) {
    if dynamic.body.is_valid() {
        let bounds = dynamic.world_bounds();
        grid.relocate_body(key, &bounds, &mut dynamic.buckets);
    } else {
        grid.remove_body(key, &mut dynamic.buckets);
    }
}

impl Default for Space {
    fn default() -> Self {
        Self::new(SpaceConfig::default())
    }
}
