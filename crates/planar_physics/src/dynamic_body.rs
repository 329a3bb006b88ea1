//! Space-private wrapper adding per-step scratch state to a [`Body`]

use planar_math::{Rect, Vec2};

use crate::body::Body;
use crate::bucket::BucketSlot;
use crate::collision::Collision;
use crate::shapes::Shape;

/// Reflect a velocity about a collision normal
#[inline]
pub fn bounce(velocity: Vec2, normal: Vec2) -> Vec2 {
    velocity.reflect(normal)
}

/// A registered body plus the state the simulation needs between substeps
#[derive(Debug)]
pub struct DynamicBody {
    pub(crate) body: Body,
    /// Monotonic id from the space's id pool
    pub(crate) id: u32,
    /// Position before the current move, restored when the move is blocked
    pub(crate) old_position: Vec2,
    /// Collisions found this frame
    pub(crate) collisions: Vec<Collision>,
    pub(crate) blocked: bool,
    /// Buckets this body currently occupies
    pub(crate) buckets: Vec<BucketSlot>,
    /// Whether this frame's displacement has already been applied
    pub(crate) moved: bool,
}

impl DynamicBody {
    pub(crate) fn new(body: Body, id: u32) -> Self {
        let old_position = body.position;
        Self {
            body,
            id,
            old_position,
            collisions: Vec::new(),
            blocked: false,
            buckets: Vec::new(),
            moved: false,
        }
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn collisions(&self) -> &[Collision] {
        &self.collisions
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn buckets(&self) -> &[BucketSlot] {
        &self.buckets
    }

    pub(crate) fn world_shape(&self) -> Shape {
        self.body.world_shape()
    }

    pub(crate) fn world_bounds(&self) -> Rect {
        self.body.world_bounds()
    }

    /// Clear the per-frame scratch state
    pub(crate) fn reset(&mut self) {
        self.old_position = self.body.position;
        self.blocked = false;
        self.collisions.clear();
        self.moved = false;
    }

    /// Snapshot the position and tentatively move by `delta`
    pub(crate) fn begin_move(&mut self, delta: Vec2) {
        self.old_position = self.body.position;
        self.body.position += delta;
        self.moved = true;
    }

    /// Restore the position saved by the last [`begin_move`](Self::begin_move)
    pub(crate) fn rollback(&mut self) {
        self.body.position = self.old_position;
    }

    /// Nudge the body by `slop` along each collision normal
    pub(crate) fn resolve_overlap(&mut self, collisions: &[Collision], slop: f32) {
        for collision in collisions {
            self.body.position += collision.normal * slop;
        }
    }

    /// Respond to a blocked move
    ///
    /// Elastic bodies get a single blended bounce: each collision's reflection
    /// is averaged and the body keeps its pre-collision speed in the averaged
    /// direction. Inelastic bodies stop.
    pub(crate) fn respond(&mut self, collisions: &[Collision]) {
        if self.body.elasticity <= 0.0 {
            self.body.velocity = Vec2::ZERO;
            return;
        }

        let speed = self.body.velocity.length();
        let mut sum = Vec2::ZERO;
        let mut count = 0;
        for collision in collisions {
            let reflected = bounce(self.body.velocity, collision.normal);
            if !reflected.is_zero() {
                sum += reflected;
                count += 1;
            }
        }

        if count == 0 {
            return;
        }

        let average = sum / count as f32;
        if average.is_zero() {
            // Opposing contacts cancelled out: head back the way we came
            self.body.velocity = -self.body.velocity;
        } else {
            self.body.velocity = average.with_length(speed);
        }
    }

    /// Push the body out of everything it overlaps, used by the overlap-fix
    /// pass
    ///
    /// Moves along the normalized sum of the collision normals by the deepest
    /// penetration plus `slop`.
    pub(crate) fn push_out(&mut self, collisions: &[Collision], slop: f32) {
        let mut normal = Vec2::ZERO;
        let mut depth: f32 = 0.0;
        for collision in collisions {
            normal += collision.normal;
            depth = depth.max(collision.penetration);
        }

        let direction = if normal.is_zero() {
            // Contacts cancel out; fall back to the first one
            collisions.first().map(|c| c.normal).unwrap_or(Vec2::ZERO)
        } else {
            normal.normalized()
        };
        self.body.position += direction * (depth + slop);
    }

    /// Apply the frame's integration after all substeps
    ///
    /// `elapsed` is the fraction of the frame actually simulated.
    pub(crate) fn finalize(&mut self, gravity: Vec2, dampening: f32, elapsed: f32) {
        self.body.velocity += gravity * (self.body.gravity_scale * elapsed);
        self.body.velocity *= (1.0 - dampening * elapsed).max(0.0);
    }

    /// Hand this frame's collisions to the body's touch callback
    pub(crate) fn notify_touch(&mut self) {
        if self.collisions.is_empty() {
            return;
        }
        if let Some(touch) = self.body.touch.as_mut() {
            touch(&self.collisions);
        }
    }
}
