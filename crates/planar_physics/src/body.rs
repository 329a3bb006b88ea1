//! Body types for 2D physics simulation

use std::fmt;

use planar_math::{Rect, Vec2};
use slotmap::new_key_type;

use crate::collision::{Collision, CollisionLayer};
use crate::shapes::Shape;

// Define generational key type for bodies
new_key_type! {
    /// Key to a body registered with a [`Space`](crate::Space)
    ///
    /// Uses generational indexing to prevent the ABA problem where a handle
    /// could point to a reused slot. If a body is removed and its slot reused,
    /// old keys will return None instead of pointing to the wrong body.
    pub struct BodyKey;
}

/// Callback invoked once per frame with the collisions a body had
pub type TouchCallback = Box<dyn FnMut(&[Collision])>;

/// The physical description of one collidable object
///
/// A body is handed to [`Space::add_body`](crate::Space::add_body) and
/// returned by [`Space::remove_body`](crate::Space::remove_body). The shape is
/// stored in body-local coordinates and translated by `position` for every
/// test.
pub struct Body {
    /// Name used in diagnostics
    pub name: String,
    /// Team id; bodies sharing a non-zero team never collide
    pub team: u32,
    /// Layers this body collides as
    pub cliplayer: CollisionLayer,
    /// Layers this body collides against
    pub touchlayer: CollisionLayer,
    /// Whether the body is kept inside the simulation bounds
    pub worldclip: bool,
    /// Position in world space
    pub position: Vec2,
    /// Velocity in units per frame
    pub velocity: Vec2,
    /// Mass of the body (0 = infinite)
    pub mass: f32,
    /// Multiplier for the space's gravity
    pub gravity_scale: f32,
    /// 0 = stop on hit, > 0 = bounce
    pub elasticity: f32,
    /// Collision shape in body-local coordinates
    pub shape: Shape,
    /// Opaque caller payload (entity id, handle bits, ...)
    pub user_data: u64,
    /// Custom collision response
    pub touch: Option<TouchCallback>,
}

impl Body {
    /// Create a new body with the given local shape at the origin
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            team: 0,
            cliplayer: CollisionLayer::DEFAULT,
            touchlayer: CollisionLayer::ALL,
            worldclip: true,
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            mass: 1.0,
            gravity_scale: 1.0,
            elasticity: 0.0,
            shape,
            user_data: 0,
            touch: None,
        }
    }

    /// Create a body with a circle of the given radius centered on its position
    pub fn circle(name: impl Into<String>, position: Vec2, radius: f32) -> Self {
        Self::new(name, Shape::circle(0.0, 0.0, radius)).with_position(position)
    }

    /// Create a body with a rectangle centered on its position
    pub fn rect(name: impl Into<String>, position: Vec2, half_extents: Vec2) -> Self {
        Self::new(
            name,
            Shape::Rect(Rect::from_center_half_extents(Vec2::ZERO, half_extents)),
        )
        .with_position(position)
    }

    /// Set the position of this body
    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    /// Set the velocity of this body
    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    /// Set the mass of this body
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass.max(0.0);
        self
    }

    /// Set the elasticity (0 = stop on hit, > 0 = bounce)
    pub fn with_elasticity(mut self, elasticity: f32) -> Self {
        self.elasticity = elasticity.max(0.0);
        self
    }

    /// Set the gravity multiplier
    pub fn with_gravity_scale(mut self, gravity_scale: f32) -> Self {
        self.gravity_scale = gravity_scale;
        self
    }

    /// Set the layers this body collides as and against
    pub fn with_layers(mut self, cliplayer: CollisionLayer, touchlayer: CollisionLayer) -> Self {
        self.cliplayer = cliplayer;
        self.touchlayer = touchlayer;
        self
    }

    pub fn with_team(mut self, team: u32) -> Self {
        self.team = team;
        self
    }

    /// Set whether the body is clipped against the simulation bounds
    pub fn with_worldclip(mut self, worldclip: bool) -> Self {
        self.worldclip = worldclip;
        self
    }

    pub fn with_user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }

    /// Set the collision callback
    pub fn with_touch(mut self, touch: impl FnMut(&[Collision]) + 'static) -> Self {
        self.touch = Some(Box::new(touch));
        self
    }

    /// The shape translated to the body's world position
    pub fn world_shape(&self) -> Shape {
        self.shape.translated(self.position)
    }

    /// Bounding rectangle of the world-space shape
    pub fn world_bounds(&self) -> Rect {
        self.world_shape().bounds()
    }

    /// Whether this body tests against `other`
    ///
    /// Bodies on the same non-zero team are ignored; otherwise this body's
    /// touch layers must include one of the other body's clip layers.
    pub fn touches(&self, other: &Body) -> bool {
        if self.team != 0 && self.team == other.team {
            return false;
        }
        self.touchlayer.intersects(other.cliplayer)
    }

    /// Whether this body tests against static geometry
    pub fn touches_world(&self) -> bool {
        self.touchlayer.intersects(CollisionLayer::WORLD)
    }

    /// Whether the body can be registered with a space
    pub fn is_valid(&self) -> bool {
        self.shape.is_valid() && self.position.is_finite() && self.velocity.is_finite()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("name", &self.name)
            .field("team", &self.team)
            .field("cliplayer", &self.cliplayer)
            .field("touchlayer", &self.touchlayer)
            .field("worldclip", &self.worldclip)
            .field("position", &self.position)
            .field("velocity", &self.velocity)
            .field("mass", &self.mass)
            .field("gravity_scale", &self.gravity_scale)
            .field("elasticity", &self.elasticity)
            .field("shape", &self.shape)
            .field("user_data", &self.user_data)
            .field("touch", &self.touch.is_some())
            .finish()
    }
}
