//! Level loading
//!
//! A level is a list of static shapes plus a list of body descriptions,
//! normally read from the `[level]` section of the app config. Building a
//! level registers everything with a fresh [`Space`].

use planar_math::Vec2;
use planar_physics::{Body, BodyKey, CollisionLayer, Shape, Space, SpaceConfig};
use serde::{Deserialize, Serialize};

/// Static geometry and bodies making up a level
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// World-space static shapes
    pub statics: Vec<Shape>,
    /// Bodies to register, in order
    pub bodies: Vec<BodyConfig>,
}

/// Serializable description of a [`Body`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyConfig {
    pub name: String,
    /// Shape in body-local coordinates
    pub shape: Shape,
    pub position: Vec2,
    pub velocity: Vec2,
    pub team: u32,
    pub cliplayer: CollisionLayer,
    pub touchlayer: CollisionLayer,
    pub worldclip: bool,
    pub mass: f32,
    pub gravity_scale: f32,
    pub elasticity: f32,
    pub user_data: u64,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            name: "body".to_string(),
            shape: Shape::circle(0.0, 0.0, 8.0),
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            team: 0,
            cliplayer: CollisionLayer::DEFAULT,
            touchlayer: CollisionLayer::ALL,
            worldclip: true,
            mass: 1.0,
            gravity_scale: 1.0,
            elasticity: 0.0,
            user_data: 0,
        }
    }
}

impl BodyConfig {
    /// Convert to a [`Body`] ready for registration
    pub fn to_body(&self) -> Body {
        Body::new(self.name.clone(), self.shape)
            .with_position(self.position)
            .with_velocity(self.velocity)
            .with_team(self.team)
            .with_layers(self.cliplayer, self.touchlayer)
            .with_worldclip(self.worldclip)
            .with_mass(self.mass)
            .with_gravity_scale(self.gravity_scale)
            .with_elasticity(self.elasticity)
            .with_user_data(self.user_data)
    }
}

/// A space populated from a [`LevelConfig`]
pub struct Level {
    pub space: Space,
    /// Keys of the registered bodies with their names, in config order
    pub bodies: Vec<(String, BodyKey)>,
    /// Entries that were rejected as degenerate
    pub rejected: usize,
}

impl Level {
    /// Create a space and register the level's statics and bodies
    ///
    /// Degenerate entries are skipped (the space logs each one) and counted
    /// in [`Level::rejected`].
    pub fn build(space_config: SpaceConfig, level: &LevelConfig) -> Self {
        let mut space = Space::new(space_config);
        let mut rejected = 0;

        for shape in &level.statics {
            if space.add_static_shape(*shape).is_none() {
                rejected += 1;
            }
        }

        let mut bodies = Vec::with_capacity(level.bodies.len());
        for body in &level.bodies {
            match space.add_body(body.to_body()) {
                Some(key) => bodies.push((body.name.clone(), key)),
                None => rejected += 1,
            }
        }

        let fix = space.fix_overlaps(space.config().precision);
        if !fix.resolved {
            log::warn!("Level starts with overlaps after {} passes", fix.passes);
        }

        log::info!(
            "Built level with {} static shapes and {} bodies ({} rejected)",
            space.static_shapes().len(),
            bodies.len(),
            rejected
        );

        Self {
            space,
            bodies,
            rejected,
        }
    }

    /// Simulate `frames` frames, logging positions every `log_every` frames
    pub fn run(&mut self, frames: u32, log_every: u32) {
        for frame in 1..=frames {
            self.space.update();

            for (name, key) in &self.bodies {
                let collisions = self.space.collisions(*key);
                if !collisions.is_empty() {
                    log::debug!("Frame {}: '{}' hit {:?}", frame, name, collisions[0].hit);
                }
            }

            if log_every > 0 && frame % log_every == 0 {
                self.log_positions(frame);
            }
        }

        if log_every == 0 || frames % log_every != 0 {
            self.log_positions(frames);
        }
    }

    fn log_positions(&self, frame: u32) {
        for (name, key) in &self.bodies {
            if let Some(body) = self.space.body(*key) {
                log::info!(
                    "Frame {}: '{}' at ({:.2}, {:.2}) moving ({:.2}, {:.2})",
                    frame,
                    name,
                    body.position.x,
                    body.position.y,
                    body.velocity.x,
                    body.velocity.y
                );
            }
        }
    }
}
