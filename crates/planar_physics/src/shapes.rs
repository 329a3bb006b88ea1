//! Collision shapes for 2D physics
//!
//! These are lightweight primitives used for collision detection. Body shapes
//! are stored in body-local coordinates and translated by the body position
//! before testing; static shapes are stored in world coordinates.

use planar_math::{Rect, Vec2};
use serde::{Deserialize, Serialize};

use crate::collision::shape_contact;

/// A circle defined by center and radius
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Vec2,
    pub radius: f32,
}

impl Circle {
    /// Create a new circle at the given center with the given radius
    pub fn new(center: Vec2, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Check if a point is inside or on the circle
    pub fn contains(&self, point: Vec2) -> bool {
        (point - self.center).length_squared() <= self.radius * self.radius
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_center_half_extents(self.center, Vec2::splat(self.radius))
    }
}

/// A line segment between two points
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub a: Vec2,
    pub b: Vec2,
}

impl Edge {
    /// Create a new edge from `a` to `b`
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self { a, b }
    }

    /// Direction from `a` to `b` (not normalized)
    pub fn direction(&self) -> Vec2 {
        self.b - self.a
    }

    pub fn length(&self) -> f32 {
        self.direction().length()
    }

    pub fn midpoint(&self) -> Vec2 {
        (self.a + self.b) * 0.5
    }

    /// Unit normal of the edge (counter-clockwise perpendicular of a→b)
    pub fn normal(&self) -> Vec2 {
        self.direction().perp().normalized()
    }

    /// Closest point on the segment to a given point
    pub fn closest_point(&self, point: Vec2) -> Vec2 {
        let dir = self.direction();
        let len_sq = dir.length_squared();
        if len_sq <= f32::EPSILON {
            return self.a;
        }
        let t = ((point - self.a).dot(dir) / len_sq).clamp(0.0, 1.0);
        self.a + dir * t
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.a.min_components(self.b), self.a.max_components(self.b))
    }
}

/// Collision shape: a tagged union of the supported primitives
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Circle(Circle),
    Rect(Rect),
    Edge(Edge),
}

impl Shape {
    /// Convenience constructor for a circle
    pub fn circle(x: f32, y: f32, radius: f32) -> Self {
        Shape::Circle(Circle::new(Vec2::new(x, y), radius))
    }

    /// Convenience constructor for a rectangle from its corner and size
    pub fn rect(x: f32, y: f32, w: f32, h: f32) -> Self {
        Shape::Rect(Rect::from_xywh(x, y, w, h))
    }

    /// Convenience constructor for an edge
    pub fn edge(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Shape::Edge(Edge::new(Vec2::new(x1, y1), Vec2::new(x2, y2)))
    }

    /// Axis-aligned bounding rectangle of the shape
    pub fn bounds(&self) -> Rect {
        match self {
            Shape::Circle(c) => c.bounds(),
            Shape::Rect(r) => *r,
            Shape::Edge(e) => e.bounds(),
        }
    }

    /// Center of the shape's bounding rectangle
    pub fn center(&self) -> Vec2 {
        match self {
            Shape::Circle(c) => c.center,
            Shape::Rect(r) => r.center(),
            Shape::Edge(e) => e.midpoint(),
        }
    }

    /// Translate the shape by a delta
    pub fn translated(&self, delta: Vec2) -> Self {
        match self {
            Shape::Circle(c) => Shape::Circle(Circle::new(c.center + delta, c.radius)),
            Shape::Rect(r) => Shape::Rect(r.translated(delta)),
            Shape::Edge(e) => Shape::Edge(Edge::new(e.a + delta, e.b + delta)),
        }
    }

    /// Whether two shapes overlap
    pub fn overlaps(&self, other: &Shape) -> bool {
        shape_contact(self, other).is_some()
    }

    /// Whether the shape has usable, non-degenerate geometry
    ///
    /// Circles need a positive radius, rectangles a positive area and edges a
    /// non-zero length. All coordinates must be finite.
    pub fn is_valid(&self) -> bool {
        match self {
            Shape::Circle(c) => c.center.is_finite() && c.radius.is_finite() && c.radius > 0.0,
            Shape::Rect(r) => r.is_valid() && r.size().x > 0.0 && r.size().y > 0.0,
            Shape::Edge(e) => e.a.is_finite() && e.b.is_finite() && e.length() > 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_bounds() {
        let shape = Shape::circle(1.0, 2.0, 5.0);
        assert_eq!(shape.bounds(), Rect::new(Vec2::new(-4.0, -3.0), Vec2::new(6.0, 7.0)));
    }

    #[test]
    fn test_edge_bounds_any_direction() {
        let shape = Shape::edge(10.0, 0.0, 0.0, 5.0);
        assert_eq!(shape.bounds(), Rect::new(Vec2::ZERO, Vec2::new(10.0, 5.0)));
    }

    #[test]
    fn test_translated() {
        let delta = Vec2::new(3.0, -1.0);
        assert_eq!(
            Shape::circle(0.0, 0.0, 1.0).translated(delta).center(),
            Vec2::new(3.0, -1.0)
        );
        assert_eq!(
            Shape::rect(0.0, 0.0, 2.0, 2.0).translated(delta).bounds().min,
            Vec2::new(3.0, -1.0)
        );
        match Shape::edge(0.0, 0.0, 1.0, 0.0).translated(delta) {
            Shape::Edge(e) => assert_eq!(e.b, Vec2::new(4.0, -1.0)),
            other => panic!("Expected edge, got {:?}", other),
        }
    }

    #[test]
    fn test_edge_closest_point() {
        let edge = Edge::new(Vec2::ZERO, Vec2::new(10.0, 0.0));
        assert_eq!(edge.closest_point(Vec2::new(5.0, 3.0)), Vec2::new(5.0, 0.0));
        assert_eq!(edge.closest_point(Vec2::new(-5.0, 3.0)), Vec2::ZERO);
        assert_eq!(edge.closest_point(Vec2::new(15.0, -3.0)), Vec2::new(10.0, 0.0));
    }

    #[test]
    fn test_circle_contains() {
        let circle = Circle::new(Vec2::ZERO, 1.0);
        assert!(circle.contains(Vec2::new(1.0, 0.0)));
        assert!(!circle.contains(Vec2::new(1.1, 0.0)));
    }

    #[test]
    fn test_degenerate_shapes() {
        assert!(Shape::circle(0.0, 0.0, 1.0).is_valid());
        assert!(!Shape::circle(0.0, 0.0, 0.0).is_valid());
        assert!(!Shape::circle(0.0, 0.0, -2.0).is_valid());
        assert!(!Shape::rect(0.0, 0.0, 0.0, 4.0).is_valid());
        assert!(!Shape::rect(0.0, 0.0, -1.0, 4.0).is_valid());
        assert!(!Shape::edge(1.0, 1.0, 1.0, 1.0).is_valid());
        assert!(!Shape::circle(f32::NAN, 0.0, 1.0).is_valid());
    }

    #[test]
    fn test_shape_deserializes_from_toml() {
        let shape: Shape = toml::from_str(
            r#"
            type = "circle"
            center = { x = 1.0, y = 2.0 }
            radius = 3.0
            "#,
        )
        .unwrap();
        assert_eq!(shape, Shape::circle(1.0, 2.0, 3.0));

        let shape: Shape = toml::from_str(
            r#"
            type = "rect"
            min = { x = 0.0, y = 0.0 }
            max = { x = 4.0, y = 2.0 }
            "#,
        )
        .unwrap();
        assert_eq!(shape, Shape::rect(0.0, 0.0, 4.0, 2.0));
    }
}
