//! Axis-aligned rectangle

use crate::Vec2;
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle defined by its min and max corners
///
/// Rectangles are treated as closed: a point on the edge is contained and two
/// rectangles sharing only an edge intersect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Minimum corner
    pub min: Vec2,
    /// Maximum corner
    pub max: Vec2,
}

impl Rect {
    /// Create a new rectangle from min and max corners
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Create a rectangle from its top-left corner and size
    pub fn from_xywh(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            min: Vec2::new(x, y),
            max: Vec2::new(x + w, y + h),
        }
    }

    /// Create a rectangle centered at a position with given half-extents
    pub fn from_center_half_extents(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Get the center of the rectangle
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Get the half-extents
    pub fn half_extents(&self) -> Vec2 {
        (self.max - self.min) * 0.5
    }

    /// Get the full size on each axis
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Whether both corners are finite and min <= max on each axis
    pub fn is_valid(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.min.x <= self.max.x
            && self.min.y <= self.max.y
    }

    /// Check if a point is inside or on the rectangle
    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Check if another rectangle lies entirely within this one
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.min.x >= self.min.x
            && other.max.x <= self.max.x
            && other.min.y >= self.min.y
            && other.max.y <= self.max.y
    }

    /// Check if two rectangles overlap or touch
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Get the closest point inside or on the rectangle to a given point
    pub fn closest_point(&self, point: Vec2) -> Vec2 {
        point.clamp_components(self.min, self.max)
    }

    /// Smallest rectangle containing both rectangles
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            min: self.min.min_components(other.min),
            max: self.max.max_components(other.max),
        }
    }

    /// Translate the rectangle by a delta
    pub fn translated(&self, delta: Vec2) -> Self {
        Self {
            min: self.min + delta,
            max: self.max + delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_xywh() {
        let r = Rect::from_xywh(8.0, -5.0, 12.0, 10.0);
        assert_eq!(r.min, Vec2::new(8.0, -5.0));
        assert_eq!(r.max, Vec2::new(20.0, 5.0));
        assert_eq!(r.size(), Vec2::new(12.0, 10.0));
        assert_eq!(r.center(), Vec2::new(14.0, 0.0));
    }

    #[test]
    fn test_intersects_closed() {
        let a = Rect::from_xywh(0.0, 0.0, 10.0, 10.0);
        let touching = Rect::from_xywh(10.0, 0.0, 5.0, 5.0);
        let apart = Rect::from_xywh(10.5, 0.0, 5.0, 5.0);
        assert!(a.intersects(&touching));
        assert!(!a.intersects(&apart));
    }

    #[test]
    fn test_contains() {
        let outer = Rect::from_xywh(0.0, 0.0, 100.0, 100.0);
        assert!(outer.contains_point(Vec2::new(100.0, 0.0)));
        assert!(!outer.contains_point(Vec2::new(100.1, 0.0)));
        assert!(outer.contains_rect(&Rect::from_xywh(10.0, 10.0, 5.0, 5.0)));
        assert!(!outer.contains_rect(&Rect::from_xywh(-1.0, 10.0, 5.0, 5.0)));
    }

    #[test]
    fn test_closest_point() {
        let r = Rect::from_xywh(0.0, 0.0, 1.0, 1.0);
        assert_eq!(r.closest_point(Vec2::new(2.0, 0.5)), Vec2::new(1.0, 0.5));
        assert_eq!(r.closest_point(Vec2::new(0.5, 0.5)), Vec2::new(0.5, 0.5));
    }

    #[test]
    fn test_union_and_translate() {
        let a = Rect::from_xywh(0.0, 0.0, 1.0, 1.0);
        let b = a.translated(Vec2::new(3.0, -2.0));
        assert_eq!(b.min, Vec2::new(3.0, -2.0));
        let u = a.union(&b);
        assert_eq!(u, Rect::new(Vec2::new(0.0, -2.0), Vec2::new(4.0, 1.0)));
    }

    #[test]
    fn test_is_valid() {
        assert!(Rect::from_xywh(0.0, 0.0, 0.0, 0.0).is_valid());
        assert!(!Rect::new(Vec2::new(1.0, 0.0), Vec2::ZERO).is_valid());
        assert!(!Rect::new(Vec2::new(f32::NAN, 0.0), Vec2::ONE).is_valid());
    }
}
