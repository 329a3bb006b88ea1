//! Collision detection for 2D shapes
//!
//! Provides narrow-phase contact generation between circles, rectangles and
//! edges, the per-step [`Collision`] record, and layer masks used to filter
//! which objects test against each other.

use bitflags::bitflags;
use planar_math::{Rect, Vec2};
use serde::{Deserialize, Serialize};

use crate::body::BodyKey;
use crate::shapes::{Circle, Edge, Shape};

/// Below this distance a contact normal cannot be derived from the offset.
const NORMAL_EPSILON: f32 = 0.0001;

bitflags! {
    /// Collision layers for filtering which objects can collide
    ///
    /// A body's `cliplayer` says which layers it belongs to; its `touchlayer`
    /// says which layers it tests against. Static geometry lives on
    /// [`CollisionLayer::WORLD`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct CollisionLayer: u32 {
        /// Default layer for most objects
        const DEFAULT = 1 << 0;
        /// Player character layer
        const PLAYER = 1 << 1;
        /// Enemy/NPC layer
        const ENEMY = 1 << 2;
        /// Static world geometry (walls, floors)
        const WORLD = 1 << 3;
        /// Trigger zones
        const TRIGGER = 1 << 4;
        /// Projectiles
        const PROJECTILE = 1 << 5;
        /// Collectible items
        const PICKUP = 1 << 6;
        /// All layers
        const ALL = 0xFFFFFFFF;
    }
}

impl Default for CollisionLayer {
    fn default() -> Self {
        CollisionLayer::DEFAULT
    }
}

/// Index of a static shape inside its [`Space`](crate::Space)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StaticShapeId(pub(crate) usize);

impl StaticShapeId {
    /// Raw index into [`Space::static_shapes`](crate::Space::static_shapes)
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// What a collision was against
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hit {
    /// Another dynamic body
    Body(BodyKey),
    /// A static shape registered with the space
    StaticShape(StaticShapeId),
    /// The simulation bounds
    WorldBound,
}

/// One overlap found during a simulation step
///
/// Collisions only live for the frame they were detected in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Collision {
    /// Unit normal pointing away from the obstacle, toward the body
    pub normal: Vec2,
    /// Overlap depth along the normal (0 when it cannot be measured)
    pub penetration: f32,
    /// Substep fraction at which the overlap was found
    pub time: f32,
    /// What was hit
    pub hit: Hit,
}

impl Collision {
    pub fn new(contact: Contact, time: f32, hit: Hit) -> Self {
        Self {
            normal: contact.normal,
            penetration: contact.penetration,
            time,
            hit,
        }
    }
}

/// Contact information from a shape test
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    /// Normal pointing from the second shape toward the first
    pub normal: Vec2,
    /// Penetration depth (positive means overlapping)
    pub penetration: f32,
}

impl Contact {
    pub fn new(normal: Vec2, penetration: f32) -> Self {
        Self { normal, penetration }
    }

    fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            penetration: self.penetration,
        }
    }
}

/// Test two shapes for overlap
///
/// The returned normal points from `b` toward `a`, i.e. the direction `a`
/// has to move to get out of `b`. Shapes that merely touch do not overlap.
pub fn shape_contact(a: &Shape, b: &Shape) -> Option<Contact> {
    match (a, b) {
        (Shape::Circle(a), Shape::Circle(b)) => circle_vs_circle(a, b),
        (Shape::Circle(c), Shape::Rect(r)) => circle_vs_rect(c, r),
        (Shape::Rect(r), Shape::Circle(c)) => circle_vs_rect(c, r).map(Contact::flipped),
        (Shape::Rect(a), Shape::Rect(b)) => rect_vs_rect(a, b),
        (Shape::Circle(c), Shape::Edge(e)) => circle_vs_edge(c, e),
        (Shape::Edge(e), Shape::Circle(c)) => circle_vs_edge(c, e).map(Contact::flipped),
        (Shape::Rect(r), Shape::Edge(e)) => rect_vs_edge(r, e),
        (Shape::Edge(e), Shape::Rect(r)) => rect_vs_edge(r, e).map(Contact::flipped),
        (Shape::Edge(a), Shape::Edge(b)) => edge_vs_edge(a, b),
    }
}

/// Test a shape against the inside of a bounding rectangle
///
/// Returns a contact whose normal points back into `bounds` when any part of
/// the shape's bounding rectangle lies outside it.
pub fn bounds_contact(shape_bounds: &Rect, bounds: &Rect) -> Option<Contact> {
    if bounds.contains_rect(shape_bounds) {
        return None;
    }

    let mut normal = Vec2::ZERO;
    let mut penetration: f32 = 0.0;

    if shape_bounds.min.x < bounds.min.x {
        normal.x += 1.0;
        penetration = penetration.max(bounds.min.x - shape_bounds.min.x);
    }
    if shape_bounds.max.x > bounds.max.x {
        normal.x -= 1.0;
        penetration = penetration.max(shape_bounds.max.x - bounds.max.x);
    }
    if shape_bounds.min.y < bounds.min.y {
        normal.y += 1.0;
        penetration = penetration.max(bounds.min.y - shape_bounds.min.y);
    }
    if shape_bounds.max.y > bounds.max.y {
        normal.y -= 1.0;
        penetration = penetration.max(shape_bounds.max.y - bounds.max.y);
    }

    // A shape wider than the bounds on one axis cancels out; push it back
    // toward the center instead.
    if normal.is_zero() {
        normal = bounds.center() - shape_bounds.center();
    }

    Some(Contact::new(normal.normalized(), penetration))
}

/// Circle vs circle; normal points from `b` toward `a`
pub fn circle_vs_circle(a: &Circle, b: &Circle) -> Option<Contact> {
    let delta = a.center - b.center;
    let dist_sq = delta.length_squared();
    let min_dist = a.radius + b.radius;

    if dist_sq >= min_dist * min_dist {
        return None;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > NORMAL_EPSILON {
        delta * (1.0 / dist)
    } else {
        // Concentric circles: any direction separates them
        Vec2::Y
    };
    Some(Contact::new(normal, min_dist - dist))
}

/// Circle vs rectangle; normal points from the rectangle toward the circle
pub fn circle_vs_rect(circle: &Circle, rect: &Rect) -> Option<Contact> {
    let closest = rect.closest_point(circle.center);
    let delta = circle.center - closest;
    let dist_sq = delta.length_squared();

    if dist_sq >= circle.radius * circle.radius {
        return None;
    }

    let dist = dist_sq.sqrt();
    if dist > NORMAL_EPSILON {
        return Some(Contact::new(delta * (1.0 / dist), circle.radius - dist));
    }

    // Center is inside the rectangle - use the shortest escape direction
    let to_min = circle.center - rect.min;
    let to_max = rect.max - circle.center;

    let (min_dist, normal) = [
        (to_min.x, -Vec2::X),
        (to_max.x, Vec2::X),
        (to_min.y, -Vec2::Y),
        (to_max.y, Vec2::Y),
    ]
    .into_iter()
    .fold((f32::INFINITY, -Vec2::X), |best, candidate| {
        if candidate.0 < best.0 {
            candidate
        } else {
            best
        }
    });

    Some(Contact::new(normal, circle.radius + min_dist))
}

/// Rectangle vs rectangle; normal points from `b` toward `a` along the axis
/// of least overlap
pub fn rect_vs_rect(a: &Rect, b: &Rect) -> Option<Contact> {
    let overlap_x = a.max.x.min(b.max.x) - a.min.x.max(b.min.x);
    let overlap_y = a.max.y.min(b.max.y) - a.min.y.max(b.min.y);

    if overlap_x <= 0.0 || overlap_y <= 0.0 {
        return None;
    }

    let (ca, cb) = (a.center(), b.center());
    if overlap_x <= overlap_y {
        let normal = if ca.x < cb.x { -Vec2::X } else { Vec2::X };
        Some(Contact::new(normal, overlap_x))
    } else {
        let normal = if ca.y < cb.y { -Vec2::Y } else { Vec2::Y };
        Some(Contact::new(normal, overlap_y))
    }
}

/// Circle vs edge; normal points from the edge toward the circle
pub fn circle_vs_edge(circle: &Circle, edge: &Edge) -> Option<Contact> {
    let closest = edge.closest_point(circle.center);
    let delta = circle.center - closest;
    let dist_sq = delta.length_squared();

    if dist_sq >= circle.radius * circle.radius {
        return None;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > NORMAL_EPSILON {
        delta * (1.0 / dist)
    } else {
        edge.normal()
    };
    Some(Contact::new(normal, circle.radius - dist))
}

/// Rectangle vs edge; normal is the edge normal oriented toward the rectangle
pub fn rect_vs_edge(rect: &Rect, edge: &Edge) -> Option<Contact> {
    let inside = |p: Vec2| p.x > rect.min.x && p.x < rect.max.x && p.y > rect.min.y && p.y < rect.max.y;

    let corners = [
        rect.min,
        Vec2::new(rect.max.x, rect.min.y),
        rect.max,
        Vec2::new(rect.min.x, rect.max.y),
    ];
    let crosses_side = (0..4).any(|i| {
        segments_intersect(edge.a, edge.b, corners[i], corners[(i + 1) % 4])
    });

    if !inside(edge.a) && !inside(edge.b) && !crosses_side {
        return None;
    }

    let center = rect.center();
    let mut normal = edge.normal();
    if normal.dot(center - edge.closest_point(center)) < 0.0 {
        normal = -normal;
    }

    // Depth of the rectangle's deepest corner behind the edge line
    let half = rect.half_extents();
    let reach = half.x * normal.x.abs() + half.y * normal.y.abs();
    let penetration = (reach - (center - edge.a).dot(normal)).max(0.0);

    Some(Contact::new(normal, penetration))
}

/// Edge vs edge; normal is `b`'s normal oriented toward `a`'s midpoint
pub fn edge_vs_edge(a: &Edge, b: &Edge) -> Option<Contact> {
    if !segments_intersect(a.a, a.b, b.a, b.b) {
        return None;
    }

    let mut normal = b.normal();
    if normal.dot(a.midpoint() - b.closest_point(a.midpoint())) < 0.0 {
        normal = -normal;
    }
    Some(Contact::new(normal, 0.0))
}

/// Whether segments `p1-p2` and `q1-q2` intersect (including collinear overlap)
pub fn segments_intersect(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> bool {
    let d1 = (q2 - q1).cross(p1 - q1);
    let d2 = (q2 - q1).cross(p2 - q1);
    let d3 = (p2 - p1).cross(q1 - p1);
    let d4 = (p2 - p1).cross(q2 - p1);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    let on_segment = |a: Vec2, b: Vec2, p: Vec2| {
        p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
    };

    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}
