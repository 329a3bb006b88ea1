//! 2D collision and rigid-body simulation for Planar
//!
//! This crate provides:
//! - Collision shapes (circles, rectangles, edges) and pairwise contact tests
//! - A uniform spatial hash (bucket grid) used as the broad phase
//! - The [`Space`], which owns bodies and static geometry and advances them
//!   frame by frame with substepping, blocking and bounce response

pub mod body;
pub mod bucket;
pub mod collision;
pub mod dynamic_body;
pub mod shapes;
pub mod space;

// Re-export commonly used types
pub use body::{Body, BodyKey, TouchCallback};
pub use bucket::{BucketGrid, BucketSlot, ClippedBuckets, GridCoord, SpaceBucket, MAX_BUCKETS};
pub use collision::{bounds_contact, shape_contact, Collision, CollisionLayer, Contact, Hit, StaticShapeId};
pub use dynamic_body::{bounce, DynamicBody};
pub use shapes::{Circle, Edge, Shape};
pub use space::{OverlapFix, Space, SpaceConfig, SpaceStats, SubstepMode, MAX_SUBSTEPS};
