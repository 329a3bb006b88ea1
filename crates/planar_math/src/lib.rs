//! 2D Mathematics Library
//!
//! This crate provides the vector and rectangle types used by the Planar
//! collision engine.
//!
//! ## Core Types
//!
//! - [`Vec2`] - 2D vector with x, y components
//! - [`Rect`] - Axis-aligned rectangle (min/max corners)

mod rect;
mod vec2;

pub use rect::Rect;
pub use vec2::Vec2;
