//! Planar - spatial-hash collision and rigid-body simulation
//!
//! The simulation itself lives in [`planar_physics`]; this crate adds the
//! layered application config and level loading used by the `planar` binary.

pub mod config;
pub mod level;

pub use planar_math as math;
pub use planar_physics as physics;
