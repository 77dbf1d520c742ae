//! # land_math
//!
//! Grid math for the tile world. Re-exports [`glam`] integer vectors and
//! defines the cardinal [`Direction`]s entities move in.

pub mod direction;

// Re-export glam types for convenience.
pub use glam::IVec2;

pub use direction::Direction;

/// A cell on the world grid. `x` grows to the right, `y` grows downward.
pub type Position = IVec2;
