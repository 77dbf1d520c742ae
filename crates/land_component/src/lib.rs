//! # land_component
//!
//! The data side of the tile world: what an entity is, which capabilities it
//! can carry, and the terrain it stands on.
//!
//! This crate provides:
//!
//! - [`EntityId`]: lightweight `u64` entity identifiers.
//! - [`EntityAllocator`]: monotonically increasing, thread-safe ID allocator.
//! - [`Entity`]: an addressable world object and its wire snapshot.
//! - [`Property`] / [`PropertyType`]: typed capabilities an entity may hold.
//! - [`MapChunk`]: the terrain grid, and [`Passable`]: the collision query.
//! - [`MapShapeError`]: a decoded grid whose cells do not fit its size.

pub mod entity;
pub mod property;
pub mod terrain;

pub use entity::{Entity, EntityAllocator, EntityId};
pub use property::{Property, PropertyType};
pub use terrain::{MapChunk, MapShapeError, Passable, Terrain};
