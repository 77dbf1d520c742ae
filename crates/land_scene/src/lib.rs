//! # land_scene
//!
//! The authoritative store of entities for one world instance.
//!
//! This crate provides:
//!
//! - [`Scene`]: entity storage plus a secondary index from
//!   [`PropertyType`](land_component::PropertyType) to the entities holding
//!   it, behind a single lock.
//! - [`System`]: a named background behaviour owned by a scene, with an
//!   awaitable stop protocol ([`Scene::stop_systems`]).
//! - [`StopSignal`]: the stop flag systems wait on.
//! - [`SceneError`]: contract violations reported to callers.

pub mod error;
pub mod scene;
pub mod system;

pub use error::SceneError;
pub use scene::Scene;
pub use system::{StopSignal, System, spawn_system};
