//! Scene error types.

use land_component::EntityId;

/// Errors reported by [`Scene`](crate::Scene) operations.
///
/// Every failing operation leaves the scene exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    /// An entity with this ID is already in the scene.
    #[error("scene already has entity {0}")]
    DuplicateEntity(EntityId),

    /// No entity with this ID is in the scene.
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),

    /// A system with this name is already registered.
    #[error("system '{0}' is already registered")]
    DuplicateSystem(String),

    /// The system is not registered, so there is no shutdown left to confirm.
    #[error("system '{0}' is not registered")]
    SystemNotRegistered(String),
}
