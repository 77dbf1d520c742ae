//! The client's local copy of the world.
//!
//! The [`Mirror`] caches the entities the server has announced, which of
//! them this session controls, and the terrain grid. It is never
//! authoritative: every server update overwrites what it holds.

use std::collections::HashMap;

use land_component::{Entity, EntityId, MapChunk, Passable};
use land_math::{Direction, Position};

/// Local, non-authoritative world state for one session.
#[derive(Debug, Default)]
pub struct Mirror {
    entities: HashMap<EntityId, Entity>,
    controlled: Option<EntityId>,
    map: Option<MapChunk>,
}

impl Mirror {
    /// Create an empty mirror.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an entity, replacing any previous snapshot with the same ID.
    pub fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.id, entity);
    }

    /// Stop tracking an entity. Returns the last snapshot, if any.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Move a tracked entity. Unknown IDs are left alone and yield `false`.
    pub fn set_position(&mut self, id: EntityId, position: Position) -> bool {
        match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.position = position;
                true
            }
            None => false,
        }
    }

    /// Returns the snapshot of a tracked entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Returns `true` if the entity is tracked.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Iterate over every tracked entity.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The entity this session controls, once bound.
    #[must_use]
    pub fn controlled(&self) -> Option<EntityId> {
        self.controlled
    }

    /// Bind the controlled entity.
    pub fn set_controlled(&mut self, id: EntityId) {
        self.controlled = Some(id);
    }

    /// Snapshot of the controlled entity, if bound and tracked.
    #[must_use]
    pub fn controlled_entity(&self) -> Option<&Entity> {
        self.controlled.and_then(|id| self.entities.get(&id))
    }

    /// The terrain grid, once loaded.
    #[must_use]
    pub fn map(&self) -> Option<&MapChunk> {
        self.map.as_ref()
    }

    /// Replace the terrain grid wholesale.
    pub fn set_map(&mut self, map: MapChunk) {
        self.map = Some(map);
    }

    /// Step the controlled entity one cell if the cached terrain allows it.
    ///
    /// Returns `false` without changing anything if there is no controlled
    /// entity, no map yet, or the target cell is blocked.
    pub fn try_move_controlled(&mut self, direction: Direction) -> bool {
        let (Some(id), Some(map)) = (self.controlled, self.map.as_ref()) else {
            return false;
        };
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        let target = direction.step(entity.position);
        if !map.is_passable(target) {
            return false;
        }
        entity.position = target;
        true
    }
}
