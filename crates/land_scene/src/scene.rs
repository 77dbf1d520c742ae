//! The scene: entity storage and the capability index.
//!
//! A [`Scene`] owns every [`Entity`] of one world instance together with an
//! index from [`PropertyType`] to the IDs of the entities holding it. Both
//! structures, the system table and the outstanding-shutdown counter live in
//! one [`SceneState`] behind one mutex, so a reader never sees the entity map
//! and the index disagree.
//!
//! ## Lock ownership
//!
//! Every public method on [`Scene`] takes the lock exactly once. The index
//! helpers are methods on [`SceneState`] and receive `&mut SceneState`, which
//! can only be obtained from an already-held guard. They have no way to lock
//! again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use land_component::{Entity, EntityId, Property, PropertyType};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::SceneError;
use crate::system::System;

/// Everything the scene lock protects.
#[derive(Default)]
struct SceneState {
    /// All entities, keyed by ID.
    entities: HashMap<EntityId, Entity>,
    /// Property type to the IDs of entities currently holding it.
    index: HashMap<PropertyType, Vec<EntityId>>,
    /// Registered systems, keyed by name.
    systems: HashMap<String, Arc<dyn System>>,
    /// Systems added whose shutdown has not been confirmed yet.
    outstanding: usize,
}

impl SceneState {
    fn insert(&mut self, entity: Entity) -> Result<(), SceneError> {
        if self.entities.contains_key(&entity.id) {
            return Err(SceneError::DuplicateEntity(entity.id));
        }
        let id = entity.id;
        let kinds = entity.property_types();
        self.entities.insert(id, entity);
        for kind in kinds {
            self.cache(id, kind);
        }
        Ok(())
    }

    fn cache(&mut self, id: EntityId, kind: PropertyType) {
        let ids = self.index.entry(kind).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    fn uncache(&mut self, id: EntityId, kind: PropertyType) {
        if let Some(ids) = self.index.get_mut(&kind) {
            ids.retain(|e| *e != id);
            if ids.is_empty() {
                self.index.remove(&kind);
            }
        }
    }

    /// Bring the index in line with a change of an entity's property set.
    fn reindex(&mut self, id: EntityId, before: &[PropertyType], after: &[PropertyType]) {
        for kind in before.iter().filter(|k| !after.contains(k)) {
            self.uncache(id, *kind);
        }
        for kind in after.iter().filter(|k| !before.contains(k)) {
            self.cache(id, *kind);
        }
    }

    fn find(&self, types: &[PropertyType]) -> Vec<Entity> {
        let Some((first, rest)) = types.split_first() else {
            return Vec::new();
        };
        let Some(candidates) = self.index.get(first) else {
            return Vec::new();
        };
        candidates
            .iter()
            .filter_map(|id| self.entities.get(id))
            .filter(|e| rest.iter().all(|kind| e.has(*kind)))
            .cloned()
            .collect()
    }
}

/// The authoritative entity store for one world.
///
/// `Scene` is `Send + Sync`; share it with `Arc<Scene>`.
pub struct Scene {
    state: Mutex<SceneState>,
    /// Mirrors `SceneState::outstanding` so shutdown can be awaited without
    /// holding the lock.
    outstanding: watch::Sender<usize>,
}

impl Scene {
    /// Create an empty scene.
    #[must_use]
    pub fn new() -> Self {
        let (outstanding, _) = watch::channel(0);
        Self {
            state: Mutex::new(SceneState::default()),
            outstanding,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SceneState> {
        // A panic while holding the guard cannot leave the maps half-updated
        // in a way later operations would trip over, so poisoning is ignored.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Entity lifecycle --

    /// Insert a new entity with no properties.
    ///
    /// Properties attached later through [`Scene::attach`] are indexed at
    /// attach time.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::DuplicateEntity`] if `id` is already present. The
    /// existing entity is left untouched.
    pub fn add(&self, id: EntityId) -> Result<Entity, SceneError> {
        let entity = Entity::new(id);
        self.lock().insert(entity.clone())?;
        debug!(%id, "entity added");
        Ok(entity)
    }

    /// Insert a fully built entity, indexing every property it already holds.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::DuplicateEntity`] if the ID is already present.
    pub fn spawn(&self, entity: Entity) -> Result<(), SceneError> {
        let id = entity.id;
        self.lock().insert(entity)?;
        debug!(%id, "entity spawned");
        Ok(())
    }

    /// Remove an entity and drop it from every index it appears in.
    ///
    /// Removing an absent entity is a no-op and returns `None`.
    pub fn remove(&self, id: EntityId) -> Option<Entity> {
        let mut state = self.lock();
        let entity = state.entities.remove(&id)?;
        for kind in entity.property_types() {
            state.uncache(id, kind);
        }
        drop(state);
        debug!(%id, "entity removed");
        Some(entity)
    }

    /// Attach a property to an entity, replacing any property of the same
    /// type, and index it.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::EntityNotFound`] if the entity is absent.
    pub fn attach(&self, id: EntityId, property: Property) -> Result<Option<Property>, SceneError> {
        let mut state = self.lock();
        let kind = property.kind();
        let entity = state
            .entities
            .get_mut(&id)
            .ok_or(SceneError::EntityNotFound(id))?;
        let replaced = entity.insert_property(property);
        state.cache(id, kind);
        Ok(replaced)
    }

    /// Detach a property from an entity and drop it from the index.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::EntityNotFound`] if the entity is absent.
    pub fn detach(&self, id: EntityId, kind: PropertyType) -> Result<Option<Property>, SceneError> {
        let mut state = self.lock();
        let entity = state
            .entities
            .get_mut(&id)
            .ok_or(SceneError::EntityNotFound(id))?;
        let removed = entity.remove_property(kind);
        if removed.is_some() {
            state.uncache(id, kind);
        }
        Ok(removed)
    }

    /// Mutate an entity in place and return the closure's result.
    ///
    /// Property changes made by the closure are re-indexed before the lock is
    /// released. The entity's ID cannot be changed this way.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::EntityNotFound`] if the entity is absent.
    pub fn update<R>(&self, id: EntityId, f: impl FnOnce(&mut Entity) -> R) -> Result<R, SceneError> {
        let mut state = self.lock();
        let entity = state
            .entities
            .get_mut(&id)
            .ok_or(SceneError::EntityNotFound(id))?;
        let before = entity.property_types();
        let result = f(entity);
        if entity.id != id {
            warn!(%id, new_id = %entity.id, "entity id changed during update, restoring");
            entity.id = id;
        }
        let after = entity.property_types();
        if before != after {
            state.reindex(id, &before, &after);
        }
        Ok(result)
    }

    // -- Queries --

    /// Find every entity holding **all** of the given property types.
    ///
    /// Candidates come from the index of `types[0]`; the remaining types are
    /// checked per candidate, stopping at the first miss. No attempt is made
    /// to start from the smallest index.
    ///
    /// `types` must not be empty. An empty slice is a caller bug: it panics
    /// in debug builds and yields no entities in release builds.
    #[must_use]
    pub fn find(&self, types: &[PropertyType]) -> Vec<Entity> {
        debug_assert!(!types.is_empty(), "Scene::find needs at least one type");
        self.lock().find(types)
    }

    /// A snapshot of one entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<Entity> {
        self.lock().entities.get(&id).cloned()
    }

    /// Returns `true` if the entity is in the scene.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.lock().entities.contains_key(&id)
    }

    /// A snapshot of every entity, in no particular order.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.lock().entities.values().cloned().collect()
    }

    /// Number of entities in the scene.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entities.len()
    }

    /// Returns `true` if the scene holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entities.is_empty()
    }

    // -- Systems --

    /// Register a system and count it as awaiting shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::DuplicateSystem`] if a system with the same name
    /// is already registered.
    pub fn add_system(&self, system: Arc<dyn System>) -> Result<(), SceneError> {
        let name = system.name().to_string();
        let mut state = self.lock();
        if state.systems.contains_key(&name) {
            return Err(SceneError::DuplicateSystem(name));
        }
        state.systems.insert(name.clone(), system);
        state.outstanding += 1;
        self.outstanding.send_replace(state.outstanding);
        drop(state);
        debug!(system = name, "system added");
        Ok(())
    }

    /// Unregister a system, confirming its shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::SystemNotRegistered`] if no such system is
    /// registered. The outstanding count is never driven below zero.
    pub fn remove_system(&self, name: &str) -> Result<(), SceneError> {
        let mut state = self.lock();
        let Some(remaining) = state.outstanding.checked_sub(1) else {
            return Err(SceneError::SystemNotRegistered(name.to_string()));
        };
        if state.systems.remove(name).is_none() {
            return Err(SceneError::SystemNotRegistered(name.to_string()));
        }
        state.outstanding = remaining;
        self.outstanding.send_replace(remaining);
        drop(state);
        debug!(system = name, remaining, "system removed");
        Ok(())
    }

    /// Names of the registered systems.
    #[must_use]
    pub fn system_names(&self) -> Vec<String> {
        self.lock().systems.keys().cloned().collect()
    }

    /// Number of systems whose shutdown has not been confirmed.
    #[must_use]
    pub fn outstanding_systems(&self) -> usize {
        self.lock().outstanding
    }

    /// Ask every registered system to stop, then wait until each one has
    /// confirmed by calling [`Scene::remove_system`].
    ///
    /// Returns immediately when no systems are registered.
    pub async fn stop_systems(&self) {
        let systems: Vec<Arc<dyn System>> = self.lock().systems.values().cloned().collect();
        for system in &systems {
            debug!(system = system.name(), "requesting system stop");
            system.stop();
        }

        let mut outstanding = self.outstanding.subscribe();
        // The sender lives in `self`, so it outlives this borrow.
        let _ = outstanding.wait_for(|n| *n == 0).await;
        debug!(stopped = systems.len(), "all systems stopped");
    }

    /// Check that the index mirrors property possession exactly.
    #[cfg(test)]
    fn assert_consistent(&self) {
        let state = self.lock();
        for (kind, ids) in &state.index {
            let mut seen = ids.clone();
            seen.sort();
            seen.dedup();
            assert_eq!(seen.len(), ids.len(), "duplicate ids in index of {kind:?}");
            for id in ids {
                let entity = state.entities.get(id).expect("indexed entity must exist");
                assert!(entity.has(*kind), "{id} indexed under {kind:?} without it");
            }
        }
        for (id, entity) in &state.entities {
            assert_eq!(*id, entity.id);
            for kind in entity.property_types() {
                let ids = state.index.get(&kind).expect("held type must be indexed");
                assert!(ids.contains(id), "{id} holds {kind:?} but is not indexed");
            }
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Scene")
            .field("entities", &state.entities.len())
            .field("indexed_types", &state.index.len())
            .field("systems", &state.systems.len())
            .field("outstanding", &state.outstanding)
            .finish()
    }
}
