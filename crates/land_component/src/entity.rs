//! Entity type and allocation utilities.
//!
//! An [`EntityId`] is a lightweight `u64` identifier. All entity IDs are
//! allocated by the server so they are unique across every connected client.
//! An [`Entity`] is the full world object: id, position, capabilities and
//! display tags. The same type doubles as the entity snapshot sent over the
//! wire.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use land_math::Position;
use serde::{Deserialize, Serialize};

use crate::property::{Property, PropertyType};

/// A unique entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// The null / invalid entity sentinel.
    pub const INVALID: EntityId = EntityId(0);

    /// Create an entity ID from a raw `u64`.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is a valid (non-zero) ID.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Allocates monotonically increasing entity IDs.
///
/// The allocator lives in the server and is shared by every connection task,
/// so allocation only needs `&self`.
#[derive(Debug)]
pub struct EntityAllocator {
    next_id: AtomicU64,
}

impl EntityAllocator {
    /// Creates a new allocator. IDs start at 1 (0 is reserved for [`EntityId::INVALID`]).
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates a fresh entity ID.
    pub fn allocate(&self) -> EntityId {
        EntityId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the number of IDs allocated so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - 1
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// An addressable object in the world.
///
/// Capabilities are typed [`Property`] values, at most one per
/// [`PropertyType`]. Tags are free-form display flags such as `"visible"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier within a scene.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Character drawn for this entity.
    pub glyph: char,
    /// Current cell on the grid.
    pub position: Position,
    /// Capabilities, kept sorted by kind with no duplicates.
    properties: Vec<Property>,
    /// Display flags.
    pub tags: BTreeSet<String>,
}

impl Entity {
    /// Create an entity with no capabilities at the origin.
    #[must_use]
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            name: String::new(),
            glyph: '?',
            position: Position::ZERO,
            properties: Vec::new(),
            tags: BTreeSet::new(),
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the display glyph.
    #[must_use]
    pub fn with_glyph(mut self, glyph: char) -> Self {
        self.glyph = glyph;
        self
    }

    /// Place the entity at `position`.
    #[must_use]
    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Attach a property.
    #[must_use]
    pub fn with_property(mut self, property: Property) -> Self {
        self.insert_property(property);
        self
    }

    /// Add a display tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Returns `true` if the entity holds a property of the given type.
    #[must_use]
    pub fn has(&self, kind: PropertyType) -> bool {
        self.slot(kind).is_ok()
    }

    /// Returns `true` if the entity carries the given display tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Returns the property of the given type, if held.
    #[must_use]
    pub fn property(&self, kind: PropertyType) -> Option<&Property> {
        self.slot(kind).ok().map(|i| &self.properties[i])
    }

    /// Returns the property of the given type mutably, if held.
    pub fn property_mut(&mut self, kind: PropertyType) -> Option<&mut Property> {
        self.slot(kind).ok().map(|i| &mut self.properties[i])
    }

    /// Insert a property, returning the one it replaced.
    pub fn insert_property(&mut self, property: Property) -> Option<Property> {
        match self.slot(property.kind()) {
            Ok(i) => Some(std::mem::replace(&mut self.properties[i], property)),
            Err(i) => {
                self.properties.insert(i, property);
                None
            }
        }
    }

    /// Remove the property of the given type, returning it.
    pub fn remove_property(&mut self, kind: PropertyType) -> Option<Property> {
        self.slot(kind).ok().map(|i| self.properties.remove(i))
    }

    /// Iterate over the held properties.
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    /// The kinds of every held property, in sorted order.
    #[must_use]
    pub fn property_types(&self) -> Vec<PropertyType> {
        self.properties.iter().map(Property::kind).collect()
    }

    fn slot(&self, kind: PropertyType) -> Result<usize, usize> {
        self.properties.binary_search_by_key(&kind, Property::kind)
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} '{}' at ({}, {})",
            self.id, self.name, self.position.x, self.position.y
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_creation() {
        let e = EntityId::from_raw(42);
        assert_eq!(e.id(), 42);
        assert!(e.is_valid());
        assert!(!EntityId::INVALID.is_valid());
    }

    #[test]
    fn test_allocator_produces_unique_ids() {
        let alloc = EntityAllocator::new();
        let e1 = alloc.allocate();
        let e2 = alloc.allocate();
        let e3 = alloc.allocate();
        assert_eq!(e1.id(), 1);
        assert_eq!(e2.id(), 2);
        assert_eq!(e3.id(), 3);
        assert_eq!(alloc.count(), 3);
    }

    #[test]
    fn test_properties_one_per_kind() {
        let mut e = Entity::new(EntityId(1))
            .with_property(Property::Item {
                name: "rock".to_string(),
            })
            .with_property(Property::Gettable);
        assert!(e.has(PropertyType::Item));
        assert!(e.has(PropertyType::Gettable));
        assert!(!e.has(PropertyType::Player));

        let old = e.insert_property(Property::Item {
            name: "gem".to_string(),
        });
        assert_eq!(
            old,
            Some(Property::Item {
                name: "rock".to_string()
            })
        );
        assert_eq!(e.property_types().len(), 2);
    }

    #[test]
    fn test_property_types_sorted() {
        let e = Entity::new(EntityId(1))
            .with_property(Property::Gettable)
            .with_property(Property::Player {
                username: "alice".to_string(),
            });
        assert_eq!(
            e.property_types(),
            vec![PropertyType::Player, PropertyType::Gettable]
        );
    }

    #[test]
    fn test_remove_property() {
        let mut e = Entity::new(EntityId(1)).with_property(Property::Gettable);
        assert_eq!(e.remove_property(PropertyType::Gettable), Some(Property::Gettable));
        assert_eq!(e.remove_property(PropertyType::Gettable), None);
        assert!(!e.has(PropertyType::Gettable));
    }

    #[test]
    fn test_entity_serialization_roundtrip() {
        let entity = Entity::new(EntityId(7))
            .named("alice")
            .with_glyph('@')
            .at(Position::new(3, 4))
            .with_property(Property::Player {
                username: "alice".to_string(),
            })
            .with_property(Property::Inventory { items: Vec::new() })
            .with_tag("visible");
        let bytes = rmp_serde::to_vec(&entity).unwrap();
        let restored: Entity = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(entity, restored);
    }
}
