//! Typed entity capabilities.
//!
//! A [`Property`] is one facet of behaviour or data an entity may possess,
//! with the payload that facet needs. [`PropertyType`] names the facet
//! without its payload and is what the scene indexes by.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;

/// The kind of a [`Property`], used as the scene's index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PropertyType {
    /// Controlled by a connected client.
    Player,
    /// Something that can lie on the ground.
    Item,
    /// Can be picked up.
    Gettable,
    /// Carries items.
    Inventory,
    /// Moved around by the server on its own.
    Wanderer,
}

impl PropertyType {
    /// Every property type.
    pub const ALL: [PropertyType; 5] = [
        PropertyType::Player,
        PropertyType::Item,
        PropertyType::Gettable,
        PropertyType::Inventory,
        PropertyType::Wanderer,
    ];
}

/// A capability with its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Property {
    /// The entity is a player's avatar.
    Player {
        /// The login name of the controlling client.
        username: String,
    },
    /// The entity is an item.
    Item {
        /// Name shown in inventory listings.
        name: String,
    },
    /// The entity can be picked up.
    Gettable,
    /// The entity carries other entities.
    Inventory {
        /// Carried items, most recently picked up last.
        items: Vec<Entity>,
    },
    /// The entity takes a step on its own every `period_ticks` server ticks.
    Wanderer {
        /// Ticks between steps. Zero is treated as one.
        period_ticks: u32,
    },
}

impl Property {
    /// The [`PropertyType`] of this property.
    #[must_use]
    pub fn kind(&self) -> PropertyType {
        match self {
            Property::Player { .. } => PropertyType::Player,
            Property::Item { .. } => PropertyType::Item,
            Property::Gettable => PropertyType::Gettable,
            Property::Inventory { .. } => PropertyType::Inventory,
            Property::Wanderer { .. } => PropertyType::Wanderer,
        }
    }
}
