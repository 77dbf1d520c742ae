//! Packet types exchanged between client and server.
//!
//! On the wire every packet is a [`WirePacket`]: a tag string plus the
//! MessagePack-encoded payload. The payload is not self-describing, so it is
//! decoded according to the tag into a typed packet as soon as it arrives.
//! A payload that does not fit its tag is a [`NetError::Payload`] for that one
//! packet; an unrecognised tag is a [`NetError::UnknownTag`].
//!
//! The two directions share tag names but not payloads (`action` carries an
//! intent from the client and an entity snapshot from the server), so each
//! direction has its own type: [`ClientPacket`] and [`ServerPacket`].

use land_component::{Entity, EntityId, MapChunk};
use land_math::Direction;
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::NetError;
use crate::tags;

/// The tagged unit written to the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePacket {
    /// Selects the payload shape.
    pub tag: String,
    /// MessagePack-encoded payload.
    pub payload: Vec<u8>,
}

impl WirePacket {
    /// Encode `payload` under `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Encode`] if the payload cannot be serialised.
    pub fn new<T: Serialize>(tag: &str, payload: &T) -> Result<Self, NetError> {
        Ok(Self {
            tag: tag.to_string(),
            payload: codec::encode(payload)?,
        })
    }

    /// Decode the payload as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Payload`] if the payload does not have that shape.
    pub fn payload<'a, T: Deserialize<'a>>(&'a self) -> Result<T, NetError> {
        rmp_serde::from_slice(&self.payload).map_err(|source| NetError::Payload {
            tag: self.tag.clone(),
            source,
        })
    }
}

/// A packet type that can travel over a transport.
pub trait Packet: Sized + Send + 'static {
    /// The wire tag of this packet.
    fn tag(&self) -> &'static str;

    /// Convert into the wire representation.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Encode`] if the payload cannot be serialised.
    fn to_wire(&self) -> Result<WirePacket, NetError>;

    /// Decode from the wire representation, dispatching on the tag.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::UnknownTag`] for tags this direction does not use
    /// and [`NetError::Payload`] if the payload does not fit the tag.
    fn from_wire(wire: WirePacket) -> Result<Self, NetError>;
}

/// What a player wants to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionCode {
    /// Step one cell up.
    MoveUp,
    /// Step one cell down.
    MoveDown,
    /// Step one cell left.
    MoveLeft,
    /// Step one cell right.
    MoveRight,
    /// Pick up an item lying on the player's cell.
    ItemPickup,
    /// Drop the most recently picked up item.
    ItemDrop,
    /// Ask for a listing of the carried items.
    ListInventory,
}

impl ActionCode {
    /// The movement direction of a move action, `None` for item actions.
    #[must_use]
    pub const fn direction(self) -> Option<Direction> {
        match self {
            ActionCode::MoveUp => Some(Direction::Up),
            ActionCode::MoveDown => Some(Direction::Down),
            ActionCode::MoveLeft => Some(Direction::Left),
            ActionCode::MoveRight => Some(Direction::Right),
            ActionCode::ItemPickup | ActionCode::ItemDrop | ActionCode::ListInventory => None,
        }
    }

    /// The move action for a direction.
    #[must_use]
    pub const fn from_direction(direction: Direction) -> Self {
        match direction {
            Direction::Up => ActionCode::MoveUp,
            Direction::Down => ActionCode::MoveDown,
            Direction::Left => ActionCode::MoveLeft,
            Direction::Right => ActionCode::MoveRight,
        }
    }
}

/// Packets sent by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientPacket {
    /// Log in under a username.
    Connect(String),
    /// Request the terrain grid.
    LoadMap,
    /// Ask which entity this session controls.
    GetPlayer,
    /// Player intent.
    Action(ActionCode),
    /// Say something to everyone.
    Chat(String),
}

impl Packet for ClientPacket {
    fn tag(&self) -> &'static str {
        match self {
            ClientPacket::Connect(_) => tags::CONNECT,
            ClientPacket::LoadMap => tags::LOAD_MAP,
            ClientPacket::GetPlayer => tags::GET_PLAYER,
            ClientPacket::Action(_) => tags::ACTION,
            ClientPacket::Chat(_) => tags::CHAT,
        }
    }

    fn to_wire(&self) -> Result<WirePacket, NetError> {
        let tag = self.tag();
        match self {
            ClientPacket::Connect(username) => WirePacket::new(tag, username),
            ClientPacket::LoadMap | ClientPacket::GetPlayer => WirePacket::new(tag, &()),
            ClientPacket::Action(code) => WirePacket::new(tag, code),
            ClientPacket::Chat(text) => WirePacket::new(tag, text),
        }
    }

    fn from_wire(wire: WirePacket) -> Result<Self, NetError> {
        match wire.tag.as_str() {
            tags::CONNECT => Ok(ClientPacket::Connect(wire.payload()?)),
            tags::LOAD_MAP => wire.payload::<()>().map(|()| ClientPacket::LoadMap),
            tags::GET_PLAYER => wire.payload::<()>().map(|()| ClientPacket::GetPlayer),
            tags::ACTION => Ok(ClientPacket::Action(wire.payload()?)),
            tags::CHAT => Ok(ClientPacket::Chat(wire.payload()?)),
            _ => Err(NetError::UnknownTag(wire.tag)),
        }
    }
}

/// Packets sent by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerPacket {
    /// A line for the chat log.
    Chat(String),
    /// Authoritative state of one entity.
    Action(Entity),
    /// An entity entered the world.
    NewEntity(Entity),
    /// An entity left the world.
    DeleteEntity(Entity),
    /// The entity this session controls.
    GetPlayer(EntityId),
    /// The full terrain grid.
    LoadMap(MapChunk),
}

impl Packet for ServerPacket {
    fn tag(&self) -> &'static str {
        match self {
            ServerPacket::Chat(_) => tags::CHAT,
            ServerPacket::Action(_) => tags::ACTION,
            ServerPacket::NewEntity(_) => tags::NEW_ENTITY,
            ServerPacket::DeleteEntity(_) => tags::DELETE_ENTITY,
            ServerPacket::GetPlayer(_) => tags::GET_PLAYER,
            ServerPacket::LoadMap(_) => tags::LOAD_MAP,
        }
    }

    fn to_wire(&self) -> Result<WirePacket, NetError> {
        let tag = self.tag();
        match self {
            ServerPacket::Chat(text) => WirePacket::new(tag, text),
            ServerPacket::Action(entity)
            | ServerPacket::NewEntity(entity)
            | ServerPacket::DeleteEntity(entity) => WirePacket::new(tag, entity),
            ServerPacket::GetPlayer(id) => WirePacket::new(tag, id),
            ServerPacket::LoadMap(map) => WirePacket::new(tag, map),
        }
    }

    fn from_wire(wire: WirePacket) -> Result<Self, NetError> {
        match wire.tag.as_str() {
            tags::CHAT => Ok(ServerPacket::Chat(wire.payload()?)),
            tags::ACTION => Ok(ServerPacket::Action(wire.payload()?)),
            tags::NEW_ENTITY => Ok(ServerPacket::NewEntity(wire.payload()?)),
            tags::DELETE_ENTITY => Ok(ServerPacket::DeleteEntity(wire.payload()?)),
            tags::GET_PLAYER => Ok(ServerPacket::GetPlayer(wire.payload()?)),
            tags::LOAD_MAP => Ok(ServerPacket::LoadMap(wire.payload()?)),
            _ => Err(NetError::UnknownTag(wire.tag)),
        }
    }
}

#[cfg(test)]
mod tests {
    use land_component::{Property, PropertyType, Terrain};
    use land_math::Position;

    use super::*;

    fn alice() -> Entity {
        Entity::new(EntityId(7))
            .named("alice")
            .with_glyph('@')
            .at(Position::new(3, 4))
            .with_property(Property::Player {
                username: "alice".to_string(),
            })
    }

    fn through_wire<P: Packet>(packet: &P) -> P {
        let bytes = codec::encode(&packet.to_wire().unwrap()).unwrap();
        let wire: WirePacket = codec::decode(&bytes).unwrap();
        P::from_wire(wire).unwrap()
    }

    #[test]
    fn test_client_packets_cross_the_wire() {
        for packet in [
            ClientPacket::Connect("alice".to_string()),
            ClientPacket::LoadMap,
            ClientPacket::GetPlayer,
            ClientPacket::Action(ActionCode::ItemPickup),
            ClientPacket::Chat("hi".to_string()),
        ] {
            assert_eq!(through_wire(&packet), packet);
        }
    }

    #[test]
    fn test_server_snapshot_keeps_properties() {
        let packet = through_wire(&ServerPacket::NewEntity(alice()));
        let ServerPacket::NewEntity(entity) = packet else {
            panic!("wrong variant");
        };
        assert_eq!(entity.id, EntityId(7));
        assert!(entity.has(PropertyType::Player));
        assert_eq!(entity.position, Position::new(3, 4));
    }

    #[test]
    fn test_tags_shared_between_directions() {
        assert_eq!(ClientPacket::Action(ActionCode::MoveUp).tag(), "action");
        assert_eq!(ServerPacket::Action(alice()).tag(), "action");
        assert_eq!(ClientPacket::GetPlayer.tag(), "get-player");
        assert_eq!(ServerPacket::GetPlayer(EntityId(7)).tag(), "get-player");
        assert_eq!(ServerPacket::DeleteEntity(alice()).tag(), "delete-entity");
    }

    #[test]
    fn test_mismatched_payload_is_typed_error() {
        let wire = WirePacket::new(tags::ACTION, &"not an entity").unwrap();
        match ServerPacket::from_wire(wire) {
            Err(NetError::Payload { tag, .. }) => assert_eq!(tag, "action"),
            other => panic!("expected payload error, got {other:?}"),
        }
    }

    #[derive(Serialize)]
    struct LooseMap {
        width: u32,
        height: u32,
        cells: Vec<Terrain>,
    }

    #[test]
    fn test_short_map_is_payload_error() {
        let wire = WirePacket::new(
            tags::LOAD_MAP,
            &LooseMap {
                width: 10,
                height: 10,
                cells: Vec::new(),
            },
        )
        .unwrap();
        let err = ServerPacket::from_wire(wire).unwrap_err();
        assert!(matches!(err, NetError::Payload { ref tag, .. } if tag == "load-map"));
        assert!(err.is_packet_error());

        let good = through_wire(&ServerPacket::LoadMap(MapChunk::bordered(4, 3)));
        assert_eq!(good, ServerPacket::LoadMap(MapChunk::bordered(4, 3)));
    }

    #[test]
    fn test_unknown_tag() {
        let wire = WirePacket::new("teleport", &()).unwrap();
        let err = ServerPacket::from_wire(wire).unwrap_err();
        assert!(matches!(err, NetError::UnknownTag(ref t) if t == "teleport"));
        assert!(err.is_packet_error());
    }

    #[test]
    fn test_server_only_tag_unknown_to_server() {
        let wire = ServerPacket::NewEntity(alice()).to_wire().unwrap();
        assert!(matches!(
            ClientPacket::from_wire(wire),
            Err(NetError::UnknownTag(_))
        ));
    }

    #[test]
    fn test_action_direction_mapping() {
        for dir in Direction::ALL {
            assert_eq!(ActionCode::from_direction(dir).direction(), Some(dir));
        }
        assert_eq!(ActionCode::ListInventory.direction(), None);
    }
}
