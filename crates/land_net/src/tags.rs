//! Packet tag vocabulary.
//!
//! Tags are shared by both directions; the payload shape depends on the tag
//! and on who sent it. See [`ClientPacket`](crate::ClientPacket) and
//! [`ServerPacket`](crate::ServerPacket).

/// Login request (C→S).
pub const CONNECT: &str = "connect";

/// Terrain grid request (C→S) and its reply (S→C).
pub const LOAD_MAP: &str = "load-map";

/// "Which entity do I control" (C→S) and its reply (S→C).
pub const GET_PLAYER: &str = "get-player";

/// Player intent (C→S) or authoritative entity update (S→C).
pub const ACTION: &str = "action";

/// Chat line, either direction.
pub const CHAT: &str = "chat";

/// An entity entered the world (S→C).
pub const NEW_ENTITY: &str = "new-entity";

/// An entity left the world (S→C).
pub const DELETE_ENTITY: &str = "delete-entity";
