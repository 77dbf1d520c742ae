//! # land_net
//!
//! Packet protocol and transport between the tile-world client and server.
//!
//! This crate provides:
//!
//! - [`tags`]: the packet tag vocabulary.
//! - [`packet`]: typed packets for each direction and the [`Packet`] trait
//!   mapping them to and from tagged wire units.
//! - [`codec`]: MessagePack serialisation and length-prefixed framing.
//! - [`transport`]: one reader task and one writer task per connection,
//!   exposed as a [`PacketReceiver`] / [`PacketSender`] pair.
//! - [`error`]: network-layer error types.

pub mod codec;
pub mod error;
pub mod packet;
pub mod tags;
pub mod transport;

pub use codec::{decode, encode};
pub use error::NetError;
pub use packet::{ActionCode, ClientPacket, Packet, ServerPacket, WirePacket};
pub use transport::{PacketReceiver, PacketSender, Transport};
