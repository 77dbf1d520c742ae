//! Client session: handshake state machine and packet dispatcher.
//!
//! A [`Session`] owns the outbound half of the connection, the [`Mirror`]
//! and the chat log. Inbound packets are fed to [`Session::dispatch`] one at
//! a time, in arrival order, by the single loop that owns the session.
//!
//! ## Handshake
//!
//! ```text
//! Connecting --start--> Handshaking --get-player(known id)--> Synchronized
//!                            |  ^
//!                            +--+ get-player(unknown id): retry after a delay
//!
//! any state --inbound closed--> Disconnected
//! ```
//!
//! `new-entity`, `delete-entity`, `chat`, `load-map` and `action` updates are
//! applied in every connected state; nothing is deferred until the binding
//! is known.

use land_component::{Entity, EntityId};
use land_net::{ActionCode, ClientPacket, NetError, PacketSender, ServerPacket};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::mirror::Mirror;
use crate::render::ChatLog;

/// Where a session stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport established, nothing sent yet.
    Connecting,
    /// Login sent; the controlled entity is not bound yet.
    Handshaking,
    /// The controlled entity is bound.
    Synchronized,
    /// The inbound stream has ended. The session keeps running offline.
    Disconnected,
}

/// One client's view of one server connection.
#[derive(Debug)]
pub struct Session {
    config: ClientConfig,
    state: SessionState,
    mirror: Mirror,
    chat: ChatLog,
    sender: PacketSender<ClientPacket>,
    binding_retries: u32,
    /// Set once the inbound stream has ended; pending timers watch it.
    offline: watch::Sender<bool>,
}

impl Session {
    /// Create a session over an established transport.
    #[must_use]
    pub fn new(config: &ClientConfig, sender: PacketSender<ClientPacket>) -> Self {
        Self {
            config: config.clone(),
            state: SessionState::Connecting,
            mirror: Mirror::new(),
            chat: ChatLog::new(),
            sender,
            binding_retries: 0,
            offline: watch::channel(false).0,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The local world copy.
    #[must_use]
    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    /// Chat and status lines.
    #[must_use]
    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    /// How often the binding request has been repeated.
    #[must_use]
    pub fn binding_retries(&self) -> u32 {
        self.binding_retries
    }

    /// Log in, request the map, and schedule the binding request.
    ///
    /// The binding request is delayed by the configured handshake delay so
    /// that the server's announcement of our entity usually arrives first.
    pub fn start(&mut self) {
        if self.state != SessionState::Connecting {
            warn!(state = ?self.state, "session already started");
            return;
        }
        info!(username = self.config.username, "logging in");
        self.send(ClientPacket::Connect(self.config.username.clone()));
        self.send(ClientPacket::LoadMap);
        self.send_later(self.config.handshake_delay(), ClientPacket::GetPlayer);
        self.state = SessionState::Handshaking;
    }

    /// Apply one inbound item.
    ///
    /// Undecodable packets are logged and dropped; they never end the session.
    pub fn dispatch(&mut self, item: Result<ServerPacket, NetError>) {
        match item {
            Ok(packet) => self.handle(packet),
            Err(NetError::UnknownTag(tag)) => warn!(tag, "dropping packet with unknown tag"),
            Err(e) if e.is_packet_error() => warn!(%e, "dropping malformed packet"),
            Err(e) => warn!(%e, "dropping inbound error"),
        }
    }

    fn handle(&mut self, packet: ServerPacket) {
        if self.state == SessionState::Disconnected {
            debug!(?packet, "ignoring packet after disconnect");
            return;
        }
        match packet {
            ServerPacket::Chat(line) => self.chat.push(line),
            ServerPacket::Action(snapshot) => self.apply_update(&snapshot),
            ServerPacket::NewEntity(entity) => {
                debug!(id = %entity.id, name = entity.name, "entity appeared");
                self.mirror.insert(entity);
            }
            ServerPacket::DeleteEntity(entity) => {
                if self.mirror.remove(entity.id).is_none() {
                    debug!(id = %entity.id, "delete for untracked entity");
                }
            }
            ServerPacket::GetPlayer(id) => self.bind(id),
            ServerPacket::LoadMap(map) => {
                info!(width = map.width(), height = map.height(), "map loaded");
                self.mirror.set_map(map);
            }
        }
    }

    fn apply_update(&mut self, snapshot: &Entity) {
        if !self.mirror.set_position(snapshot.id, snapshot.position) {
            debug!(id = %snapshot.id, "ignoring update for unknown entity");
        }
    }

    fn bind(&mut self, id: EntityId) {
        if self.mirror.contains(id) {
            self.mirror.set_controlled(id);
            if self.state == SessionState::Handshaking {
                info!(%id, retries = self.binding_retries, "controlled entity bound");
                self.state = SessionState::Synchronized;
            }
            self.binding_retries = 0;
            return;
        }

        // The binding answer overtook the entity announcement; ask again.
        if self.binding_retries >= self.config.max_binding_retries {
            error!(%id, retries = self.binding_retries, "controlled entity never appeared, giving up");
            return;
        }
        self.binding_retries += 1;
        warn!(%id, attempt = self.binding_retries, "controlled entity not known yet, retrying");
        self.send_later(self.config.retry_delay(), ClientPacket::GetPlayer);
    }

    /// Perform a local player action.
    ///
    /// Moves are predicted locally when the cached terrain allows them; the
    /// action is sent to the server either way and the server's next update
    /// for our entity wins. Returns `true` if the local prediction moved the
    /// controlled entity.
    pub fn perform(&mut self, action: ActionCode) -> bool {
        if self.state == SessionState::Disconnected {
            debug!(?action, "offline, action ignored");
            return false;
        }
        let moved = action
            .direction()
            .is_some_and(|dir| self.mirror.try_move_controlled(dir));
        self.send(ClientPacket::Action(action));
        moved
    }

    /// Send a chat line.
    pub fn say(&mut self, text: impl Into<String>) {
        if self.state == SessionState::Disconnected {
            self.chat.push("Not connected.");
            return;
        }
        self.send(ClientPacket::Chat(text.into()));
    }

    /// The inbound stream has ended.
    pub fn disconnect(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        warn!(state = ?self.state, "disconnected from server");
        self.chat.push("Disconnected from server!");
        self.state = SessionState::Disconnected;
        self.offline.send_replace(true);
    }

    fn send(&self, packet: ClientPacket) {
        if let Err(e) = self.sender.send(packet) {
            debug!(%e, "outbound packet dropped");
        }
    }

    /// Send `packet` once after `delay` through the session's writer.
    ///
    /// The timer is cancelled if the session goes offline first. A timer
    /// that fires after the writer is gone only logs.
    fn send_later(&self, delay: Duration, packet: ClientPacket) {
        let sender = self.sender.clone();
        let mut offline = self.offline.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = offline.changed() => {
                    debug!(?packet, "offline, deferred packet cancelled");
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }
            if let Err(e) = sender.send(packet) {
                debug!(%e, "deferred packet dropped");
            }
        });
    }
}
