//! The authoritative game world and per-packet handling.
//!
//! [`World`] ties the shared [`Scene`] to the terrain and the table of
//! connected clients. Each connection's packets are handled in arrival order
//! by [`World::handle`]; everything a handler sends to its own client is
//! queued on that client's single outbound stream, so a client always sees
//! its player's `new-entity` before the `get-player` answer naming it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use land_component::{
    Entity, EntityAllocator, EntityId, MapChunk, Passable, Property, PropertyType,
};
use land_math::{Direction, Position};
use land_net::{ActionCode, ClientPacket, PacketSender, ServerPacket};
use land_scene::Scene;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;

/// Tag carried by everything clients should draw.
pub const VISIBLE_TAG: &str = "visible";

/// Glyph of player entities.
pub const PLAYER_GLYPH: char = '@';

/// One connected client.
#[derive(Debug)]
struct ClientHandle {
    sender: PacketSender<ServerPacket>,
    login: Option<Login>,
}

#[derive(Debug, Clone)]
struct Login {
    username: String,
    player: EntityId,
}

/// Shared server state.
#[derive(Debug)]
pub struct World {
    scene: Arc<Scene>,
    map: MapChunk,
    ids: EntityAllocator,
    clients: DashMap<Uuid, ClientHandle>,
    /// Claimed usernames and the connection holding each.
    usernames: DashMap<String, Uuid>,
    /// Held while fanning a packet out and while a newcomer subscribes, so a
    /// login snapshot never interleaves with a broadcast.
    fanout: Mutex<()>,
}

impl World {
    /// Create an empty world over `map`.
    #[must_use]
    pub fn new(map: MapChunk) -> Self {
        Self {
            scene: Arc::new(Scene::new()),
            map,
            ids: EntityAllocator::new(),
            clients: DashMap::new(),
            usernames: DashMap::new(),
            fanout: Mutex::new(()),
        }
    }

    /// Build the map and the initial population from `config`.
    ///
    /// Entities configured on impassable cells are skipped with a warning.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        let world = Self::new(config.build_map());
        for item in &config.items {
            let mut entity = Entity::new(world.ids.allocate())
                .named(item.name.clone())
                .with_glyph(item.glyph)
                .at(Position::from(item.at))
                .with_property(Property::Item {
                    name: item.name.clone(),
                })
                .with_tag(VISIBLE_TAG);
            if item.gettable {
                entity.insert_property(Property::Gettable);
            }
            world.place(entity);
        }
        for wanderer in &config.wanderers {
            let entity = Entity::new(world.ids.allocate())
                .named(wanderer.name.clone())
                .with_glyph(wanderer.glyph)
                .at(Position::from(wanderer.at))
                .with_property(Property::Wanderer {
                    period_ticks: wanderer.period_ticks,
                })
                .with_tag(VISIBLE_TAG);
            world.place(entity);
        }
        info!(
            entities = world.scene.len(),
            width = world.map.width(),
            height = world.map.height(),
            "world populated"
        );
        world
    }

    fn place(&self, entity: Entity) {
        if !self.map.is_passable(entity.position) {
            warn!(name = entity.name, position = ?entity.position, "not placing entity on impassable cell");
            return;
        }
        if let Err(e) = self.scene.spawn(entity) {
            warn!(%e, "initial entity rejected");
        }
    }

    /// The shared scene.
    #[must_use]
    pub fn scene(&self) -> &Arc<Scene> {
        &self.scene
    }

    /// The terrain grid.
    #[must_use]
    pub fn map(&self) -> &MapChunk {
        &self.map
    }

    /// Number of connected clients, logged in or not.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Track a new connection.
    pub fn register(&self, conn: Uuid, sender: PacketSender<ServerPacket>) {
        debug!(%conn, "client registered");
        self.clients.insert(conn, ClientHandle { sender, login: None });
    }

    /// Forget a connection and remove its player from the world.
    pub fn disconnect(&self, conn: Uuid) {
        let Some((_, handle)) = self.clients.remove(&conn) else {
            return;
        };
        let Some(login) = handle.login else {
            info!(%conn, "client left before logging in");
            return;
        };
        info!(%conn, username = login.username, "player left");
        self.usernames.remove_if(&login.username, |_, holder| *holder == conn);
        if let Some(player) = self.scene.remove(login.player) {
            self.broadcast(&ServerPacket::DeleteEntity(player));
        }
        self.broadcast(&ServerPacket::Chat(format!("{} has left.", login.username)));
    }

    /// Queue `packet` for every logged-in client.
    pub fn broadcast(&self, packet: &ServerPacket) {
        let _order = self.lock_fanout();
        for client in self.clients.iter() {
            if client.login.is_some() {
                let _ = client.sender.send(packet.clone());
            }
        }
    }

    fn lock_fanout(&self) -> MutexGuard<'_, ()> {
        self.fanout.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send_to(&self, conn: Uuid, packet: ServerPacket) {
        match self.clients.get(&conn) {
            Some(client) => {
                if let Err(e) = client.sender.send(packet) {
                    debug!(%conn, %e, "reply dropped");
                }
            }
            None => debug!(%conn, "reply to unknown connection"),
        }
    }

    fn tell(&self, conn: Uuid, text: impl Into<String>) {
        self.send_to(conn, ServerPacket::Chat(text.into()));
    }

    fn login(&self, conn: Uuid) -> Option<Login> {
        self.clients.get(&conn).and_then(|c| c.login.clone())
    }

    /// Handle one packet from `conn`.
    pub fn handle(&self, conn: Uuid, packet: ClientPacket) {
        match packet {
            ClientPacket::Connect(username) => self.connect(conn, username),
            ClientPacket::LoadMap => self.send_to(conn, ServerPacket::LoadMap(self.map.clone())),
            ClientPacket::GetPlayer => match self.login(conn) {
                Some(login) => self.send_to(conn, ServerPacket::GetPlayer(login.player)),
                None => warn!(%conn, "get-player before login"),
            },
            ClientPacket::Action(action) => match self.login(conn) {
                Some(login) => self.act(conn, &login, action),
                None => warn!(%conn, ?action, "action before login"),
            },
            ClientPacket::Chat(text) => match self.login(conn) {
                Some(login) if !text.trim().is_empty() => {
                    self.broadcast(&ServerPacket::Chat(format!("{}: {}", login.username, text.trim())));
                }
                Some(_) => {}
                None => warn!(%conn, "chat before login"),
            },
        }
    }

    fn connect(&self, conn: Uuid, username: String) {
        let username = username.trim().to_string();
        if self.login(conn).is_some() {
            self.tell(conn, "You are already logged in.");
            return;
        }
        if username.is_empty() {
            self.tell(conn, "A username is required.");
            return;
        }
        let Some(spawn) = self.map.spawn_point() else {
            warn!(%conn, "no passable cell to spawn on");
            self.tell(conn, "There is no room for you here.");
            return;
        };
        match self.usernames.entry(username.clone()) {
            Entry::Occupied(_) => {
                self.tell(conn, format!("The name {username} is taken."));
                return;
            }
            Entry::Vacant(slot) => {
                slot.insert(conn);
            }
        }

        let id = self.ids.allocate();
        if !self.subscribe(conn, &username, id) {
            self.usernames.remove_if(&username, |_, holder| *holder == conn);
            return;
        }

        let player = Entity::new(id)
            .named(username.clone())
            .with_glyph(PLAYER_GLYPH)
            .at(spawn)
            .with_property(Property::Player {
                username: username.clone(),
            })
            .with_property(Property::Inventory { items: Vec::new() })
            .with_tag(VISIBLE_TAG);
        if let Err(e) = self.scene.spawn(player.clone()) {
            warn!(%conn, %e, "player entity rejected");
            if let Some(mut client) = self.clients.get_mut(&conn) {
                client.login = None;
            }
            self.usernames.remove_if(&username, |_, holder| *holder == conn);
            return;
        }

        info!(%conn, username, %id, "player joined");
        self.broadcast(&ServerPacket::NewEntity(player));
        self.tell(conn, format!("Welcome, {username}!"));
    }

    /// Log `conn` in as `player` and send it the current scene.
    ///
    /// The login is recorded before the snapshot is taken, both under the
    /// fan-out lock: every later broadcast reaches the newcomer and queues
    /// behind the snapshot. Returns `false` if the connection is gone.
    fn subscribe(&self, conn: Uuid, username: &str, player: EntityId) -> bool {
        let _order = self.lock_fanout();
        match self.clients.get_mut(&conn) {
            Some(mut client) => {
                client.login = Some(Login {
                    username: username.to_string(),
                    player,
                });
            }
            None => return false,
        }
        for entity in self.scene.entities() {
            self.send_to(conn, ServerPacket::NewEntity(entity));
        }
        true
    }

    fn act(&self, conn: Uuid, login: &Login, action: ActionCode) {
        if let Some(direction) = action.direction() {
            self.step(login.player, direction);
            return;
        }
        match action {
            ActionCode::ItemPickup => self.pick_up(conn, login.player),
            ActionCode::ItemDrop => self.drop_item(conn, login.player),
            ActionCode::ListInventory => self.list_inventory(conn, login.player),
            _ => {}
        }
    }

    /// Move `id` one cell if the target is passable and broadcast the new
    /// snapshot. Returns `true` if it moved.
    pub fn step(&self, id: EntityId, direction: Direction) -> bool {
        let moved = self.scene.update(id, |entity| {
            let target = direction.step(entity.position);
            self.map.is_passable(target).then(|| {
                entity.position = target;
                entity.clone()
            })
        });
        match moved {
            Ok(Some(snapshot)) => {
                self.broadcast(&ServerPacket::Action(snapshot));
                true
            }
            Ok(None) => false,
            Err(e) => {
                debug!(%e, "step for missing entity");
                false
            }
        }
    }

    fn position_of(&self, id: EntityId) -> Option<Position> {
        self.scene.get(id).map(|e| e.position)
    }

    fn pick_up(&self, conn: Uuid, player: EntityId) {
        let Some(here) = self.position_of(player) else {
            return;
        };
        let Some(item) = self
            .scene
            .find(&[PropertyType::Item, PropertyType::Gettable])
            .into_iter()
            .find(|e| e.position == here)
        else {
            self.tell(conn, "There is nothing here to pick up.");
            return;
        };
        let Some(item) = self.scene.remove(item.id) else {
            // Someone else got it first.
            self.tell(conn, "There is nothing here to pick up.");
            return;
        };
        self.broadcast(&ServerPacket::DeleteEntity(item.clone()));
        let name = item_name(&item).to_string();
        if let Err(e) = self.scene.update(player, |e| {
            if let Some(items) = inventory_mut(e) {
                items.push(item);
            }
        }) {
            debug!(%e, "picker vanished");
            return;
        }
        self.tell(conn, format!("You pick up the {name}."));
    }

    fn drop_item(&self, conn: Uuid, player: EntityId) {
        let dropped = self.scene.update(player, |e| {
            let here = e.position;
            inventory_mut(e).and_then(Vec::pop).map(|item| item.at(here))
        });
        let Ok(Some(item)) = dropped else {
            self.tell(conn, "You are not carrying anything.");
            return;
        };
        let name = item_name(&item).to_string();
        if let Err(e) = self.scene.spawn(item.clone()) {
            warn!(%e, "dropped item rejected");
            return;
        }
        self.broadcast(&ServerPacket::NewEntity(item));
        self.tell(conn, format!("You drop the {name}."));
    }

    fn list_inventory(&self, conn: Uuid, player: EntityId) {
        let names: Vec<String> = self
            .scene
            .get(player)
            .and_then(|e| match e.property(PropertyType::Inventory) {
                Some(Property::Inventory { items }) => {
                    Some(items.iter().map(|i| item_name(i).to_string()).collect())
                }
                _ => None,
            })
            .unwrap_or_default();
        if names.is_empty() {
            self.tell(conn, "You are carrying nothing.");
        } else {
            self.tell(conn, format!("You are carrying: {}.", names.join(", ")));
        }
    }
}

fn item_name(entity: &Entity) -> &str {
    match entity.property(PropertyType::Item) {
        Some(Property::Item { name }) => name,
        _ => &entity.name,
    }
}

fn inventory_mut(entity: &mut Entity) -> Option<&mut Vec<Entity>> {
    match entity.property_mut(PropertyType::Inventory) {
        Some(Property::Inventory { items }) => Some(items),
        _ => None,
    }
}
