use std::fmt;

use dashmap::DashMap;
use indexmap::IndexMap;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::dto::events::ServerEvent;

/// Identifier of one live connection.
pub type ConnectionId = Uuid;

/// Broadcast group a connection can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    /// Every connection identified for the game.
    Game(Uuid),
    /// Connections of one player.
    Player(Uuid),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Game(id) => write!(f, "game:{id}"),
            Room::Player(id) => write!(f, "player:{id}"),
        }
    }
}

/// Room membership table for the event fan-out.
///
/// Broadcasting to a room takes that room's entry exclusively, so two events sent to
/// the same room reach every member in the same order.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<Room, IndexMap<ConnectionId, UnboundedSender<ServerEvent>>>,
}

impl RoomRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to each of `rooms`.
    pub fn join(
        &self,
        connection: ConnectionId,
        rooms: &[Room],
        sender: UnboundedSender<ServerEvent>,
    ) {
        for room in rooms {
            self.rooms
                .entry(*room)
                .or_default()
                .insert(connection, sender.clone());
        }
    }

    /// Drop a connection from each of `rooms`, forgetting rooms left empty.
    pub fn leave(&self, connection: ConnectionId, rooms: &[Room]) {
        for room in rooms {
            if let Some(mut members) = self.rooms.get_mut(room) {
                members.shift_remove(&connection);
            }
            self.rooms.remove_if(room, |_, members| members.is_empty());
        }
    }

    /// Deliver `event` to every member of `room`. Members whose receiver is gone are
    /// pruned. Returns the number of connections the event was queued for.
    pub fn broadcast(&self, room: Room, event: &ServerEvent) -> usize {
        let Some(mut members) = self.rooms.get_mut(&room) else {
            return 0;
        };
        members.retain(|_, sender| sender.send(event.clone()).is_ok());
        members.len()
    }

    #[cfg(test)]
    fn members(&self, room: Room) -> usize {
        self.rooms.get(&room).map_or(0, |members| members.len())
    }
}
