//! Connection registry
//!
//! Keeps socket identity apart from game state: which channel reaches a
//! connection, what it is bound to (lobby or a seat), which connection holds a
//! seat, and whether it answered the last liveness probe.

use std::collections::HashMap;
use tokio::sync::mpsc;

use crate::protocol::ServerMessage;
use crate::types::*;

/// What the socket task should do next
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Message(ServerMessage),
    Ping,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// Unassigned socket with a throwaway identity
    Lobby { identity: String },
    Seat { game_id: GameId, player_id: PlayerId },
}

#[derive(Debug, Default)]
pub struct ConnectionTable {
    senders: HashMap<ConnectionId, mpsc::UnboundedSender<Outbound>>,
    bindings: HashMap<ConnectionId, Binding>,
    seats: HashMap<PlayerId, ConnectionId>,
    /// Whether the connection answered since the last probe
    liveness: HashMap<ConnectionId, bool>,
}

impl ConnectionTable {
    pub fn insert(&mut self, conn: ConnectionId, sender: mpsc::UnboundedSender<Outbound>) {
        self.senders.insert(conn, sender);
        self.liveness.insert(conn, true);
    }

    /// Forget a connection entirely, returning what it was bound to
    pub fn remove(&mut self, conn: ConnectionId) -> Option<Binding> {
        self.senders.remove(&conn);
        self.liveness.remove(&conn);
        self.unbind(conn)
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    pub fn binding(&self, conn: ConnectionId) -> Option<&Binding> {
        self.bindings.get(&conn)
    }

    fn unbind(&mut self, conn: ConnectionId) -> Option<Binding> {
        let binding = self.bindings.remove(&conn)?;
        if let Binding::Seat { player_id, .. } = &binding {
            // A newer socket may already hold the seat
            if self.seats.get(player_id) == Some(&conn) {
                self.seats.remove(player_id);
            }
        }
        Some(binding)
    }

    /// Move a connection into the lobby under a fresh identity
    pub fn bind_lobby(&mut self, conn: ConnectionId) -> String {
        self.unbind(conn);
        let identity = ulid::Ulid::new().to_string();
        self.bindings.insert(
            conn,
            Binding::Lobby {
                identity: identity.clone(),
            },
        );
        identity
    }

    /// Bind a connection to a seat. Returns the connection that held the seat
    /// before, which is left unbound.
    pub fn bind_seat(
        &mut self,
        conn: ConnectionId,
        game_id: &str,
        player_id: &str,
    ) -> Option<ConnectionId> {
        self.unbind(conn);
        self.bindings.insert(
            conn,
            Binding::Seat {
                game_id: game_id.to_string(),
                player_id: player_id.to_string(),
            },
        );

        let displaced = self
            .seats
            .insert(player_id.to_string(), conn)
            .filter(|&old| old != conn)?;
        self.bindings.remove(&displaced);
        Some(displaced)
    }

    pub fn seat(&self, player_id: &str) -> Option<ConnectionId> {
        self.seats.get(player_id).copied()
    }

    pub fn is_connected(&self, player_id: &str) -> bool {
        self.seats.contains_key(player_id)
    }

    pub fn lobby(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.bindings.iter().filter_map(|(&conn, binding)| match binding {
            Binding::Lobby { .. } => Some(conn),
            Binding::Seat { .. } => None,
        })
    }

    fn push(&self, conn: ConnectionId, outbound: Outbound) -> bool {
        match self.senders.get(&conn) {
            Some(sender) => sender.send(outbound).is_ok(),
            None => false,
        }
    }

    pub fn send(&self, conn: ConnectionId, msg: ServerMessage) -> bool {
        let sent = self.push(conn, Outbound::Message(msg));
        if !sent {
            tracing::warn!("Dropped message for connection {}", conn);
        }
        sent
    }

    /// Send to whichever connection holds the player's seat, if any
    pub fn send_to_player(&self, player_id: &str, msg: ServerMessage) -> bool {
        match self.seat(player_id) {
            Some(conn) => self.send(conn, msg),
            None => false,
        }
    }

    pub fn close(&self, conn: ConnectionId) {
        self.push(conn, Outbound::Close);
    }

    pub fn mark_alive(&mut self, conn: ConnectionId) {
        if let Some(alive) = self.liveness.get_mut(&conn) {
            *alive = true;
        }
    }

    /// Ping every connection that answered the previous probe and return the
    /// ones that did not.
    pub fn probe(&mut self) -> Vec<ConnectionId> {
        let mut dead = Vec::new();
        for (&conn, alive) in self.liveness.iter_mut() {
            if *alive {
                *alive = false;
                if let Some(sender) = self.senders.get(&conn) {
                    let _ = sender.send(Outbound::Ping);
                }
            } else {
                dead.push(conn);
            }
        }
        dead
    }
}
