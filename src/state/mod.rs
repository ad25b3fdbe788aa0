pub mod connection;
mod game;
mod liveness;
mod lobby;
mod router;
pub mod session;
pub mod turn;

pub use game::SessionAction;
pub use router::Destination;

use crate::cache::GameCache;
use crate::protocol::ServerMessage;
use crate::token::TokenCodec;
use crate::types::*;
use connection::{ConnectionTable, Outbound};
use session::Session;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};

/// Shared application state
///
/// Lock order: a session's mutex is taken before any of the maps below, and
/// never while one of them is held.
#[derive(Clone)]
pub struct AppState {
    /// Live sessions; each one is mutated by one task at a time
    pub games: Arc<RwLock<HashMap<GameId, Arc<Mutex<Session>>>>>,
    /// Joinable games and their creator names, kept in step with `games`
    pub listings: Arc<RwLock<BTreeMap<GameId, String>>>,
    pub connections: Arc<RwLock<ConnectionTable>>,
    pub tokens: Arc<TokenCodec>,
    pub cache: Option<Arc<dyn GameCache>>,
    next_connection: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(tokens: TokenCodec) -> Self {
        Self {
            games: Arc::new(RwLock::new(HashMap::new())),
            listings: Arc::new(RwLock::new(BTreeMap::new())),
            connections: Arc::new(RwLock::new(ConnectionTable::default())),
            tokens: Arc::new(tokens),
            cache: None,
            next_connection: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn GameCache>) -> Self {
        tracing::info!("Game state cache: {}", cache.name());
        self.cache = Some(cache);
        self
    }

    /// Register a new socket and hand back the channel it should drain
    pub async fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<Outbound>) {
        let conn = self.next_connection.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.write().await.insert(conn, tx);
        tracing::debug!("Connection {} registered", conn);
        (conn, rx)
    }

    pub async fn session(&self, game_id: &str) -> Option<Arc<Mutex<Session>>> {
        self.games.read().await.get(game_id).cloned()
    }

    pub async fn send(&self, conn: ConnectionId, msg: ServerMessage) -> bool {
        self.connections.read().await.send(conn, msg)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(TokenCodec::ephemeral())
    }
}
