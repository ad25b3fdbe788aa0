use super::connection::Binding;
use super::game::broadcast_snapshot;
use super::session::{clean_message, clean_name, Session};
use super::AppState;
use crate::error::GameError;
use crate::protocol::{AvailableGame, GameView, ServerMessage};
use crate::token::TokenClaims;
use crate::types::*;
use std::sync::Arc;
use tokio::sync::Mutex;

impl AppState {
    /// Games that can still be joined, oldest first
    pub async fn available_games(&self) -> Vec<AvailableGame> {
        self.listings
            .read()
            .await
            .iter()
            .map(|(id, creator_name)| AvailableGame {
                id: id.clone(),
                creator_name: creator_name.clone(),
            })
            .collect()
    }

    pub async fn broadcast_available_games(&self) {
        let games = self.available_games().await;
        let conns = self.connections.read().await;
        let lobby: Vec<ConnectionId> = conns.lobby().collect();
        for conn in &lobby {
            conns.send(
                *conn,
                ServerMessage::AvailableGames {
                    games: games.clone(),
                },
            );
        }
        tracing::debug!("Sent {} games to {} lobby connections", games.len(), lobby.len());
    }

    async fn require_lobby(&self, conn: ConnectionId) -> Result<(), GameError> {
        match self.connections.read().await.binding(conn) {
            Some(Binding::Lobby { .. }) => Ok(()),
            Some(Binding::Seat { .. }) => Err(GameError::AlreadyInGame),
            None => Err(GameError::NotInGame),
        }
    }

    fn mint_token(&self, game_id: &str, player_id: &str, name: &str) -> Result<String, GameError> {
        self.tokens
            .seal(&TokenClaims::new(game_id, player_id).with_name(name))
            .map_err(|e| {
                tracing::warn!("Failed to seal token for game {}: {}", game_id, e);
                GameError::TokenUnavailable
            })
    }

    /// Start a new game hosted by the lobby socket `conn`
    pub async fn create_game(&self, conn: ConnectionId, name: String) -> Result<GameId, GameError> {
        let name = clean_name(&name)?;
        self.require_lobby(conn).await?;

        let game_id = ulid::Ulid::new().to_string();
        let player_id = ulid::Ulid::new().to_string();
        let token = self.mint_token(&game_id, &player_id, &name)?;

        let session = Session::new(game_id.clone(), Player::new(player_id.clone(), name.clone()));
        let handle = Arc::new(Mutex::new(session));
        let session = handle.lock().await;
        self.games.write().await.insert(game_id.clone(), handle.clone());
        self.sync_listing(&session).await;

        {
            let mut conns = self.connections.write().await;
            conns.bind_seat(conn, &game_id, &player_id);
            conns.send(conn, ServerMessage::Token { token });
            conns.send(
                conn,
                ServerMessage::GameState {
                    game: GameView::of(&session, |id| conns.is_connected(id)),
                },
            );
        }
        drop(session);

        tracing::info!("{} created game {}", name, game_id);
        self.broadcast_available_games().await;
        Ok(game_id)
    }

    /// Ask to join a pending game from the lobby socket `conn`
    pub async fn request_to_join(
        &self,
        conn: ConnectionId,
        game_id: &str,
        name: String,
        message: Option<String>,
    ) -> Result<PlayerId, GameError> {
        let name = clean_name(&name)?;
        let message = clean_message(message)?;
        self.require_lobby(conn).await?;

        let session = self
            .session(game_id)
            .await
            .ok_or(GameError::GameNotFound)?;
        let mut session = session.lock().await;
        if session.started {
            return Err(GameError::AlreadyStarted);
        }

        let player_id = ulid::Ulid::new().to_string();
        let token = self.mint_token(game_id, &player_id, &name)?;
        session.request_to_join(Player::requesting(player_id.clone(), name, message))?;

        let mut conns = self.connections.write().await;
        conns.bind_seat(conn, game_id, &player_id);
        conns.send(conn, ServerMessage::Token { token });
        broadcast_snapshot(&session, &conns);

        Ok(player_id)
    }
}
