use super::connection::Binding;
use super::game::broadcast_snapshot;
use super::session::{Session, SessionPhase};
use super::AppState;
use crate::error::GameError;
use crate::protocol::ServerMessage;
use crate::token::TokenError;
use crate::types::*;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Where a new connection ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Lobby,
    Seat { game_id: GameId, player_id: PlayerId },
}

#[derive(Debug, thiserror::Error)]
enum ResumeError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Game(#[from] GameError),
}

impl AppState {
    /// Resolve a freshly registered connection to the lobby or a seat.
    ///
    /// A token that cannot be used earns an `invalid_token` and the socket
    /// carries on in the lobby.
    pub async fn route(&self, conn: ConnectionId, token: Option<&str>) -> Destination {
        if let Some(token) = token.filter(|t| has_chars(t)) {
            match self.resume(conn, token).await {
                Ok(destination) => return destination,
                Err(e) => {
                    tracing::warn!("Connection {} presented an unusable token: {}", conn, e);
                    self.send(conn, ServerMessage::InvalidToken).await;
                }
            }
        }

        self.enter_lobby(conn).await;
        Destination::Lobby
    }

    async fn enter_lobby(&self, conn: ConnectionId) {
        let games = self.available_games().await;
        let mut conns = self.connections.write().await;
        let identity = conns.bind_lobby(conn);
        conns.send(conn, ServerMessage::AvailableGames { games });
        tracing::info!("Connection {} entered the lobby as {}", conn, identity);
    }

    async fn resume(&self, conn: ConnectionId, token: &str) -> Result<Destination, ResumeError> {
        let claims = self.tokens.open(token)?;

        let session = match self.session(&claims.game_id).await {
            Some(session) => session,
            None => self
                .load_cached(&claims.game_id)
                .await
                .ok_or(GameError::GameNotFound)?,
        };
        let session = session.lock().await;
        // Finished while we waited for the lock; teardown is on its way
        if session.phase() == SessionPhase::Over {
            return Err(GameError::GameNotFound.into());
        }
        if !session.can_resume(&claims.user_id) {
            return Err(GameError::PlayerNotFound.into());
        }

        let mut conns = self.connections.write().await;
        if let Some(old) = conns.bind_seat(conn, &session.id, &claims.user_id) {
            tracing::info!("Connection {} replaced connection {} in its seat", conn, old);
            conns.close(old);
        }
        broadcast_snapshot(&session, &conns);

        tracing::info!(
            "Connection {} resumed seat {} in game {}",
            conn,
            claims.user_id,
            claims.game_id
        );
        Ok(Destination::Seat {
            game_id: claims.game_id,
            player_id: claims.user_id,
        })
    }

    /// Bring a running game back from the cache after a restart
    async fn load_cached(&self, game_id: &str) -> Option<Arc<Mutex<Session>>> {
        let cache = self.cache.as_ref()?;
        let session = match cache.get(game_id).await {
            Ok(Some(session)) if session.phase() == SessionPhase::Active => session,
            Ok(_) => return None,
            Err(e) => {
                tracing::warn!("Failed to read cached game {}: {}", game_id, e);
                return None;
            }
        };

        tracing::info!("Restored game {} from the {} cache", game_id, cache.name());
        let mut games = self.games.write().await;
        // Another connection may have restored it first
        let handle = games
            .entry(game_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(session)));
        Some(handle.clone())
    }

    /// Forget a socket that went away. Its seat stays resumable.
    pub async fn disconnect(&self, conn: ConnectionId) {
        let binding = self.connections.write().await.remove(conn);
        tracing::info!("Connection {} closed", conn);

        let Some(Binding::Seat { game_id, .. }) = binding else {
            return;
        };
        if let Some(session) = self.session(&game_id).await {
            let session = session.lock().await;
            let conns = self.connections.read().await;
            broadcast_snapshot(&session, &conns);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::connection::Outbound;
    use super::super::test_support::*;
    use super::super::SessionAction;
    use super::*;
    use crate::cache::{GameCache, MemoryCache};
    use crate::protocol::GameView;
    use crate::token::{TokenClaims, TokenCodec};
    use std::time::Duration;

    fn snapshot(messages: &[ServerMessage]) -> Option<&GameView> {
        messages.iter().rev().find_map(|m| match m {
            ServerMessage::GameState { game } => Some(game),
            _ => None,
        })
    }

    #[tokio::test]
    async fn test_no_token_goes_to_lobby() {
        let state = AppState::default();
        let (conn, mut rx) = state.connect().await;

        assert_eq!(state.route(conn, None).await, Destination::Lobby);
        assert_eq!(
            drain(&mut rx),
            vec![ServerMessage::AvailableGames { games: vec![] }]
        );

        let (blank, mut rx) = state.connect().await;
        assert_eq!(state.route(blank, Some("  ")).await, Destination::Lobby);
        assert!(!drain(&mut rx).contains(&ServerMessage::InvalidToken));
    }

    #[tokio::test]
    async fn test_garbage_token_falls_back_to_lobby() {
        let state = AppState::default();
        let (conn, mut rx) = state.connect().await;

        assert_eq!(state.route(conn, Some("not-a-token")).await, Destination::Lobby);
        let messages = drain(&mut rx);
        assert_eq!(messages[0], ServerMessage::InvalidToken);
        assert!(matches!(messages[1], ServerMessage::AvailableGames { .. }));
    }

    #[tokio::test]
    async fn test_token_from_other_secret_rejected() {
        let state = AppState::new(TokenCodec::new("ours"));
        let token = TokenCodec::new("theirs")
            .seal(&TokenClaims::new("g", "u"))
            .unwrap();
        let (conn, mut rx) = state.connect().await;

        assert_eq!(state.route(conn, Some(&token)).await, Destination::Lobby);
        assert_eq!(drain(&mut rx)[0], ServerMessage::InvalidToken);
    }

    #[tokio::test]
    async fn test_token_for_missing_game_or_player() {
        let state = AppState::default();
        let (host, mut host_rx) = lobby_socket(&state).await;
        let game_id = state.create_game(host, "Amy".to_string()).await.unwrap();
        drain(&mut host_rx);

        let stale_game = state.tokens.seal(&TokenClaims::new("gone", "u")).unwrap();
        let (a, mut a_rx) = state.connect().await;
        assert_eq!(state.route(a, Some(&stale_game)).await, Destination::Lobby);
        assert_eq!(drain(&mut a_rx)[0], ServerMessage::InvalidToken);

        let stranger = state
            .tokens
            .seal(&TokenClaims::new(game_id.clone(), "stranger"))
            .unwrap();
        let (b, mut b_rx) = state.connect().await;
        assert_eq!(state.route(b, Some(&stranger)).await, Destination::Lobby);
        assert_eq!(drain(&mut b_rx)[0], ServerMessage::InvalidToken);

        // The host never heard about either attempt
        assert!(drain(&mut host_rx).is_empty());
    }

    #[tokio::test]
    async fn test_reconnect_resumes_seat() {
        let state = AppState::default();
        let (first, mut first_rx) = lobby_socket(&state).await;
        let game_id = state.create_game(first, "Amy".to_string()).await.unwrap();
        let token = token_of(&drain(&mut first_rx)).unwrap();

        state.disconnect(first).await;
        let session = state.session(&game_id).await.unwrap();
        let amy_id = session.lock().await.players[0].id.clone();
        assert!(!state.connections.read().await.is_connected(&amy_id));

        let (second, mut second_rx) = state.connect().await;
        assert_eq!(
            state.route(second, Some(&token)).await,
            Destination::Seat {
                game_id: game_id.clone(),
                player_id: amy_id.clone()
            }
        );
        match snapshot(&drain(&mut second_rx)) {
            Some(GameView::Pending(game)) => assert!(game.players[0].connected),
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_socket_replaces_first() {
        let state = AppState::default();
        let (first, mut first_rx) = lobby_socket(&state).await;
        state.create_game(first, "Amy".to_string()).await.unwrap();
        let token = token_of(&drain(&mut first_rx)).unwrap();

        let (second, _second_rx) = state.connect().await;
        state.route(second, Some(&token)).await;

        let mut closed = false;
        while let Ok(outbound) = first_rx.try_recv() {
            closed |= outbound == Outbound::Close;
        }
        assert!(closed);

        // The old socket finally going away leaves the new one seated
        state.disconnect(first).await;
        let conns = state.connections.read().await;
        assert!(matches!(conns.binding(second), Some(Binding::Seat { .. })));
    }

    #[tokio::test]
    async fn test_presence_is_broadcast() {
        let state = AppState::default();
        let (host, mut host_rx) = lobby_socket(&state).await;
        let (guest, mut guest_rx) = lobby_socket(&state).await;
        let game_id = state.create_game(host, "Amy".to_string()).await.unwrap();
        state
            .request_to_join(guest, &game_id, "Ben".to_string(), None)
            .await
            .unwrap();
        drain(&mut host_rx);
        drain(&mut guest_rx);

        state.disconnect(guest).await;
        match snapshot(&drain(&mut host_rx)) {
            Some(GameView::Pending(game)) => {
                assert!(game.players[0].connected);
                assert!(!game.players[1].connected);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_left_player_cannot_resume() {
        let state = AppState::default();
        let (host, mut host_rx) = lobby_socket(&state).await;
        let (guest, mut guest_rx) = lobby_socket(&state).await;
        let (third, mut third_rx) = lobby_socket(&state).await;
        let game_id = state.create_game(host, "Amy".to_string()).await.unwrap();
        let ben_id = state
            .request_to_join(guest, &game_id, "Ben".to_string(), None)
            .await
            .unwrap();
        let cat_id = state
            .request_to_join(third, &game_id, "Cat".to_string(), None)
            .await
            .unwrap();
        state
            .apply(host, SessionAction::AcceptJoinRequest(ben_id))
            .await
            .unwrap();
        state
            .apply(host, SessionAction::AcceptJoinRequest(cat_id))
            .await
            .unwrap();
        state.apply(host, SessionAction::Start).await.unwrap();
        drain(&mut host_rx);
        let ben_token = token_of(&drain(&mut guest_rx)).unwrap();
        drain(&mut third_rx);

        state.apply(guest, SessionAction::Leave).await.unwrap();

        let (back, mut back_rx) = state.connect().await;
        assert_eq!(state.route(back, Some(&ben_token)).await, Destination::Lobby);
        assert_eq!(drain(&mut back_rx)[0], ServerMessage::InvalidToken);
    }

    #[tokio::test]
    async fn test_finished_game_cannot_be_resumed() {
        let state = AppState::default();
        let (host, mut host_rx) = lobby_socket(&state).await;
        let (guest, _guest_rx) = lobby_socket(&state).await;
        let game_id = state.create_game(host, "Amy".to_string()).await.unwrap();
        let ben_id = state
            .request_to_join(guest, &game_id, "Ben".to_string(), None)
            .await
            .unwrap();
        state
            .apply(host, SessionAction::AcceptJoinRequest(ben_id))
            .await
            .unwrap();
        state.apply(host, SessionAction::Start).await.unwrap();
        let token = token_of(&drain(&mut host_rx)).unwrap();

        // Game decided but not yet torn down
        let session = state.session(&game_id).await.unwrap();
        {
            let mut session = session.lock().await;
            session.turn = None;
            session.winner = Some(session.players[0].id.clone());
        }

        let (conn, mut rx) = state.connect().await;
        assert_eq!(state.route(conn, Some(&token)).await, Destination::Lobby);
        assert_eq!(drain(&mut rx)[0], ServerMessage::InvalidToken);
        let conns = state.connections.read().await;
        assert!(matches!(conns.binding(conn), Some(Binding::Lobby { .. })));
    }

    #[tokio::test]
    async fn test_reconnect_reads_through_cache() {
        let cache = Arc::new(MemoryCache::new(Duration::from_secs(60)));
        let codec_secret = "shared-secret";

        // First process: start a game and cache it
        let before = AppState::new(TokenCodec::new(codec_secret)).with_cache(cache.clone());
        let (host, mut host_rx) = lobby_socket(&before).await;
        let (guest, _guest_rx) = lobby_socket(&before).await;
        let game_id = before.create_game(host, "Amy".to_string()).await.unwrap();
        let ben_id = before
            .request_to_join(guest, &game_id, "Ben".to_string(), None)
            .await
            .unwrap();
        before
            .apply(host, SessionAction::AcceptJoinRequest(ben_id))
            .await
            .unwrap();
        before.apply(host, SessionAction::Start).await.unwrap();
        let token = token_of(&drain(&mut host_rx)).unwrap();
        assert!(cache.get(&game_id).await.unwrap().is_some());

        // Second process: nothing in memory, same secret and cache
        let after = AppState::new(TokenCodec::new(codec_secret)).with_cache(cache.clone());
        let (conn, mut rx) = after.connect().await;
        assert!(matches!(
            after.route(conn, Some(&token)).await,
            Destination::Seat { .. }
        ));
        assert!(after.session(&game_id).await.is_some());
        match snapshot(&drain(&mut rx)) {
            Some(GameView::Started(game)) => {
                assert_eq!(game.players.len(), 2);
                assert!(game.players[0].connected);
                assert!(!game.players[1].connected);
            }
            other => panic!("expected started snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pending_games_are_not_restored() {
        let cache = Arc::new(MemoryCache::new(Duration::from_secs(60)));
        let session = Session::new("g1".to_string(), Player::new("amy".to_string(), "Amy".to_string()));
        cache.set(&session).await.unwrap();

        let state = AppState::default().with_cache(cache);
        let token = state.tokens.seal(&TokenClaims::new("g1", "amy")).unwrap();
        let (conn, _rx) = state.connect().await;
        assert_eq!(state.route(conn, Some(&token)).await, Destination::Lobby);
        assert!(state.session("g1").await.is_none());
    }
}
