use super::connection::{Binding, ConnectionTable};
use super::session::{Dismissal, Session, SessionEvent, SessionPhase};
use super::AppState;
use crate::error::GameError;
use crate::protocol::{GameView, ServerMessage};
use crate::types::*;

/// Something a seated player asks their session to do
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    AcceptJoinRequest(PlayerId),
    DenyJoinRequest(PlayerId),
    Start,
    Leave,
    PlayMove(Page),
    Challenge,
    GiveUp,
    MarkAnswerCorrect,
    MarkAnswerIncorrect,
}

/// Push a snapshot to every member whose seat has a live socket
pub(super) fn broadcast_snapshot(session: &Session, conns: &ConnectionTable) {
    let view = GameView::of(session, |id| conns.is_connected(id));
    for player in &session.players {
        conns.send_to_player(
            &player.id,
            ServerMessage::GameState { game: view.clone() },
        );
    }
}

impl AppState {
    /// Run an action for the player seated on `conn` and deliver the results
    pub async fn apply(&self, conn: ConnectionId, action: SessionAction) -> Result<(), GameError> {
        let (game_id, player_id) = match self.connections.read().await.binding(conn) {
            Some(Binding::Seat { game_id, player_id }) => (game_id.clone(), player_id.clone()),
            _ => return Err(GameError::NotInGame),
        };
        let session = self
            .session(&game_id)
            .await
            .ok_or(GameError::GameNotFound)?;
        let mut session = session.lock().await;

        let actor = player_id.as_str();
        let events = match action {
            SessionAction::AcceptJoinRequest(user_id) => {
                session.accept_join_request(actor, &user_id)
            }
            SessionAction::DenyJoinRequest(user_id) => session.deny_join_request(actor, &user_id),
            SessionAction::Start => session.start(actor),
            SessionAction::Leave => session.leave(actor),
            SessionAction::PlayMove(page) => session.play_move(actor, page),
            SessionAction::Challenge => session.challenge(actor),
            SessionAction::GiveUp => session.give_up(actor),
            SessionAction::MarkAnswerCorrect => session.mark_answer_correct(actor),
            SessionAction::MarkAnswerIncorrect => session.mark_answer_incorrect(actor),
        }?;

        self.settle(&session, events).await;
        Ok(())
    }

    /// Deliver the outcome of a mutation: listing, dismissals, snapshot,
    /// toasts, cache and teardown. Called with the session lock held.
    async fn settle(&self, session: &Session, events: Vec<SessionEvent>) {
        let listing_changed = self.sync_listing(session).await;
        let games = self.available_games().await;
        let finished = events
            .iter()
            .any(|e| matches!(e, SessionEvent::GameOver { .. } | SessionEvent::Emptied));

        {
            let mut conns = self.connections.write().await;

            for event in &events {
                match event {
                    SessionEvent::Dismissed { player_id, reason } => {
                        let Some(conn) = conns.seat(player_id) else {
                            continue;
                        };
                        if *reason == Dismissal::Denied {
                            conns.send(conn, ServerMessage::JoinRequestDenied);
                        }
                        conns.send(conn, ServerMessage::InvalidToken);
                        conns.bind_lobby(conn);
                        conns.send(
                            conn,
                            ServerMessage::AvailableGames {
                                games: games.clone(),
                            },
                        );
                        tracing::debug!("Connection {} released to the lobby", conn);
                    }
                    SessionEvent::Notify { player_id, message } => {
                        conns.send_to_player(
                            player_id,
                            ServerMessage::Toast {
                                message: message.clone(),
                            },
                        );
                    }
                    _ => {}
                }
            }

            broadcast_snapshot(session, &conns);

            for event in &events {
                if let SessionEvent::Toast(message) = event {
                    for player in &session.players {
                        conns.send_to_player(
                            &player.id,
                            ServerMessage::Toast {
                                message: message.clone(),
                            },
                        );
                    }
                }
            }

            if finished {
                // Members keep their tokens so the result stays on screen
                for player in &session.players {
                    if let Some(conn) = conns.seat(&player.id) {
                        conns.bind_lobby(conn);
                    }
                }
            }
        }

        if finished {
            self.destroy(&session.id).await;
        } else if session.phase() == SessionPhase::Active {
            self.write_through(session).await;
        }

        if listing_changed {
            self.broadcast_available_games().await;
        }
    }

    /// Keep the lobby listing in step with the session. Returns whether it changed.
    pub(super) async fn sync_listing(&self, session: &Session) -> bool {
        let mut listings = self.listings.write().await;
        match session.phase() {
            SessionPhase::Pending => match session.host() {
                Some(host) => {
                    listings.insert(session.id.clone(), host.name.clone()) != Some(host.name.clone())
                }
                None => listings.remove(&session.id).is_some(),
            },
            _ => listings.remove(&session.id).is_some(),
        }
    }

    async fn write_through(&self, session: &Session) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(session).await {
                tracing::warn!("Failed to cache game {}: {}", session.id, e);
            }
        }
    }

    async fn destroy(&self, game_id: &str) {
        self.games.write().await.remove(game_id);
        self.listings.write().await.remove(game_id);
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.delete(game_id).await {
                tracing::warn!("Failed to drop cached game {}: {}", game_id, e);
            }
        }
        tracing::info!("Game {} destroyed", game_id);
    }
}
