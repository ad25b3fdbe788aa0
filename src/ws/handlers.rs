//! WebSocket message dispatch
//!
//! Lobby messages go to the lobby operations, everything else is applied to
//! the session the connection is seated in. Normal output reaches sockets
//! through their outbound channels; only a failure produces a direct reply.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppState, SessionAction};
use crate::types::ConnectionId;
use std::sync::Arc;

/// Handle a client message and return an optional error reply
pub async fn handle_message(
    conn: ConnectionId,
    msg: ClientMessage,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    let result = match msg {
        // Lobby messages
        ClientMessage::CreateGame { name } => state.create_game(conn, name).await.map(|game_id| {
            tracing::debug!("Connection {} now hosts game {}", conn, game_id);
        }),

        ClientMessage::RequestToJoin {
            game_id,
            name,
            message,
        } => state
            .request_to_join(conn, &game_id, name, message)
            .await
            .map(|player_id| {
                tracing::debug!("Connection {} waiting in game {} as {}", conn, game_id, player_id);
            }),

        // Session messages
        ClientMessage::AcceptJoinRequest { user_id } => {
            state.apply(conn, SessionAction::AcceptJoinRequest(user_id)).await
        }
        ClientMessage::DenyJoinRequest { user_id } => {
            state.apply(conn, SessionAction::DenyJoinRequest(user_id)).await
        }
        ClientMessage::StartGame => state.apply(conn, SessionAction::Start).await,
        ClientMessage::LeaveGame => state.apply(conn, SessionAction::Leave).await,
        ClientMessage::PlayMove { page } => state.apply(conn, SessionAction::PlayMove(page)).await,
        ClientMessage::Challenge => state.apply(conn, SessionAction::Challenge).await,
        ClientMessage::GiveUp => state.apply(conn, SessionAction::GiveUp).await,
        ClientMessage::MarkAnswerCorrect => {
            state.apply(conn, SessionAction::MarkAnswerCorrect).await
        }
        ClientMessage::MarkAnswerIncorrect => {
            state.apply(conn, SessionAction::MarkAnswerIncorrect).await
        }
    };

    match result {
        Ok(()) => None,
        Err(e) => {
            tracing::debug!("Connection {} rejected: {}", conn, e);
            Some(e.into())
        }
    }
}
