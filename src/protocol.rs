use crate::error::GameError;
use crate::state::session::Session;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "key", rename_all = "snake_case")]
pub enum ClientMessage {
    // Lobby messages
    CreateGame {
        name: String,
    },
    RequestToJoin {
        #[serde(rename = "gameId")]
        game_id: GameId,
        name: String,
        #[serde(default)]
        message: Option<String>,
    },
    // Admission, from admitted players
    AcceptJoinRequest {
        #[serde(rename = "userId")]
        user_id: PlayerId,
    },
    DenyJoinRequest {
        #[serde(rename = "userId")]
        user_id: PlayerId,
    },
    StartGame,
    LeaveGame,
    // Turn messages
    PlayMove {
        page: Page,
    },
    Challenge,
    GiveUp,
    MarkAnswerCorrect,
    MarkAnswerIncorrect,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "key", rename_all = "snake_case")]
pub enum ServerMessage {
    AvailableGames { games: Vec<AvailableGame> },
    GameState { game: GameView },
    Token { token: String },
    InvalidToken,
    JoinRequestDenied,
    Toast { message: String },
    Error { message: String },
}

impl From<GameError> for ServerMessage {
    fn from(e: GameError) -> Self {
        ServerMessage::Error {
            message: e.to_string(),
        }
    }
}

/// Joinable game as listed in the lobby
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AvailableGame {
    pub id: GameId,
    #[serde(rename = "creatorName")]
    pub creator_name: String,
}

/// Full snapshot of one game; the shape depends on whether it has started
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum GameView {
    Pending(PendingGame),
    Started(StartedGame),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PendingGame {
    pub id: GameId,
    pub players: Vec<PendingPlayer>,
    pub started: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PendingPlayer {
    pub id: PlayerId,
    pub name: String,
    pub pending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StartedGame {
    pub id: GameId,
    pub players: Vec<StartedPlayer>,
    /// Current round first
    pub rounds: Vec<Round>,
    pub started: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerId>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StartedPlayer {
    pub id: PlayerId,
    pub name: String,
    pub letters: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PlayerStatus>,
    pub connected: bool,
}

impl GameView {
    /// Build a snapshot; `connected` says whether a player's seat has a live socket
    pub fn of(session: &Session, connected: impl Fn(&str) -> bool) -> Self {
        if !session.started {
            return GameView::Pending(PendingGame {
                id: session.id.clone(),
                players: session
                    .players
                    .iter()
                    .map(|p| PendingPlayer {
                        id: p.id.clone(),
                        name: p.name.clone(),
                        pending: p.pending,
                        message: p.message.clone(),
                        connected: connected(&p.id),
                    })
                    .collect(),
                started: false,
            });
        }

        GameView::Started(StartedGame {
            id: session.id.clone(),
            players: session
                .players
                .iter()
                .enumerate()
                .map(|(i, p)| StartedPlayer {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    letters: p.letters,
                    status: session.status_of(i),
                    connected: connected(&p.id),
                })
                .collect(),
            rounds: session.rounds.iter().rev().cloned().collect(),
            started: true,
            winner: session.winner.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_message_wire_names() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "key": "request_to_join",
            "gameId": "g1",
            "name": "Ben",
            "message": "let me in"
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::RequestToJoin {
                game_id: "g1".to_string(),
                name: "Ben".to_string(),
                message: Some("let me in".to_string()),
            }
        );

        let msg: ClientMessage =
            serde_json::from_value(json!({"key": "request_to_join", "gameId": "g1", "name": "Ben"}))
                .unwrap();
        assert!(matches!(msg, ClientMessage::RequestToJoin { message: None, .. }));

        let msg: ClientMessage =
            serde_json::from_value(json!({"key": "deny_join_request", "userId": "u1"})).unwrap();
        assert_eq!(
            msg,
            ClientMessage::DenyJoinRequest {
                user_id: "u1".to_string()
            }
        );

        let msg: ClientMessage = serde_json::from_str(r#"{"key":"mark_answer_incorrect"}"#).unwrap();
        assert_eq!(msg, ClientMessage::MarkAnswerIncorrect);
    }

    #[test]
    fn test_play_move_carries_page() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "key": "play_move",
            "page": {"pageid": 31, "title": "Tom Hanks", "birthYear": 1956}
        }))
        .unwrap();
        match msg {
            ClientMessage::PlayMove { page } => assert_eq!(page.title(), "Tom Hanks"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"key":"cheat"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"name":"Amy"}"#).is_err());
    }

    #[test]
    fn test_server_message_shapes() {
        let json = serde_json::to_value(ServerMessage::InvalidToken).unwrap();
        assert_eq!(json, json!({"key": "invalid_token"}));

        let json = serde_json::to_value(ServerMessage::AvailableGames {
            games: vec![AvailableGame {
                id: "g1".to_string(),
                creator_name: "Amy".to_string(),
            }],
        })
        .unwrap();
        assert_eq!(
            json,
            json!({"key": "available_games", "games": [{"id": "g1", "creatorName": "Amy"}]})
        );

        let json = serde_json::to_value(ServerMessage::from(GameError::NotYourTurn)).unwrap();
        assert_eq!(json, json!({"key": "error", "message": "It's not your turn"}));
    }

    #[test]
    fn test_pending_snapshot_shape() {
        let mut session = Session::new("g1".to_string(), Player::new("amy".to_string(), "Amy".to_string()));
        session
            .request_to_join(Player::requesting(
                "ben".to_string(),
                "Ben".to_string(),
                Some("hi".to_string()),
            ))
            .unwrap();

        let view = GameView::of(&session, |id| id == "amy");
        let json = serde_json::to_value(ServerMessage::GameState { game: view }).unwrap();
        assert_eq!(
            json,
            json!({
                "key": "game_state",
                "game": {
                    "id": "g1",
                    "started": false,
                    "players": [
                        {"id": "amy", "name": "Amy", "pending": false, "connected": true},
                        {"id": "ben", "name": "Ben", "pending": true, "message": "hi", "connected": false}
                    ]
                }
            })
        );
    }

    #[test]
    fn test_pending_snapshot_after_host_leaves() {
        let mut session = Session::new("g1".to_string(), Player::new("amy".to_string(), "Amy".to_string()));
        for (id, name) in [("ben", "Ben"), ("cat", "Cat")] {
            session
                .request_to_join(Player::requesting(
                    id.to_string(),
                    name.to_string(),
                    Some("hi".to_string()),
                ))
                .unwrap();
        }
        session.accept_join_request("amy", "cat").unwrap();
        session.leave("amy").unwrap();

        let json = serde_json::to_value(GameView::of(&session, |_| true)).unwrap();
        assert_eq!(
            json["players"],
            json!([
                {"id": "ben", "name": "Ben", "pending": false, "connected": true},
                {"id": "cat", "name": "Cat", "pending": false, "connected": true}
            ])
        );
    }

    #[test]
    fn test_started_snapshot_puts_current_round_first() {
        let mut session = Session::new("g1".to_string(), Player::new("amy".to_string(), "Amy".to_string()));
        session
            .request_to_join(Player::requesting("ben".to_string(), "Ben".to_string(), None))
            .unwrap();
        session.accept_join_request("amy", "ben").unwrap();
        session.start("amy").unwrap();
        session
            .play_move(
                "amy",
                Page::Work {
                    pageid: 1,
                    title: "Big".to_string(),
                    release_year: 1988,
                },
            )
            .unwrap();
        session.challenge("ben").unwrap();
        session.give_up("amy").unwrap();

        let json = serde_json::to_value(GameView::of(&session, |_| true)).unwrap();
        assert_eq!(json["started"], true);
        assert_eq!(json["rounds"][0], json!([]));
        assert_eq!(json["rounds"][1][0]["title"], "Big");
        assert_eq!(json["players"][0]["letters"], 1);
        assert!(json["players"][0].get("status").is_none());
        assert_eq!(json["players"][1]["status"], "active");
        assert!(json.get("winner").is_none());
    }
}
