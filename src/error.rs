//! Errors reported back to the offending socket as `error{message}`.
//!
//! Anything that fails here leaves session and lobby state untouched.

use crate::types::{MAX_MESSAGE_CHARS, MAX_NAME_CHARS};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Game not found")]
    GameNotFound,

    #[error("Game has already started")]
    AlreadyStarted,

    #[error("Game has not started yet")]
    NotStarted,

    #[error("Game is over")]
    GameOver,

    #[error("You are not in a game")]
    NotInGame,

    #[error("You are already in a game")]
    AlreadyInGame,

    #[error("Name is required")]
    NameRequired,

    #[error("Name must be at most {} characters", MAX_NAME_CHARS)]
    NameTooLong,

    #[error("Message must be at most {} characters", MAX_MESSAGE_CHARS)]
    MessageTooLong,

    #[error("You have already asked to join this game")]
    AlreadyJoined,

    #[error("Join request not found")]
    RequestNotFound,

    #[error("Only admitted players can do that")]
    NotAdmitted,

    #[error("At least two players are needed to start")]
    NotEnoughPlayers,

    #[error("Player not found")]
    PlayerNotFound,

    #[error("It's not your turn")]
    NotYourTurn,

    #[error("There is no play to challenge")]
    NothingToChallenge,

    #[error("There is no challenge to judge")]
    NoChallenge,

    #[error("Could not issue a session token")]
    TokenUnavailable,
}
