//! Per-game state machine
//!
//! `Session` owns the roster, the round stack and the turn pointer. Every
//! operation validates first and only then mutates, so an `Err` leaves the
//! session untouched. Side effects that need sockets (notifications, token
//! invalidation, teardown) are returned as [`SessionEvent`]s for the hub to
//! deliver.

use serde::{Deserialize, Serialize};

use super::turn::{eligible_count, next_eligible, previous_eligible};
use crate::error::GameError;
use crate::types::*;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    /// Roster index of the only player with a status
    pub holder: usize,
    pub status: PlayerStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Pending,
    Active,
    Over,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dismissal {
    /// Join request denied, or dropped when the game started
    Denied,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Player's token is no longer good; their socket goes back to the lobby
    Dismissed {
        player_id: PlayerId,
        reason: Dismissal,
    },
    /// Toast for one player only
    Notify {
        player_id: PlayerId,
        message: String,
    },
    /// Toast for every member
    Toast(String),
    GameOver {
        winner: Option<PlayerId>,
    },
    /// Last player left a game that never started
    Emptied,
}

pub type SessionResult = Result<Vec<SessionEvent>, GameError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: GameId,
    /// Creator first; order never changes except for removals
    pub players: Vec<Player>,
    /// Oldest first; the last entry is the round being played
    #[serde(default)]
    pub rounds: Vec<Round>,
    #[serde(default)]
    pub started: bool,
    #[serde(default)]
    pub turn: Option<Turn>,
    #[serde(default)]
    pub winner: Option<PlayerId>,
}

/// Trim and validate a display name
pub fn clean_name(name: &str) -> Result<String, GameError> {
    let name = name.trim();
    if !has_chars(name) {
        return Err(GameError::NameRequired);
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(GameError::NameTooLong);
    }
    Ok(name.to_string())
}

/// Trim a join message, dropping it when blank
pub fn clean_message(message: Option<String>) -> Result<Option<String>, GameError> {
    match message {
        Some(m) if has_chars(&m) => {
            let m = m.trim();
            if m.chars().count() > MAX_MESSAGE_CHARS {
                return Err(GameError::MessageTooLong);
            }
            Ok(Some(m.to_string()))
        }
        _ => Ok(None),
    }
}

fn spell_letters(letters: u8) -> String {
    "BOMB"
        .chars()
        .take(letters as usize)
        .map(String::from)
        .collect::<Vec<_>>()
        .join("-")
}

impl Session {
    pub fn new(id: GameId, creator: Player) -> Self {
        Self {
            id,
            players: vec![creator],
            rounds: Vec::new(),
            started: false,
            turn: None,
            winner: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match (self.started, self.turn) {
            (false, _) => SessionPhase::Pending,
            (true, Some(_)) => SessionPhase::Active,
            (true, None) => SessionPhase::Over,
        }
    }

    /// First admitted player; acts as host while the game is pending
    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| !p.pending)
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    /// Whether a token for this player may still bind to the session
    pub fn can_resume(&self, player_id: &str) -> bool {
        self.player(player_id).is_some_and(|p| !p.left)
    }

    pub fn status_of(&self, index: usize) -> Option<PlayerStatus> {
        self.turn
            .filter(|t| t.holder == index)
            .map(|t| t.status)
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.rounds.last()
    }

    fn index_of(&self, player_id: &str) -> Result<usize, GameError> {
        self.players
            .iter()
            .position(|p| p.id == player_id)
            .ok_or(GameError::PlayerNotFound)
    }

    fn require_pending(&self) -> Result<(), GameError> {
        if self.started {
            return Err(GameError::AlreadyStarted);
        }
        Ok(())
    }

    fn require_admitted(&self, actor: &str) -> Result<usize, GameError> {
        let index = self.index_of(actor)?;
        if self.players[index].pending {
            return Err(GameError::NotAdmitted);
        }
        Ok(index)
    }

    fn require_running(&self) -> Result<Turn, GameError> {
        if !self.started {
            return Err(GameError::NotStarted);
        }
        self.turn.ok_or(GameError::GameOver)
    }

    fn require_holder(&self, actor: &str, allowed: &[PlayerStatus]) -> Result<Turn, GameError> {
        let turn = self.require_running()?;
        let index = self.index_of(actor)?;
        if turn.holder != index || !allowed.contains(&turn.status) {
            return Err(GameError::NotYourTurn);
        }
        Ok(turn)
    }

    fn require_reviewer(&self, actor: &str) -> Result<Turn, GameError> {
        let turn = self.require_running()?;
        if turn.status != PlayerStatus::Reviewing {
            return Err(GameError::NoChallenge);
        }
        if turn.holder != self.index_of(actor)? {
            return Err(GameError::NotYourTurn);
        }
        Ok(turn)
    }

    fn pending_request(&self, actor: &str, user_id: &str) -> Result<usize, GameError> {
        self.require_pending()?;
        self.require_admitted(actor)?;
        self.players
            .iter()
            .position(|p| p.id == user_id && p.pending)
            .ok_or(GameError::RequestNotFound)
    }

    // ========== Admission ==========

    pub fn request_to_join(&mut self, player: Player) -> SessionResult {
        self.require_pending()?;
        if self.player(&player.id).is_some() {
            return Err(GameError::AlreadyJoined);
        }

        tracing::info!("{} asked to join game {}", player.name, self.id);
        self.players.push(Player {
            pending: true,
            ..player
        });
        Ok(Vec::new())
    }

    pub fn accept_join_request(&mut self, actor: &str, user_id: &str) -> SessionResult {
        let index = self.pending_request(actor, user_id)?;

        let player = &mut self.players[index];
        player.pending = false;
        player.message = None;
        tracing::info!("{} admitted to game {}", player.name, self.id);

        Ok(vec![SessionEvent::Notify {
            player_id: player.id.clone(),
            message: "Your request to join was accepted".to_string(),
        }])
    }

    pub fn deny_join_request(&mut self, actor: &str, user_id: &str) -> SessionResult {
        let index = self.pending_request(actor, user_id)?;

        let player = self.players.remove(index);
        tracing::info!("{} denied from game {}", player.name, self.id);

        Ok(vec![SessionEvent::Dismissed {
            player_id: player.id,
            reason: Dismissal::Denied,
        }])
    }

    pub fn start(&mut self, actor: &str) -> SessionResult {
        self.require_pending()?;
        self.require_admitted(actor)?;
        if self.players.iter().filter(|p| !p.pending).count() < 2 {
            return Err(GameError::NotEnoughPlayers);
        }

        let (admitted, dropped): (Vec<Player>, Vec<Player>) =
            self.players.drain(..).partition(|p| !p.pending);
        self.players = admitted;
        for player in &mut self.players {
            player.message = None;
        }

        self.started = true;
        self.rounds = vec![Round::new()];
        self.turn = self
            .players
            .iter()
            .position(|p| !p.is_eliminated())
            .map(|holder| Turn {
                holder,
                status: PlayerStatus::Active,
            });

        tracing::info!(
            "Game {} started with {} players ({} pending requests dropped)",
            self.id,
            self.players.len(),
            dropped.len()
        );

        Ok(dropped
            .into_iter()
            .map(|p| SessionEvent::Dismissed {
                player_id: p.id,
                reason: Dismissal::Denied,
            })
            .collect())
    }

    // ========== Turns ==========

    pub fn play_move(&mut self, actor: &str, page: Page) -> SessionResult {
        let turn = self.require_holder(actor, &[PlayerStatus::Active, PlayerStatus::Challenged])?;

        tracing::debug!(
            "{} played {} in game {}",
            self.players[turn.holder].name,
            page.title(),
            self.id
        );
        match self.rounds.last_mut() {
            Some(round) => round.push(page),
            None => self.rounds.push(vec![page]),
        }

        // Answering a challenge hands the next player the review
        let status = if turn.status == PlayerStatus::Challenged {
            PlayerStatus::Reviewing
        } else {
            PlayerStatus::Active
        };
        self.advance(turn.holder, status);
        Ok(Vec::new())
    }

    pub fn challenge(&mut self, actor: &str) -> SessionResult {
        let turn = self.require_holder(actor, &[PlayerStatus::Active])?;
        if self.current_round().map_or(true, |r| r.is_empty()) {
            return Err(GameError::NothingToChallenge);
        }
        let accused = previous_eligible(&self.players, turn.holder)
            .filter(|&i| i != turn.holder)
            .ok_or(GameError::NothingToChallenge)?;

        self.turn = Some(Turn {
            holder: accused,
            status: PlayerStatus::Challenged,
        });

        Ok(vec![SessionEvent::Toast(format!(
            "{} challenged {}!",
            self.players[turn.holder].name, self.players[accused].name
        ))])
    }

    pub fn give_up(&mut self, actor: &str) -> SessionResult {
        let turn = self.require_holder(actor, &[PlayerStatus::Challenged])?;

        let mut events = Vec::new();
        self.add_letter(turn.holder, &mut events);
        self.settle_round(turn.holder, &mut events);
        Ok(events)
    }

    /// The challenged answer was right, so the challenger takes the letter
    pub fn mark_answer_correct(&mut self, actor: &str) -> SessionResult {
        let turn = self.require_reviewer(actor)?;

        let mut events = Vec::new();
        self.add_letter(turn.holder, &mut events);
        self.settle_round(turn.holder, &mut events);
        Ok(events)
    }

    /// The answer was wrong, so whoever gave it takes the letter
    pub fn mark_answer_incorrect(&mut self, actor: &str) -> SessionResult {
        let (accused, from) = self.incorrect_answer(actor)?;

        let mut events = Vec::new();
        self.add_letter(accused, &mut events);
        self.settle_round(from, &mut events);
        Ok(events)
    }

    /// Who gave the rejected answer, and where the turn advances from.
    ///
    /// Valid from the active player judging the previous answer, from the
    /// challenger while the accused has yet to answer, and from the reviewer.
    fn incorrect_answer(&self, actor: &str) -> Result<(usize, usize), GameError> {
        let turn = self.require_running()?;
        let index = self.index_of(actor)?;

        match turn.status {
            PlayerStatus::Active => {
                if turn.holder != index {
                    return Err(GameError::NotYourTurn);
                }
                if self.current_round().map_or(true, |r| r.is_empty()) {
                    return Err(GameError::NothingToChallenge);
                }
                let accused = previous_eligible(&self.players, turn.holder)
                    .filter(|&i| i != turn.holder)
                    .ok_or(GameError::NothingToChallenge)?;
                Ok((accused, turn.holder))
            }
            PlayerStatus::Challenged => {
                if next_eligible(&self.players, turn.holder) != Some(index) {
                    return Err(GameError::NotYourTurn);
                }
                Ok((turn.holder, turn.holder))
            }
            PlayerStatus::Reviewing => {
                if turn.holder != index {
                    return Err(GameError::NotYourTurn);
                }
                let accused = previous_eligible(&self.players, turn.holder)
                    .ok_or(GameError::NoChallenge)?;
                Ok((accused, turn.holder))
            }
        }
    }

    pub fn leave(&mut self, actor: &str) -> SessionResult {
        let index = self.index_of(actor)?;
        if self.started {
            self.leave_running(index)
        } else {
            Ok(self.leave_pending(index))
        }
    }

    fn leave_pending(&mut self, index: usize) -> Vec<SessionEvent> {
        let was_host = self.host().is_some_and(|h| h.id == self.players[index].id);
        let player = self.players.remove(index);
        tracing::info!("{} left pending game {}", player.name, self.id);

        let mut events = vec![SessionEvent::Dismissed {
            player_id: player.id,
            reason: Dismissal::Left,
        }];

        if self.players.is_empty() {
            events.push(SessionEvent::Emptied);
            return events;
        }

        if was_host {
            // The first player is always the host
            let first = &mut self.players[0];
            first.pending = false;
            first.message = None;
            events.push(SessionEvent::Notify {
                player_id: first.id.clone(),
                message: "You are now the host".to_string(),
            });
        }
        events.push(SessionEvent::Toast(format!("{} left the game", player.name)));
        events
    }

    fn leave_running(&mut self, index: usize) -> SessionResult {
        let turn = self.require_running()?;
        let accused = match turn.status {
            PlayerStatus::Reviewing => previous_eligible(&self.players, turn.holder),
            _ => None,
        };

        let player = &mut self.players[index];
        player.letters = ELIMINATION_LETTERS;
        player.left = true;
        tracing::info!("{} left running game {}", player.name, self.id);

        let mut events = vec![
            SessionEvent::Dismissed {
                player_id: player.id.clone(),
                reason: Dismissal::Left,
            },
            SessionEvent::Toast(format!("{} left the game", player.name)),
        ];

        if self.check_game_over(&mut events) {
            return Ok(events);
        }

        if turn.holder == index {
            if turn.status != PlayerStatus::Active {
                // An open challenge dies with the player holding it
                self.rounds.push(Round::new());
            }
            self.advance(index, PlayerStatus::Active);
        } else if accused == Some(index) {
            self.rounds.push(Round::new());
            self.turn = Some(Turn {
                holder: turn.holder,
                status: PlayerStatus::Active,
            });
        }
        Ok(events)
    }

    // ========== Helpers ==========

    /// Hand the turn to the next eligible player after `from`
    fn advance(&mut self, from: usize, status: PlayerStatus) {
        self.turn = next_eligible(&self.players, from).map(|holder| Turn { holder, status });
    }

    /// Close the current round after a challenge is resolved and move on
    fn settle_round(&mut self, from: usize, events: &mut Vec<SessionEvent>) {
        self.rounds.push(Round::new());
        if !self.check_game_over(events) {
            self.advance(from, PlayerStatus::Active);
        }
    }

    fn add_letter(&mut self, index: usize, events: &mut Vec<SessionEvent>) {
        let player = &mut self.players[index];
        player.letters = (player.letters + 1).min(ELIMINATION_LETTERS);

        let message = if player.is_eliminated() {
            format!("{} is out!", player.name)
        } else {
            format!("{} gets a letter: {}", player.name, spell_letters(player.letters))
        };
        tracing::info!("Game {}: {}", self.id, message);
        events.push(SessionEvent::Toast(message));
    }

    /// Ends the game once at most one eligible player remains
    fn check_game_over(&mut self, events: &mut Vec<SessionEvent>) -> bool {
        if eligible_count(&self.players) > 1 {
            return false;
        }

        self.turn = None;
        self.winner = self
            .players
            .iter()
            .find(|p| !p.is_eliminated())
            .map(|p| p.id.clone());

        if let Some(winner) = self.winner.as_ref().and_then(|id| self.player(id)) {
            tracing::info!("Game {} over, {} wins", self.id, winner.name);
            events.push(SessionEvent::Toast(format!("{} wins!", winner.name)));
        }
        events.push(SessionEvent::GameOver {
            winner: self.winner.clone(),
        });
        true
    }
}
