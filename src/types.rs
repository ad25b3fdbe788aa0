use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type GameId = String;
pub type PlayerId = String;
pub type ConnectionId = u64;

/// Letters needed to be knocked out ("B-O-M-B")
pub const ELIMINATION_LETTERS: u8 = 4;

pub const MAX_NAME_CHARS: usize = 20;
pub const MAX_MESSAGE_CHARS: usize = 300;

/// Turn status held by at most one player at a time while a game is running
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Active,
    Challenged,
    Reviewing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Join request still awaiting admission
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub letters: u8,
    /// Left a running game; kept in the roster as eliminated but no longer resumable
    #[serde(default)]
    pub left: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            pending: false,
            message: None,
            letters: 0,
            left: false,
        }
    }

    pub fn requesting(id: PlayerId, name: String, message: Option<String>) -> Self {
        Self {
            pending: true,
            message,
            ..Self::new(id, name)
        }
    }

    pub fn is_eliminated(&self) -> bool {
        self.letters >= ELIMINATION_LETTERS
    }
}

/// A validated answer. Person pages carry a birth year, work pages a release year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Page {
    Person {
        pageid: u64,
        title: String,
        #[serde(rename = "birthYear")]
        birth_year: i32,
    },
    Work {
        pageid: u64,
        title: String,
        #[serde(rename = "releaseYear")]
        release_year: i32,
    },
}

impl Page {
    pub fn title(&self) -> &str {
        match self {
            Page::Person { title, .. } | Page::Work { title, .. } => title,
        }
    }
}

/// Plays made since the last challenge or give-up
pub type Round = Vec<Page>;

/// Returns true if `value` has at least one non-whitespace character
pub fn has_chars(value: &str) -> bool {
    value.chars().any(|c| !c.is_whitespace())
}
