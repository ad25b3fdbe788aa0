//! Sealed session tokens
//!
//! A token is `base64url(nonce || AES-256-GCM(json claims))`. The key is the
//! SHA-256 digest of the configured secret, so every server sharing a secret
//! can open every other server's tokens. Any modification of the token makes
//! authentication fail.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{has_chars, GameId, PlayerId};

/// Nonce size for AES-GCM (96 bits / 12 bytes).
const NONCE_SIZE: usize = 12;
/// GCM authentication tag size in bytes.
const TAG_SIZE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is not valid base64")]
    Encoding(#[from] base64::DecodeError),

    #[error("token is too short")]
    TooShort,

    #[error("token failed authentication")]
    Authentication,

    #[error("token payload is malformed: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("token is missing {0}")]
    MissingClaim(&'static str),
}

/// What a token proves: which seat of which game the bearer owns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    #[serde(rename = "gameId")]
    pub game_id: GameId,
    #[serde(rename = "userId")]
    pub user_id: PlayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl TokenClaims {
    pub fn new(game_id: impl Into<GameId>, user_id: impl Into<PlayerId>) -> Self {
        Self {
            game_id: game_id.into(),
            user_id: user_id.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

pub struct TokenCodec {
    cipher: Aes256Gcm,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let key = Sha256::digest(secret.as_bytes());
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    /// Codec keyed with a random secret; tokens die with the process
    pub fn ephemeral() -> Self {
        let mut secret = [0u8; 32];
        rand::rng().fill(&mut secret);
        Self::new(&URL_SAFE_NO_PAD.encode(secret))
    }

    pub fn seal(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        let payload = serde_json::to_vec(claims)?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, payload.as_slice())
            .map_err(|_| TokenError::Authentication)?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    pub fn open(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let sealed = URL_SAFE_NO_PAD.decode(token.trim())?;
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(TokenError::TooShort);
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let payload = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| TokenError::Authentication)?;

        let claims: TokenClaims = serde_json::from_slice(&payload)?;
        if !has_chars(&claims.game_id) {
            return Err(TokenError::MissingClaim("gameId"));
        }
        if !has_chars(&claims.user_id) {
            return Err(TokenError::MissingClaim("userId"));
        }
        Ok(claims)
    }
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self::ephemeral()
    }
}
