//! Side store for running games, so a seat can still be resumed after the
//! in-memory session is gone (process restart).
//!
//! The session in memory stays authoritative; the cache is written through
//! after every mutation of a started game and read once when a reconnect finds
//! no session in memory. Records expire after a TTL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::state::session::Session;
use crate::types::GameId;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Trait that all game state caches must implement
#[async_trait]
pub trait GameCache: Send + Sync {
    async fn get(&self, game_id: &str) -> CacheResult<Option<Session>>;

    async fn set(&self, session: &Session) -> CacheResult<()>;

    async fn delete(&self, game_id: &str) -> CacheResult<()>;

    fn name(&self) -> &str;
}

/// What actually gets stored per game
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheRecord {
    expires_at: DateTime<Utc>,
    session: Session,
}

impl CacheRecord {
    fn new(session: &Session, ttl: Duration) -> Self {
        let ttl =
            chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(3650));
        Self {
            expires_at: Utc::now()
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            session: session.clone(),
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// In-process cache, mainly useful for tests and single-process dev runs
#[derive(Clone)]
pub struct MemoryCache {
    records: Arc<RwLock<HashMap<GameId, CacheRecord>>>,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }
}

#[async_trait]
impl GameCache for MemoryCache {
    async fn get(&self, game_id: &str) -> CacheResult<Option<Session>> {
        let record = match self.records.read().await.get(game_id) {
            Some(record) => record.clone(),
            None => return Ok(None),
        };

        if record.is_expired() {
            self.records.write().await.remove(game_id);
            return Ok(None);
        }
        Ok(Some(record.session))
    }

    async fn set(&self, session: &Session) -> CacheResult<()> {
        let mut records = self.records.write().await;
        // Drop records nobody came back for
        let before = records.len();
        records.retain(|_, record| !record.is_expired());
        if records.len() < before {
            tracing::debug!("Pruned {} expired cache records", before - records.len());
        }
        records.insert(session.id.clone(), CacheRecord::new(session, self.ttl));
        Ok(())
    }

    async fn delete(&self, game_id: &str) -> CacheResult<()> {
        self.records.write().await.remove(game_id);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// One JSON file per game under a directory; survives restarts
pub struct FileCache {
    dir: PathBuf,
    ttl: Duration,
}

impl FileCache {
    pub async fn open(dir: impl Into<PathBuf>, ttl: Duration) -> CacheResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir, ttl })
    }

    fn path_for(&self, game_id: &str) -> PathBuf {
        // Game ids are ULIDs; anything else cannot name a file outside the directory
        let safe: String = game_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        self.dir.join(format!("game-{}.json", safe))
    }
}

#[async_trait]
impl GameCache for FileCache {
    async fn get(&self, game_id: &str) -> CacheResult<Option<Session>> {
        let path = self.path_for(game_id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: CacheRecord = serde_json::from_str(&raw)?;
        if record.is_expired() {
            tracing::debug!("Cache record for game {} expired", game_id);
            self.delete(game_id).await?;
            return Ok(None);
        }
        Ok(Some(record.session))
    }

    async fn set(&self, session: &Session) -> CacheResult<()> {
        let raw = serde_json::to_vec(&CacheRecord::new(session, self.ttl))?;
        let path = self.path_for(&session.id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, game_id: &str) -> CacheResult<()> {
        match tokio::fs::remove_file(self.path_for(game_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}
