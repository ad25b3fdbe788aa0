//! Server configuration from environment variables

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{FileCache, GameCache, MemoryCache};
use crate::token::TokenCodec;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Secret the token key is derived from (None = random per process)
    pub token_secret: Option<String>,
    pub ping_interval: Duration,
    /// Directory for the file-backed cache (None = in-memory cache)
    pub cache_dir: Option<PathBuf>,
    pub cache_ttl: Duration,
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            token_secret: None,
            ping_interval: Duration::from_secs(30),
            cache_dir: None,
            cache_ttl: Duration::from_secs(6 * 60 * 60),
            static_dir: PathBuf::from("static"),
        }
    }
}

/// Non-empty, trimmed value of an environment variable
fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env_string(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

impl ServerConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let ping_secs = env_parse("PING_INTERVAL_SECS", defaults.ping_interval.as_secs());
        let ping_interval = if ping_secs == 0 {
            tracing::warn!("PING_INTERVAL_SECS must be positive, using the default");
            defaults.ping_interval
        } else {
            Duration::from_secs(ping_secs)
        };

        Self {
            port: env_parse("PORT", defaults.port),
            token_secret: env_string("TOKEN_SECRET"),
            ping_interval,
            cache_dir: env_string("CACHE_DIR").map(PathBuf::from),
            cache_ttl: Duration::from_secs(env_parse(
                "CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )),
            static_dir: env_string("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
        }
    }

    pub fn token_codec(&self) -> TokenCodec {
        match &self.token_secret {
            Some(secret) => TokenCodec::new(secret),
            None => {
                tracing::warn!(
                    "TOKEN_SECRET not set - using a random secret, tokens will not survive a restart"
                );
                TokenCodec::ephemeral()
            }
        }
    }

    /// File cache when a directory is configured and usable, memory otherwise
    pub async fn build_cache(&self) -> Arc<dyn GameCache> {
        if let Some(dir) = &self.cache_dir {
            match FileCache::open(dir, self.cache_ttl).await {
                Ok(cache) => return Arc::new(cache),
                Err(e) => tracing::warn!(
                    "Cannot use cache directory {}: {}. Falling back to memory.",
                    dir.display(),
                    e
                ),
            }
        }
        Arc::new(MemoryCache::new(self.cache_ttl))
    }
}
