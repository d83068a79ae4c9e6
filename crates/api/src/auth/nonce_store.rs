//! Volatile storage for per-user token nonces
//!
//! Each user has at most one live nonce. Writing a new one rotates every
//! previously issued token out of validity; entries expire on their own
//! after the token timeout.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::RwLock;

const REDIS_KEY_PREFIX: &str = "gluten:nonce:";

/// Store key for a user's nonce.
///
/// Kept structured so usernames containing separators cannot alias each
/// other; the Redis rendering hex-encodes the username for the same reason.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonceKey {
    username: String,
}

impl NonceKey {
    pub fn for_user(username: &str) -> Self {
        Self {
            username: username.to_string(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn redis_key(&self) -> String {
        format!("{}{}", REDIS_KEY_PREFIX, hex::encode(self.username.as_bytes()))
    }
}

/// Nonce store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Nonce store unavailable")]
    Unavailable,
}

/// Keyed store with per-entry expiration.
///
/// Each call must be atomic on its own; the engine needs nothing stronger.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Store `nonce` under `key`, replacing any previous value
    async fn set(&self, key: &NonceKey, nonce: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Current nonce for `key`, `None` if absent or expired
    async fn get(&self, key: &NonceKey) -> Result<Option<String>, StoreError>;

    /// Remove `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &NonceKey) -> Result<(), StoreError>;

    /// Cheap liveness check for readiness probes
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Clone)]
struct NonceEntry {
    nonce: String,
    expires_at: Instant,
}

impl NonceEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory nonce store (for development without Redis)
#[derive(Default)]
pub struct InMemoryNonceStore {
    entries: RwLock<HashMap<NonceKey, NonceEntry>>,
}

impl InMemoryNonceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries (call periodically for memory management)
    pub async fn cleanup(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| !entry.is_expired())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl NonceStore for InMemoryNonceStore {
    async fn set(&self, key: &NonceKey, nonce: &str, ttl: Duration) -> Result<(), StoreError> {
        let entry = NonceEntry {
            nonce: nonce.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.clone(), entry);
        Ok(())
    }

    async fn get(&self, key: &NonceKey) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.nonce.clone()))
    }

    async fn delete(&self, key: &NonceKey) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Redis-backed nonce store
#[derive(Clone)]
pub struct RedisNonceStore {
    conn: ConnectionManager,
}

impl RedisNonceStore {
    /// Connect to Redis at `redis_url`
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl NonceStore for RedisNonceStore {
    async fn set(&self, key: &NonceKey, nonce: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        // EX 0 is rejected by Redis
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key.redis_key(), nonce, seconds).await?;
        Ok(())
    }

    async fn get(&self, key: &NonceKey) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let nonce: Option<String> = conn.get(key.redis_key()).await?;
        Ok(nonce)
    }

    async fn delete(&self, key: &NonceKey) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key.redis_key()).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_key_does_not_alias() {
        // "a.b" must never collide with "a" + ".b" style concatenations
        let dotted = NonceKey::for_user("a.b");
        let plain = NonceKey::for_user("a");
        assert_ne!(dotted.redis_key(), plain.redis_key());
        assert_eq!(dotted.redis_key(), "gluten:nonce:612e62");
        assert!(!dotted.redis_key().contains("a.b"));
    }

    #[test]
    fn test_redis_key_handles_separator_in_username() {
        let key = NonceKey::for_user("eve:nonce:");
        assert!(key.redis_key().starts_with(REDIS_KEY_PREFIX));
        assert_eq!(key.redis_key().matches(':').count(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_set_get_delete() {
        let store = InMemoryNonceStore::new();
        let key = NonceKey::for_user("alice");

        assert!(store.get(&key).await.unwrap().is_none());

        store.set(&key, "NONCE1", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("NONCE1"));

        store.set(&key, "NONCE2", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("NONCE2"));

        store.delete(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());

        // Idempotent delete
        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_keys_are_separate() {
        let store = InMemoryNonceStore::new();
        store
            .set(&NonceKey::for_user("alice"), "A", Duration::from_secs(60))
            .await
            .unwrap();
        store
            .set(&NonceKey::for_user("bob"), "B", Duration::from_secs(60))
            .await
            .unwrap();

        store.delete(&NonceKey::for_user("alice")).await.unwrap();
        assert_eq!(
            store.get(&NonceKey::for_user("bob")).await.unwrap().as_deref(),
            Some("B")
        );
    }

    #[tokio::test]
    async fn test_in_memory_expiration() {
        let store = InMemoryNonceStore::new();
        let key = NonceKey::for_user("alice");

        store.set(&key, "NONCE", Duration::from_millis(50)).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(store.get(&key).await.unwrap().is_none());
        assert!(store.is_empty().await);
        assert_eq!(store.cleanup().await, 1);
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_redis_round_trip() {
        let url = std::env::var("REDIS_URL").expect("REDIS_URL required");
        let store = RedisNonceStore::connect(&url).await.expect("connect");
        let key = NonceKey::for_user("gluten-test-user");

        store.ping().await.unwrap();
        store.set(&key, "NONCE", Duration::from_secs(30)).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("NONCE"));
        store.delete(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
    }
}
