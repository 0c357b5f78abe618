//! Token revocation store
//!
//! Keys are SHA-256 digests of revoked JWTs; entries expire when the token would have.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use sha2::{Digest, Sha256};

use crate::shared::error::Result;

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Record `key` as revoked for `ttl_secs` seconds.
    async fn put(&self, key: &str, ttl_secs: u64) -> Result<()>;

    async fn contains(&self, key: &str) -> Result<bool>;
}

/// Opaque store key for a JWT.
pub fn token_key(jwt: &str) -> String {
    hex::encode(Sha256::digest(jwt.as_bytes()))
}

/// Redis-backed store shared by every replica.
pub struct RedisTokenStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisTokenStore {
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            prefix: prefix.into(),
        })
    }

    fn redis_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn put(&self, key: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        // SET key 1 EX ttl
        let _: () = redis::cmd("SET")
            .arg(self.redis_key(key))
            .arg(1)
            .arg("EX")
            .arg(ttl_secs.max(1))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = redis::cmd("EXISTS")
            .arg(self.redis_key(key))
            .query_async(&mut conn)
            .await?;
        Ok(exists)
    }
}

/// Process-local store for development and tests.
#[derive(Default)]
pub struct MemoryTokenStore {
    entries: DashMap<String, DateTime<Utc>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn put(&self, key: &str, ttl_secs: u64) -> Result<()> {
        let now = Utc::now();
        self.entries.retain(|_, expires_at| *expires_at > now);
        let expires_at = now + chrono::Duration::seconds(ttl_secs.max(1) as i64);
        self.entries.insert(key.to_string(), expires_at);
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        let now = Utc::now();
        let live = self
            .entries
            .get(key)
            .map(|expires_at| *expires_at > now)
            .unwrap_or(false);
        if !live {
            self.entries.remove_if(key, |_, expires_at| *expires_at <= now);
        }
        Ok(live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_put_and_contains() {
        let store = MemoryTokenStore::new();
        assert!(!store.contains("k").await.unwrap());
        store.put("k", 60).await.unwrap();
        assert!(store.contains("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_sweeps_expired_entries_on_put() {
        let store = MemoryTokenStore::new();
        let past = Utc::now() - chrono::Duration::seconds(5);
        store.entries.insert("stale-1".to_string(), past);
        store.entries.insert("stale-2".to_string(), past);
        store.put("live", 60).await.unwrap();

        assert_eq!(store.entries.len(), 1);
        assert!(store.entries.contains_key("live"));
        assert!(!store.contains("stale-1").await.unwrap());
    }

    #[test]
    fn test_token_key_is_stable_digest() {
        let a = token_key("header.payload.signature");
        assert_eq!(a.len(), 64);
        assert_eq!(a, token_key("header.payload.signature"));
        assert_ne!(a, token_key("header.payload.other"));
    }
}
