use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use push_core::redis::{get_connection, RedisPool};
use push_core::{PushError, PushResult};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Mutex;

/// Keyed cache holding bearer tokens until their expiry.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// The cached value, or `None` when absent or expired.
    async fn get(&self, key: &str) -> PushResult<Option<String>>;

    async fn put(&self, key: &str, token: &str, ttl: Duration) -> PushResult<()>;

    async fn remove(&self, key: &str) -> PushResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> PushResult<std::sync::MutexGuard<'_, HashMap<String, (String, DateTime<Utc>)>>> {
        self.entries
            .lock()
            .map_err(|_| PushError::Cache("token store lock poisoned".to_string()))
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> PushResult<Option<String>> {
        let mut entries = self.entries()?;
        match entries.get(key) {
            Some((token, expires_at)) if *expires_at > Utc::now() => Ok(Some(token.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, token: &str, ttl: Duration) -> PushResult<()> {
        let expires_at = Utc::now() + ttl;
        self.entries()?
            .insert(key.to_string(), (token.to_string(), expires_at));
        Ok(())
    }

    async fn remove(&self, key: &str) -> PushResult<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Shares the token between processes; expiry is delegated to Redis `EX`.
pub struct RedisTokenStore {
    pool: RedisPool,
}

impl RedisTokenStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn get(&self, key: &str) -> PushResult<Option<String>> {
        let mut conn = get_connection(&self.pool).await?;
        let token: Option<String> = conn.get(key).await?;
        Ok(token.filter(|t| !t.is_empty()))
    }

    async fn put(&self, key: &str, token: &str, ttl: Duration) -> PushResult<()> {
        let seconds = ttl.num_seconds().max(1) as u64;
        let mut conn = get_connection(&self.pool).await?;
        conn.set_ex::<_, _, ()>(key, token, seconds).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> PushResult<()> {
        let mut conn = get_connection(&self.pool).await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}
