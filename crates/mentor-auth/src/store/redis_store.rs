//! Redis-backed session store.
//!
//! Keys map one-to-one onto Redis keys. Writes use `SET .. EX`, so expiry is
//! enforced by Redis itself and shared between every instance of the API.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;

use super::{SessionStore, StoreError, StoreResult, ensure_ttl};

/// Session store on a pooled Redis connection.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    /// Builds a pool for `url` and checks that Redis answers.
    ///
    /// `timeout` bounds waiting for, creating and recycling a connection.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the pool cannot be created or the
    /// server does not answer `PING`.
    pub async fn connect(url: &str, pool_size: usize, timeout: Duration) -> StoreResult<Self> {
        let mut redis_config = Config::from_url(url);
        if let Some(ref mut pool_config) = redis_config.pool {
            pool_config.max_size = pool_size;
            pool_config.timeouts.wait = Some(timeout);
            pool_config.timeouts.create = Some(timeout);
            pool_config.timeouts.recycle = Some(timeout);
        }

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::unavailable(format!("failed to create Redis pool: {e}")))?;

        let store = Self::from_pool(pool);
        store.ping().await?;
        Ok(store)
    }

    /// Sends `PING` over a pooled connection.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if no connection can be obtained or
    /// the command fails.
    pub async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| StoreError::unavailable(format!("Redis PING failed: {e}")))?;
        Ok(())
    }

    async fn connection(&self) -> StoreResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::unavailable(format!("failed to get Redis connection: {e}")))
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let ttl_secs = ensure_ttl(key, ttl)?;
        let mut conn = self.connection().await?;

        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| {
                tracing::warn!(key = %key, error = %e, "Redis SET error");
                StoreError::unavailable(e.to_string())
            })?;

        tracing::debug!(key = %key, ttl_secs = %ttl_secs, "session store set");
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.connection().await?;

        conn.get::<_, Option<String>>(key).await.map_err(|e| {
            tracing::warn!(key = %key, error = %e, "Redis GET error");
            StoreError::unavailable(e.to_string())
        })
    }

    async fn delete(&self, keys: &[String]) -> StoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection().await?;
        conn.del::<_, u64>(keys).await.map_err(|e| {
            tracing::warn!(keys = ?keys, error = %e, "Redis DEL error");
            StoreError::unavailable(e.to_string())
        })
    }
}
