//! Session store bootstrap.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mentor_auth::{MemoryStore, RedisStore, SessionStore};

use crate::config::AppConfig;

/// How often the in-memory store drops expired entries.
pub const MEMORY_SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Creates the session store the server runs on.
///
/// Uses Redis when enabled. An unreachable Redis fails startup unless
/// `redis.fallback_to_memory` is set, in which case the process runs on its
/// own in-memory store.
///
/// # Errors
///
/// Returns an error if Redis is enabled, unreachable, and fallback is off.
pub async fn create_session_store(config: &AppConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    if !config.redis.enabled {
        tracing::info!("Redis disabled, using in-memory session store");
        return Ok(memory_store());
    }

    tracing::info!(url = %config.redis.url, "Connecting to Redis");

    match RedisStore::connect(
        &config.redis.url,
        config.redis.pool_size,
        config.redis_timeout(),
    )
    .await
    {
        Ok(store) => {
            tracing::info!("Connected to Redis session store");
            Ok(Arc::new(store))
        }
        Err(e) if config.redis.fallback_to_memory => {
            tracing::warn!(
                error = %e,
                "Failed to connect to Redis. Falling back to in-memory session store; \
                 session state is not shared with other instances."
            );
            Ok(memory_store())
        }
        Err(e) => Err(e).with_context(|| {
            format!(
                "Redis session store unreachable at {} (set redis.fallback_to_memory to run without it)",
                config.redis.url
            )
        }),
    }
}

fn memory_store() -> Arc<dyn SessionStore> {
    let store = MemoryStore::new();
    store.spawn_sweeper(MEMORY_SWEEP_PERIOD);
    Arc::new(store)
}
