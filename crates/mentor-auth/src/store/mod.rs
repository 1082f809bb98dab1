//! Session store abstraction.
//!
//! A [`SessionStore`] is a string key-value store where every key carries its
//! own expiry. The reconciler only ever writes with an explicit TTL; there is
//! no way to create a key that lives forever.
//!
//! Two backends are provided:
//! - [`MemoryStore`] - single-instance, DashMap-backed, lazily expired
//! - [`RedisStore`] - shared, deadpool-managed Redis connections

mod memory;
mod redis_store;

use std::time::Duration;

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors a store backend can report.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or rejected the command.
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Backend-specific failure description.
        message: String,
    },

    /// The backend did not answer within the configured bound.
    #[error("store {operation} timed out after {after:?}")]
    Timeout {
        /// Operation that was attempted (`put`, `get`, `delete`).
        operation: &'static str,
        /// Elapsed bound.
        after: Duration,
    },

    /// A write was attempted with a TTL below one second.
    #[error("refusing to write key '{key}' without a positive TTL")]
    InvalidTtl {
        /// Key of the rejected write.
        key: String,
    },
}

impl StoreError {
    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Returns `true` if the backend itself failed (as opposed to misuse).
    #[must_use]
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Key-value store with per-key expiry.
///
/// Values are opaque strings; the session layer stores JSON documents.
///
/// # Consistency
///
/// Each call is independent. Writes to different keys are not atomic with
/// respect to each other and readers may observe any interleaving.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value and expiry.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidTtl` if `ttl` is shorter than one second,
    /// and `StoreError::Unavailable` if the backend fails.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Returns the live value under `key`, or `None` if absent or expired.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the backend fails.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Removes every key in `keys` and returns how many were present.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the backend fails.
    async fn delete(&self, keys: &[String]) -> StoreResult<u64>;
}

/// Rejects TTLs that would create a key without an expiry.
pub(crate) fn ensure_ttl(key: &str, ttl: Duration) -> StoreResult<u64> {
    match ttl.as_secs() {
        0 => Err(StoreError::InvalidTtl {
            key: key.to_string(),
        }),
        secs => Ok(secs),
    }
}
