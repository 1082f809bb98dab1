//! In-memory session store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{SessionStore, StoreResult, ensure_ttl};
use crate::clock::{Clock, SystemClock};

#[derive(Debug, Clone)]
struct StoredEntry {
    value: Arc<str>,
    expires_at: i64,
}

impl StoredEntry {
    fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// Entry count at which `put` first sweeps expired entries.
pub const DEFAULT_SWEEP_THRESHOLD: usize = 10_000;

/// Single-instance store backed by a `DashMap`.
///
/// Entries expire against the injected [`Clock`]. Expired entries are
/// dropped when they are next read, when the map grows past the sweep
/// threshold, and by the task started with [`MemoryStore::spawn_sweeper`].
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoredEntry>>,
    clock: Arc<dyn Clock>,
    sweep_threshold: usize,
    next_sweep_at: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// Creates an empty store on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store on the given clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
            sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
            next_sweep_at: Arc::new(AtomicUsize::new(DEFAULT_SWEEP_THRESHOLD)),
        }
    }

    /// Sets the entry count at which `put` sweeps expired entries.
    #[must_use]
    pub fn with_sweep_threshold(mut self, threshold: usize) -> Self {
        let threshold = threshold.max(1);
        self.sweep_threshold = threshold;
        self.next_sweep_at.store(threshold, Ordering::Relaxed);
        self
    }

    /// Number of entries currently held, including not yet swept ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        sweep(&self.entries, self.clock.now_unix())
    }

    /// Starts a task that purges expired entries every `period`.
    ///
    /// The task ends on its own once every clone of the store is dropped.
    /// Must be called from within a Tokio runtime.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let entries = Arc::downgrade(&self.entries);
        let clock = Arc::clone(&self.clock);
        let period = period.max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(entries) = entries.upgrade() else {
                    break;
                };
                let removed = sweep(&entries, clock.now_unix());
                if removed > 0 {
                    tracing::debug!(removed, remaining = entries.len(), "swept expired session entries");
                }
            }
        })
    }

    /// Sweeps once the map reaches the current mark, then moves the mark so
    /// a map full of live entries is not rescanned on every put.
    fn sweep_if_crowded(&self) {
        let mark = self.next_sweep_at.load(Ordering::Relaxed);
        if self.entries.len() < mark {
            return;
        }

        let removed = self.purge_expired();
        let next = self
            .entries
            .len()
            .saturating_mul(2)
            .max(self.sweep_threshold);
        self.next_sweep_at.store(next, Ordering::Relaxed);
        tracing::debug!(removed, next_sweep_at = next, "memory store crowded, swept expired entries");
    }

    /// Seconds until `key` expires, if it is live.
    #[must_use]
    pub fn ttl_of(&self, key: &str) -> Option<i64> {
        let now = self.clock.now_unix();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.expires_at - now)
    }
}

fn sweep(entries: &DashMap<String, StoredEntry>, now: i64) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    before.saturating_sub(entries.len())
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let secs = ensure_ttl(key, ttl)?;
        let expires_at = self
            .clock
            .now_unix()
            .saturating_add(i64::try_from(secs).unwrap_or(i64::MAX));

        self.sweep_if_crowded();
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                value: Arc::from(value),
                expires_at,
            },
        );
        tracing::trace!(key = %key, ttl_secs = secs, "memory store put");
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = self.clock.now_unix();

        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.to_string()));
            }
        } else {
            return Ok(None);
        }

        // Expired: drop it unless a concurrent put replaced it meanwhile.
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn delete(&self, keys: &[String]) -> StoreResult<u64> {
        let now = self.clock.now_unix();
        let removed = keys
            .iter()
            .filter_map(|key| self.entries.remove(key))
            .filter(|(_, entry)| !entry.is_expired(now))
            .count();
        Ok(removed as u64)
    }
}
