//! Caching layer for read queries.
//!
//! Every read goes through here before touching the store. Entries live for a
//! fixed TTL measured against an injected [`Clock`]; moka's own
//! `time_to_live` bounds them in real time as well. A background sweeper
//! drops expired entries even if nobody asks for them again.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache as MokaCache;
use moka::ops::compute::{CompResult, Op};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::{Clock, DayVariant, Schedule, Station};

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// How often the sweeper evicts expired entries.
    pub sweep_interval: Duration,

    /// Maximum number of cached entries.
    pub max_capacity: u64,
}

impl CacheConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(6 * 60 * 60),
            sweep_interval: Duration::from_secs(10 * 60),
            max_capacity: 1000,
        }
    }
}

/// What a cached entry answers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    AllStations,
    AllSchedules,
    StationSchedules(u32),
    StationDirection {
        station_id: u32,
        direction: String,
        variant: DayVariant,
    },
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::AllStations => f.write_str("all_stasiun"),
            CacheKey::AllSchedules => f.write_str("all_schedules"),
            CacheKey::StationSchedules(id) => write!(f, "schedules_stations_{id}"),
            CacheKey::StationDirection {
                station_id,
                direction,
                variant,
            } => write!(f, "{station_id}_{direction}_{variant}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Stations(Arc<Vec<Station>>),
    Schedules(Arc<Vec<Schedule>>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    inserted_at: DateTime<Utc>,
}

/// Process-local cache of query results.
///
/// Cloning shares the underlying storage.
#[derive(Clone)]
pub struct QueryCache {
    entries: MokaCache<CacheKey, CacheEntry>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl QueryCache {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let entries = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();
        let ttl = chrono::Duration::from_std(config.ttl).unwrap_or(chrono::Duration::MAX);

        Self {
            entries,
            ttl,
            clock,
        }
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.inserted_at >= self.ttl
    }

    /// Remove `key` only if the entry stored under it is still expired at
    /// `now`. An entry written since the caller looked is left alone.
    async fn evict_if_expired(&self, key: CacheKey, now: DateTime<Utc>) -> bool {
        let ttl = self.ttl;
        let result = self
            .entries
            .entry(key)
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) if now - entry.value().inserted_at >= ttl => Op::Remove,
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
        matches!(result, CompResult::Removed(_))
    }

    /// Look up a key, treating expired entries as absent.
    pub async fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        let entry = self.entries.get(key).await?;
        let now = self.clock.now();
        if self.is_expired(&entry, now) {
            if self.evict_if_expired(key.clone(), now).await {
                debug!(key = %key, "Cache entry expired");
            }
            return None;
        }
        Some(entry.value)
    }

    pub async fn set(&self, key: CacheKey, value: CachedValue) {
        let entry = CacheEntry {
            value,
            inserted_at: self.clock.now(),
        };
        self.entries.insert(key, entry).await;
    }

    pub async fn get_stations(&self, key: &CacheKey) -> Option<Arc<Vec<Station>>> {
        match self.get(key).await? {
            CachedValue::Stations(stations) => Some(stations),
            CachedValue::Schedules(_) => None,
        }
    }

    pub async fn get_schedules(&self, key: &CacheKey) -> Option<Arc<Vec<Schedule>>> {
        match self.get(key).await? {
            CachedValue::Schedules(schedules) => Some(schedules),
            CachedValue::Stations(_) => None,
        }
    }

    /// Evict every expired entry. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let expired: Vec<Arc<CacheKey>> = self
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| key)
            .collect();

        let mut removed = 0;
        for key in expired {
            if self.evict_if_expired(key.as_ref().clone(), now).await {
                removed += 1;
            }
        }
        self.entries.run_pending_tasks().await;
        removed
    }

    /// Run [`sweep`](Self::sweep) every `interval` for the life of the process.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.sweep().await;
                if removed > 0 {
                    debug!(removed, "Swept expired cache entries");
                }
            }
        })
    }

    /// Approximate number of cached entries.
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Invalidate all cached entries.
    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }
}
