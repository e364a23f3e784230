//! Keyed TTL cache in front of the aggregator.
//!
//! Serving policy per request:
//! - fresh and sufficient entry: served as is
//! - expired entry that still has enough items: served stale while a
//!   background refresh runs
//! - anything else: refreshed synchronously
//!
//! Every refresh runs inside a critical section, either one per cache key or
//! one for the whole cache depending on [`RefreshScope`]. Entries are
//! overwritten in place and never removed.

use crate::aggregator::NewsAggregator;
use crate::types::{NewsItem, NewsQuery};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Source of the current time, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshScope {
    /// One lock per cache key, created on first use
    #[default]
    PerKey,
    /// A single lock shared by every key
    Global,
}

impl FromStr for RefreshScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-key" | "per_key" | "perkey" => Ok(RefreshScope::PerKey),
            "global" => Ok(RefreshScope::Global),
            other => Err(format!("unknown refresh scope: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_limit: usize,
    pub limit_per_source: usize,
    pub refresh_scope: RefreshScope,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_limit: 50,
            limit_per_source: 15,
            refresh_scope: RefreshScope::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub items: Vec<NewsItem>,
    pub fetched_at: DateTime<Utc>,
    pub satisfied_limit: usize,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match (now - self.fetched_at).to_std() {
            Ok(age) => age < ttl,
            // fetched_at in the future
            Err(_) => true,
        }
    }

    pub fn is_sufficient(&self, limit: usize) -> bool {
        self.items.len() >= limit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Stale,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Stale => "STALE",
            CacheStatus::Miss => "MISS",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CachedNews {
    pub items: Vec<NewsItem>,
    pub status: CacheStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub fresh_entries: usize,
    pub refresh_locks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshMode {
    Sync,
    Background,
}

/// Cache coordinator. Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct NewsCache {
    aggregator: NewsAggregator,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    refresh_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    global_lock: Arc<Mutex<()>>,
    background: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl NewsCache {
    pub fn new(aggregator: NewsAggregator, config: CacheConfig) -> Self {
        Self::with_clock(aggregator, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        aggregator: NewsAggregator,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            aggregator,
            config,
            clock,
            entries: Arc::new(RwLock::new(HashMap::new())),
            refresh_locks: Arc::new(Mutex::new(HashMap::new())),
            global_lock: Arc::new(Mutex::new(())),
            background: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn aggregator(&self) -> &NewsAggregator {
        &self.aggregator
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn clamp_limit(&self, limit: usize) -> usize {
        limit.clamp(1, self.config.max_limit.max(1))
    }

    /// Serve `query` according to the stale-while-revalidate policy.
    pub async fn get_news(&self, mut query: NewsQuery) -> CachedNews {
        query.limit = self.clamp_limit(query.limit);
        let key = query.cache_key();
        let limit = query.limit;
        let now = self.clock.now();

        let cached = self.entries.read().await.get(&key).cloned();
        if let Some(entry) = cached {
            if entry.is_sufficient(limit) {
                let status = if entry.is_fresh(now, self.config.ttl) {
                    debug!(key = %key, "Cache hit");
                    CacheStatus::Hit
                } else {
                    debug!(key = %key, "Serving stale entry, refreshing in background");
                    self.schedule_refresh(key, query).await;
                    CacheStatus::Stale
                };
                return CachedNews {
                    items: truncated(entry.items, limit),
                    status,
                };
            }
            debug!(key = %key, have = entry.items.len(), want = limit, "Cached entry too short");
        }

        let items = self
            .refresh(&key, &query, RefreshMode::Sync)
            .await
            .unwrap_or_default();
        CachedNews {
            items: truncated(items, limit),
            status: CacheStatus::Miss,
        }
    }

    /// Snapshot of the entry stored under `key`.
    pub async fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        let fresh_entries = entries.values().filter(|e| e.is_fresh(now, self.config.ttl)).count();
        let refresh_locks = self.refresh_locks.lock().await.len();
        CacheStats {
            entries: entries.len(),
            fresh_entries,
            refresh_locks,
        }
    }

    /// Wait for every background refresh scheduled so far.
    pub async fn drain_background(&self) {
        let handles = std::mem::take(&mut *self.background.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background refresh task did not complete");
            }
        }
    }

    async fn schedule_refresh(&self, key: String, query: NewsQuery) {
        let cache = self.clone();
        let handle = tokio::spawn(async move {
            cache.refresh(&key, &query, RefreshMode::Background).await;
        });

        let mut background = self.background.lock().await;
        background.retain(|h| !h.is_finished());
        background.push(handle);
    }

    async fn refresh_lock(&self, key: &str) -> Arc<Mutex<()>> {
        match self.config.refresh_scope {
            RefreshScope::Global => self.global_lock.clone(),
            RefreshScope::PerKey => {
                let mut locks = self.refresh_locks.lock().await;
                locks.entry(key.to_string()).or_default().clone()
            }
        }
    }

    /// Recompute the entry for `key` inside its critical section.
    ///
    /// Returns `None` only when a background refresh is discarded.
    async fn refresh(
        &self,
        key: &str,
        query: &NewsQuery,
        mode: RefreshMode,
    ) -> Option<Vec<NewsItem>> {
        let lock = self.refresh_lock(key).await;
        let _guard = lock.lock().await;

        // Another refresh may have finished while we waited
        if let Some(entry) = self.entries.read().await.get(key) {
            let now = self.clock.now();
            if entry.is_fresh(now, self.config.ttl) && entry.is_sufficient(query.limit) {
                debug!(key = %key, "Entry refreshed concurrently, skipping fetch");
                return Some(entry.items.clone());
            }
        }

        let limit_per_source = self.config.limit_per_source.max(query.limit);
        let aggregation = self.aggregator.aggregate(query, limit_per_source).await;

        if mode == RefreshMode::Background {
            if aggregation.all_failed() {
                warn!(key = %key, "Every source failed in background refresh, keeping entry");
                return None;
            }
            // A partial result too short to serve would push the next caller onto
            // the synchronous path
            if !aggregation.failed_sources.is_empty() && aggregation.items.len() < query.limit {
                warn!(
                    key = %key,
                    failed = ?aggregation.failed_sources,
                    items = aggregation.items.len(),
                    "Background refresh short after source failures, keeping entry"
                );
                return None;
            }
        }

        let entry = CacheEntry {
            items: aggregation.items,
            fetched_at: self.clock.now(),
            satisfied_limit: query.limit,
        };
        let items = entry.items.clone();
        self.entries.write().await.insert(key.to_string(), entry);

        let background = mode == RefreshMode::Background;
        info!(key = %key, items = items.len(), background, "Cache refreshed");
        Some(items)
    }
}

fn truncated(mut items: Vec<NewsItem>, limit: usize) -> Vec<NewsItem> {
    items.truncate(limit);
    items
}
