//! LRU+TTL cache of derived configuration values.

use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::cache::persistence::{self, PersistedEntry};
use crate::events::types::now_millis;
use crate::events::ChangeEvent;
use crate::observability::metrics;
use crate::settings::CacheSettings;

struct CacheEntry {
    value: Value,
    inserted_at: Instant,
    ttl: Duration,
    access_count: u64,
    /// Monotonic recency sequence; lowest is least recently used.
    last_touch: u64,
    size_bytes: usize,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }

    fn remaining_ttl(&self) -> Duration {
        self.ttl.saturating_sub(self.inserted_at.elapsed())
    }
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    touch_seq: u64,
}

/// Bulk-removal strategies for [`ConfigCache::invalidate`].
#[derive(Debug, Clone)]
pub enum InvalidationStrategy {
    All,
    Expired,
    /// Remove keys containing the given substring.
    Pattern(String),
}

/// Running cache counters, updated on every access.
#[derive(Debug, Clone)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub total_entries: usize,
    pub total_size_bytes: usize,
    pub average_access_time_us: f64,
    pub evictions: u64,
    pub last_eviction_ms: Option<u64>,
}

/// TTL/LRU cache kept coherent with the store through change events.
pub struct ConfigCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    default_ttl: Duration,
    flush_interval: Duration,
    persistence_path: Option<PathBuf>,
    dirty: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
    access_time_us: AtomicU64,
    evictions: AtomicU64,
    /// 0 means "no eviction yet".
    last_eviction_ms: AtomicU64,
}

impl ConfigCache {
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                touch_seq: 0,
            }),
            capacity: settings.capacity.max(1),
            default_ttl: Duration::from_millis(settings.default_ttl_ms),
            flush_interval: Duration::from_millis(settings.flush_interval_ms.max(100)),
            persistence_path: settings.persistence_path.as_ref().map(PathBuf::from),
            dirty: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            access_time_us: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            last_eviction_ms: AtomicU64::new(0),
        }
    }

    /// Look up a key. An expired entry is a miss and is removed here.
    pub fn get(&self, key: &str) -> Option<Value> {
        let started = Instant::now();
        let result = {
            let mut inner = self.inner.lock().expect("cache mutex poisoned");
            let expired = inner.entries.get(key).is_some_and(CacheEntry::is_expired);
            if expired {
                inner.entries.remove(key);
                self.note_eviction();
                self.dirty.store(true, Ordering::Relaxed);
                None
            } else {
                let seq = inner.touch_seq + 1;
                inner.touch_seq = seq;
                inner.entries.get_mut(key).map(|entry| {
                    entry.access_count += 1;
                    entry.last_touch = seq;
                    entry.value.clone()
                })
            }
        };

        match &result {
            Some(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_hit();
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_miss();
            }
        }
        self.access_time_us
            .fetch_add(started.elapsed().as_micros() as u64, Ordering::Relaxed);
        result
    }

    /// Insert a value, evicting the least-recently-used entry when full.
    pub fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let size_bytes = serde_json::to_vec(&value).map(|v| v.len()).unwrap_or(0);
        let ttl = ttl.unwrap_or(self.default_ttl);

        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        if !inner.entries.contains_key(key) && inner.entries.len() >= self.capacity {
            let lru_key = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_touch)
                .map(|(k, _)| k.clone());
            if let Some(lru_key) = lru_key {
                inner.entries.remove(&lru_key);
                self.note_eviction();
                tracing::debug!(key = %lru_key, "Evicted least-recently-used cache entry");
            }
        }

        let seq = inner.touch_seq + 1;
        inner.touch_seq = seq;
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl,
                access_count: 0,
                last_touch: seq,
                size_bytes,
            },
        );
        metrics::record_cache_size(inner.entries.len());
        drop(inner);
        self.dirty.store(true, Ordering::Relaxed);
    }

    pub fn delete(&self, key: &str) -> bool {
        let removed = self
            .inner
            .lock()
            .expect("cache mutex poisoned")
            .entries
            .remove(key)
            .is_some();
        if removed {
            self.dirty.store(true, Ordering::Relaxed);
        }
        removed
    }

    pub fn clear(&self) {
        self.inner
            .lock()
            .expect("cache mutex poisoned")
            .entries
            .clear();
        self.dirty.store(true, Ordering::Relaxed);
        metrics::record_cache_size(0);
    }

    /// Presence check without touching statistics or recency. An expired
    /// entry counts as absent.
    pub fn has(&self, key: &str) -> bool {
        self.inner
            .lock()
            .expect("cache mutex poisoned")
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Bulk removal. Returns the number of entries removed.
    pub fn invalidate(&self, strategy: InvalidationStrategy) -> usize {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        let before = inner.entries.len();
        match &strategy {
            InvalidationStrategy::All => inner.entries.clear(),
            InvalidationStrategy::Expired => {
                inner.entries.retain(|_, entry| !entry.is_expired());
            }
            InvalidationStrategy::Pattern(pattern) => {
                inner.entries.retain(|key, _| !key.contains(pattern.as_str()));
            }
        }
        let removed = before - inner.entries.len();
        drop(inner);
        if removed > 0 {
            self.dirty.store(true, Ordering::Relaxed);
            tracing::debug!(?strategy, removed, "Invalidated cache entries");
        }
        removed
    }

    /// Drop every key overlapping a path touched by the event (substring
    /// match in either direction). Called synchronously from the notifier,
    /// so coherence holds before the triggering update returns.
    pub fn handle_change_event(&self, event: &ChangeEvent) {
        let paths: Vec<&str> = event.invalidation_paths().collect();
        if paths.is_empty() {
            return;
        }

        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        let before = inner.entries.len();
        inner.entries.retain(|key, _| {
            !paths
                .iter()
                .any(|path| key.contains(path) || path.contains(key.as_str()))
        });
        let removed = before - inner.entries.len();
        drop(inner);

        if removed > 0 {
            self.dirty.store(true, Ordering::Relaxed);
            tracing::debug!(
                source = %event.source,
                removed,
                "Invalidated cache entries for configuration change"
            );
        }
    }

    pub fn statistics(&self) -> CacheStatistics {
        let (total_entries, total_size_bytes) = {
            let inner = self.inner.lock().expect("cache mutex poisoned");
            let size = inner.entries.values().map(|e| e.size_bytes).sum();
            (inner.entries.len(), size)
        };

        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let accesses = hits + misses;
        let last_eviction = self.last_eviction_ms.load(Ordering::Relaxed);

        CacheStatistics {
            hits,
            misses,
            hit_rate: if accesses == 0 {
                0.0
            } else {
                hits as f64 / accesses as f64
            },
            total_entries,
            total_size_bytes,
            average_access_time_us: if accesses == 0 {
                0.0
            } else {
                self.access_time_us.load(Ordering::Relaxed) as f64 / accesses as f64
            },
            evictions: self.evictions.load(Ordering::Relaxed),
            last_eviction_ms: (last_eviction != 0).then_some(last_eviction),
        }
    }

    /// Load persisted entries, skipping any that expired while offline.
    /// No-op without a persistence path.
    pub async fn warm_from_disk(&self) {
        let Some(path) = &self.persistence_path else {
            return;
        };
        if !path.exists() {
            return;
        }

        match persistence::load(path).await {
            Ok(persisted) => {
                let now = now_millis();
                let mut inner = self.inner.lock().expect("cache mutex poisoned");
                let mut loaded = 0;
                for (key, entry) in persisted {
                    if entry.expires_at_ms <= now {
                        continue;
                    }
                    let seq = inner.touch_seq + 1;
                    inner.touch_seq = seq;
                    let size_bytes = serde_json::to_vec(&entry.value)
                        .map(|v| v.len())
                        .unwrap_or(0);
                    inner.entries.insert(
                        key,
                        CacheEntry {
                            value: entry.value,
                            inserted_at: Instant::now(),
                            ttl: Duration::from_millis(entry.expires_at_ms - now),
                            access_count: 0,
                            last_touch: seq,
                            size_bytes,
                        },
                    );
                    loaded += 1;
                }
                tracing::info!(path = %path.display(), loaded, "Warmed cache from disk");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to warm cache from disk");
            }
        }
    }

    /// Write the current entries to disk. No-op without a persistence path.
    pub async fn persist_to_disk(&self) -> std::io::Result<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let snapshot: HashMap<String, PersistedEntry> = {
            let now = now_millis();
            let inner = self.inner.lock().expect("cache mutex poisoned");
            inner
                .entries
                .iter()
                .filter(|(_, entry)| !entry.is_expired())
                .map(|(key, entry)| {
                    (
                        key.clone(),
                        PersistedEntry {
                            value: entry.value.clone(),
                            expires_at_ms: now + entry.remaining_ttl().as_millis() as u64,
                        },
                    )
                })
                .collect()
        };

        persistence::save(path, &snapshot).await?;
        tracing::debug!(path = %path.display(), entries = snapshot.len(), "Persisted cache to disk");
        Ok(())
    }

    /// Background flush loop: writes dirty state on an interval and once
    /// more at shutdown. Spawned by the composition root.
    pub async fn run_persistence(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if self.persistence_path.is_none() {
            return;
        }
        let mut ticker = tokio::time::interval(self.flush_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.dirty.swap(false, Ordering::Relaxed) {
                        if let Err(e) = self.persist_to_disk().await {
                            tracing::warn!(error = %e, "Cache persistence failed");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender also ends the loop.
                    if changed.is_err() || *shutdown.borrow() {
                        if self.dirty.swap(false, Ordering::Relaxed) {
                            if let Err(e) = self.persist_to_disk().await {
                                tracing::warn!(error = %e, "Final cache persistence failed");
                            }
                        }
                        break;
                    }
                }
            }
        }
    }

    fn note_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        self.last_eviction_ms.store(now_millis(), Ordering::Relaxed);
        metrics::record_cache_eviction();
    }
}
