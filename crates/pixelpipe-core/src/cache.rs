//! In-process cache of decoded images keyed by their load string.
//!
//! Entries expire a fixed TTL after insertion or their last refresh. Reads
//! never expire anything themselves; a background sweeper removes stale
//! entries once per sweep interval.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::types::Image;

struct CacheEntry {
    image: Arc<Image>,
    inserted_at: Instant,
}

struct Inner {
    entries: RwLock<HashMap<String, CacheEntry>>,
    enabled: AtomicBool,
    ttl: Duration,
    sweep_interval: Duration,
}

/// Thread-safe TTL cache of decoded images. Clones share state.
#[derive(Clone)]
pub struct DecodeCache {
    inner: Arc<Inner>,
}

impl DecodeCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                enabled: AtomicBool::new(config.enabled),
                ttl: config.ttl(),
                sweep_interval: config.sweep_interval(),
            }),
        }
    }

    /// Return the cached image, if any. Does not refresh the entry.
    pub fn get(&self, key: &str) -> Option<Arc<Image>> {
        if !self.is_enabled() {
            return None;
        }
        let entries = self.inner.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).map(|entry| Arc::clone(&entry.image))
    }

    /// Insert or replace an entry, stamping it with the current time.
    pub fn put(&self, key: impl Into<String>, image: Arc<Image>) {
        if !self.is_enabled() {
            return;
        }
        let mut entries = self.inner.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.into(),
            CacheEntry {
                image,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Restart the TTL of an existing entry. Returns false if absent.
    pub fn update_timestamp(&self, key: &str) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let mut entries = self.inner.entries.write().unwrap_or_else(|e| e.into_inner());
        match entries.get_mut(key) {
            Some(entry) => {
                entry.inserted_at = Instant::now();
                true
            }
            None => false,
        }
    }

    pub fn enable(&self) {
        self.inner.enabled.store(true, Ordering::Release);
    }

    /// Stop serving and storing entries. Existing entries are kept.
    pub fn disable(&self) {
        self.inner.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.inner
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Remove every entry older than the TTL. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        self.inner.evict_expired()
    }

    /// Start the background sweeper on the current tokio runtime.
    ///
    /// The task only holds a weak reference and exits once every clone of
    /// the cache has been dropped.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let period = self.inner.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    tracing::debug!("Decode cache dropped, sweeper exiting");
                    break;
                };
                let removed = inner.evict_expired();
                if removed > 0 {
                    tracing::debug!("Evicted {removed} expired decode cache entries");
                }
            }
        })
    }
}

impl Inner {
    fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.inserted_at) <= self.ttl);
        before - entries.len()
    }
}

impl std::fmt::Debug for DecodeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeCache")
            .field("entries", &self.len())
            .field("enabled", &self.is_enabled())
            .field("ttl", &self.inner.ttl)
            .finish()
    }
}
