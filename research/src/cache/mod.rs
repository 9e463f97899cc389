//! ContentCache - bounded URL -> content store with LRU + size cap + TTL

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where a cached entry's content ultimately came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    Primary,
    Archive,
    AltSource,
}

#[derive(Debug, Clone)]
pub struct ContentVersion {
    pub hash: String,
    pub fetched_at: Instant,
    pub size: usize,
    pub origin: Origin,
}

#[derive(Debug, Clone)]
pub struct ContentEntry {
    pub url: String,
    pub content: String,
    pub content_type: String,
    pub current_version: ContentVersion,
    pub last_accessed_at: Instant,
    pub access_count: u64,
}

impl ContentEntry {
    fn is_soft_stale(&self, ttl: Duration) -> bool {
        self.current_version.fetched_at.elapsed() >= ttl
    }
}

struct Inner {
    entries: HashMap<String, ContentEntry>,
    total_size: usize,
}

/// Thread-safe, bounded URL -> content cache with LRU eviction.
///
/// Entries older than `default_ttl` are soft-stale: `get()` never returns
/// them on the primary path, but [`ContentCache::get_stale`] still surfaces
/// them for `FallbackChain`'s last-resort step.
pub struct ContentCache {
    inner: Mutex<Inner>,
    max_size_bytes: usize,
    max_entries: usize,
    default_ttl: Duration,
}

impl ContentCache {
    pub fn new(max_size_bytes: usize, max_entries: usize, default_ttl: Duration) -> Self {
        debug!(max_size_bytes, max_entries, ?default_ttl, "Opening content cache");
        Self {
            inner: Mutex::new(Inner { entries: HashMap::new(), total_size: 0 }),
            max_size_bytes,
            max_entries,
            default_ttl,
        }
    }

    /// Fresh-only lookup for the primary fetch path. Bumps LRU bookkeeping on hit.
    pub fn get(&self, url: &str) -> Option<ContentEntry> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let ttl = self.default_ttl;
        let entry = inner.entries.get_mut(url)?;
        if entry.is_soft_stale(ttl) {
            return None;
        }
        entry.last_accessed_at = Instant::now();
        entry.access_count += 1;
        debug!(url, access_count = entry.access_count, "Cache hit");
        Some(entry.clone())
    }

    /// Lookup that also returns soft-stale entries, for `FallbackChain`'s last resort.
    pub fn get_stale(&self, url: &str) -> Option<ContentEntry> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let entry = inner.entries.get_mut(url)?;
        entry.last_accessed_at = Instant::now();
        entry.access_count += 1;
        Some(entry.clone())
    }

    pub fn insert(&self, url: impl Into<String>, content: String, content_type: impl Into<String>, hash: String, origin: Origin) {
        let url = url.into();
        let size = content.len();
        let now = Instant::now();
        let entry = ContentEntry {
            url: url.clone(),
            content,
            content_type: content_type.into(),
            current_version: ContentVersion { hash, fetched_at: now, size, origin },
            last_accessed_at: now,
            access_count: 0,
        };

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = inner.entries.remove(&url) {
            inner.total_size = inner.total_size.saturating_sub(old.current_version.size);
        }
        inner.total_size += size;
        inner.entries.insert(url, entry);
        self.evict_locked(&mut inner);
    }

    fn evict_locked(&self, inner: &mut Inner) {
        while inner.entries.len() > self.max_entries || inner.total_size > self.max_size_bytes {
            let lru_key = inner
                .entries
                .values()
                .min_by_key(|e| e.last_accessed_at)
                .map(|e| e.url.clone());
            let Some(key) = lru_key else { break };
            if let Some(removed) = inner.entries.remove(&key) {
                inner.total_size = inner.total_size.saturating_sub(removed.current_version.size);
                debug!(url = %key, "Evicted entry");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
