//! Whole-page cache. Rendered pages are stored by request path (including the query string) and
//! served as-is until they expire or the cache is cleared. Writes never invalidate entries.
//!
//! The query string is client-controlled, so the number of entries is capped. When a new page
//! arrives at a full cache, expired pages are dropped first, then the oldest third.
use bytes::Bytes;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// A key/value store for rendered pages, with a fixed time-to-live per entry.
pub trait PageCache: Send + Sync {
    /// The cached body, if it's there and hasn't expired.
    fn get(&self, key: &str) -> Option<Bytes>;
    fn set(&self, key: String, body: Bytes);
    /// Forget every cached page.
    fn clear(&self);
}

struct Entry {
    body: Bytes,
    expires_at: Instant,
}

/// An in-process `PageCache`, shared by every worker of both HTTP servers.
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
    ttl: Duration,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Make room for one more entry.
    fn cull(&self, now: Instant) {
        self.entries.retain(|_, entry| entry.expires_at > now);
        if self.entries.len() < self.max_entries {
            return;
        }
        let mut by_age: Vec<(Instant, String)> = self
            .entries
            .iter()
            .map(|e| (e.value().expires_at, e.key().clone()))
            .collect();
        by_age.sort();
        let doomed = (by_age.len() / 3).max(1);
        for (_, key) in by_age.into_iter().take(doomed) {
            self.entries.remove(&key);
        }
    }
}

impl PageCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Bytes> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.body.clone());
            }
        }
        // Drop the read guard above before removing, or DashMap deadlocks on the shard.
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    fn set(&self, key: String, body: Bytes) {
        let now = Instant::now();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.cull(now);
        }
        let expires_at = now + self.ttl;
        self.entries.insert(key, Entry { body, expires_at });
    }

    fn clear(&self) {
        self.entries.clear();
    }
}
