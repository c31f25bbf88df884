//! TTL cache for detector answers, keyed by intent kind and normalized
//! query. Volatile data gets short lifetimes (stock quotes age out in
//! seconds), stable data longer ones.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

pub const CACHE_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Weather,
    Currency,
    News,
    Stock,
    Search,
}

impl CacheKind {
    pub fn ttl(&self) -> Duration {
        match self {
            CacheKind::Weather => Duration::from_secs(10 * 60),
            CacheKind::Currency => Duration::from_secs(60),
            CacheKind::News => Duration::from_secs(5 * 60),
            CacheKind::Stock => Duration::from_secs(30),
            CacheKind::Search => Duration::from_secs(5 * 60),
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheKind::Weather => "weather",
            CacheKind::Currency => "currency",
            CacheKind::News => "news",
            CacheKind::Stock => "stock",
            CacheKind::Search => "search",
        };
        f.write_str(name)
    }
}

struct CacheEntry {
    value: String,
    inserted: Instant,
    ttl: Duration,
}

pub struct SearchCache {
    entries: HashMap<String, CacheEntry>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl Default for SearchCache {
    fn default() -> Self {
        SearchCache::with_capacity(CACHE_CAPACITY)
    }
}

impl SearchCache {
    pub fn with_capacity(capacity: usize) -> Self {
        SearchCache {
            entries: HashMap::new(),
            capacity,
            hits: 0,
            misses: 0,
        }
    }

    fn key(kind: CacheKind, query: &str) -> String {
        format!("{}:{}", kind, query.trim().to_lowercase())
    }

    pub fn get(&mut self, kind: CacheKind, query: &str) -> Option<String> {
        self.get_at(kind, query, Instant::now())
    }

    pub fn put(&mut self, kind: CacheKind, query: &str, value: String) {
        self.put_at(kind, query, value, Instant::now())
    }

    fn get_at(&mut self, kind: CacheKind, query: &str, now: Instant) -> Option<String> {
        let key = Self::key(kind, query);
        let expired = match self.entries.get(&key) {
            Some(entry) => now.duration_since(entry.inserted) > entry.ttl,
            None => {
                self.misses += 1;
                return None;
            }
        };
        if expired {
            self.entries.remove(&key);
            self.misses += 1;
            return None;
        }
        self.hits += 1;
        self.entries.get(&key).map(|e| e.value.clone())
    }

    fn put_at(&mut self, kind: CacheKind, query: &str, value: String, now: Instant) {
        if self.entries.len() >= self.capacity {
            // Evict the oldest entry to stay bounded.
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.inserted)
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(
            Self::key(kind, query),
            CacheEntry {
                value,
                inserted: now,
                ttl: kind.ttl(),
            },
        );
    }

    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
