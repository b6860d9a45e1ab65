//! TTL cache for aggregated prices.

use crate::domain::{AggregatedPrice, TimeMs};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: AggregatedPrice,
    expires_at: TimeMs,
}

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub ttl_secs: u64,
}

/// Aggregated prices keyed by `(symbol, quote)` with an absolute wall-clock TTL.
///
/// Expired entries are evicted lazily on access and eagerly by [`PriceCache::sweep_expired`].
#[derive(Debug)]
pub struct PriceCache {
    entries: RwLock<HashMap<(String, String), CacheEntry>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn ttl_ms(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    /// Fresh entry for the key, marked `cached = true`.
    pub fn get_at(&self, symbol: &str, quote: &str, now: TimeMs) -> Option<AggregatedPrice> {
        let key = (symbol.to_string(), quote.to_string());
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            match entries.get(&key) {
                Some(entry) if now < entry.expires_at => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    let mut value = entry.value.clone();
                    value.cached = true;
                    return Some(value);
                }
                Some(_) => {}
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        // Expired: evict under the write lock, unless a writer refreshed it meanwhile.
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get(&key) {
            if now < entry.expires_at {
                self.hits.fetch_add(1, Ordering::Relaxed);
                let mut value = entry.value.clone();
                value.cached = true;
                return Some(value);
            }
            entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(symbol, quote, "Evicted expired price");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store `value`, expiring `ttl` after `now`.
    pub fn insert_at(&self, value: AggregatedPrice, now: TimeMs) {
        let key = (value.symbol.clone(), value.quote.clone());
        let entry = CacheEntry {
            value,
            expires_at: now.saturating_add_ms(self.ttl_ms()),
        };
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, entry);
    }

    /// Evict every entry expired at `now`. Returns the number removed.
    pub fn sweep_expired_at(&self, now: TimeMs) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        let removed = before - entries.len();
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(TimeMs::now())
    }

    /// Drop every quote currency cached for `symbol`.
    pub fn invalidate(&self, symbol: &str) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|(sym, _), _| sym != symbol);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}
