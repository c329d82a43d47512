//! L1 in-process cache.
//!
//! Bounded by entry count and by an estimated byte size (`key + serialized payload + fixed
//! overhead`). Eviction is least-recently-used. Capacity evictions are reported to an optional
//! hook *after* the internal lock is released, so the hook may do arbitrary work.

use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use super::entry::CacheEntry;
use crate::constants::{
    DEFAULT_L1_MAX_BYTES, DEFAULT_L1_MAX_ENTRIES, ENTRY_OVERHEAD_BYTES, L1_PURGE_BATCH,
};

/// Called with `(key, entry)` for every capacity eviction.
pub type EvictionHook<P> = Arc<dyn Fn(&str, &CacheEntry<P>) + Send + Sync>;

struct Slot<P> {
    entry: CacheEntry<P>,
    size: usize,
}

struct L1State<P> {
    entries: LruCache<String, Slot<P>>,
    total_bytes: usize,
}

/// Size- and count-bounded LRU cache of [`CacheEntry`] values.
pub struct L1Cache<P> {
    state: Mutex<L1State<P>>,
    max_entries: usize,
    max_bytes: usize,
    on_evict: Option<EvictionHook<P>>,
}

/// Estimated footprint of an entry for the byte bound.
pub fn estimate_entry_size<P: Serialize>(entry: &CacheEntry<P>) -> usize {
    entry.key.len() + entry.payload_len() + ENTRY_OVERHEAD_BYTES
}

impl<P: Serialize> L1Cache<P> {
    /// Creates a cache with the default bounds.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_L1_MAX_ENTRIES, DEFAULT_L1_MAX_BYTES)
    }

    /// Creates a cache with explicit bounds (each at least 1).
    pub fn with_limits(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            state: Mutex::new(L1State {
                entries: LruCache::unbounded(),
                total_bytes: 0,
            }),
            max_entries: max_entries.max(1),
            max_bytes: max_bytes.max(1),
            on_evict: None,
        }
    }

    /// Installs the capacity-eviction hook.
    pub fn with_eviction_hook(mut self, hook: EvictionHook<P>) -> Self {
        self.on_evict = Some(hook);
        self
    }

    /// Returns a clone of the entry and marks it most recently used.
    pub fn get(&self, key: &str) -> Option<CacheEntry<P>> {
        self.state.lock().entries.get(key).map(|s| s.entry.clone())
    }

    /// Returns a clone of the entry without touching recency.
    pub fn peek(&self, key: &str) -> Option<CacheEntry<P>> {
        self.state.lock().entries.peek(key).map(|s| s.entry.clone())
    }

    /// Mutates an entry in place (marking it most recently used).
    ///
    /// The closure must not change the payload; the size estimate is not recomputed.
    pub fn update<R>(&self, key: &str, f: impl FnOnce(&mut CacheEntry<P>) -> R) -> Option<R> {
        self.state
            .lock()
            .entries
            .get_mut(key)
            .map(|slot| f(&mut slot.entry))
    }

    /// Inserts or replaces an entry, then evicts LRU entries until both bounds hold.
    ///
    /// Returns `false` if the entry alone exceeds the byte bound and was not admitted.
    pub fn insert(&self, entry: CacheEntry<P>) -> bool {
        let size = estimate_entry_size(&entry);
        let key = entry.key.clone();

        if size > self.max_bytes {
            debug!(key = %key, size, max_bytes = self.max_bytes, "Entry too large for L1");
            self.remove(&key);
            return false;
        }

        let evicted = {
            let mut state = self.state.lock();
            if let Some(old) = state.entries.put(key, Slot { entry, size }) {
                state.total_bytes -= old.size;
            }
            state.total_bytes += size;

            let mut evicted = Vec::new();
            while state.entries.len() > self.max_entries || state.total_bytes > self.max_bytes {
                match state.entries.pop_lru() {
                    Some((k, slot)) => {
                        state.total_bytes -= slot.size;
                        evicted.push((k, slot.entry));
                    }
                    None => break,
                }
            }
            evicted
        };

        if !evicted.is_empty() {
            debug!(count = evicted.len(), "L1 capacity eviction");
            if let Some(hook) = &self.on_evict {
                for (k, e) in &evicted {
                    hook(k, e);
                }
            }
        }
        true
    }

    /// Removes an entry without invoking the eviction hook.
    pub fn remove(&self, key: &str) -> Option<CacheEntry<P>> {
        let mut state = self.state.lock();
        let slot = state.entries.pop(key)?;
        state.total_bytes -= slot.size;
        Some(slot.entry)
    }

    /// Drops every expired entry; returns how many were removed. The hook is not invoked.
    ///
    /// Scans in batches of [`L1_PURGE_BATCH`] and releases the lock between batches. Entries
    /// reordered by concurrent access during the scan may be skipped until the next purge.
    pub fn purge_stale(&self, now: i64) -> usize {
        let mut removed = 0;
        let mut cursor = 0;
        loop {
            let mut state = self.state.lock();
            let mut scanned = 0;
            let stale: Vec<String> = state
                .entries
                .iter()
                .skip(cursor)
                .take(L1_PURGE_BATCH)
                .inspect(|_| scanned += 1)
                .filter(|(_, slot)| slot.entry.is_expired(now))
                .map(|(k, _)| k.clone())
                .collect();

            for key in &stale {
                if let Some(slot) = state.entries.pop(key) {
                    state.total_bytes -= slot.size;
                }
            }
            removed += stale.len();
            cursor += scanned - stale.len();

            if scanned < L1_PURGE_BATCH {
                return removed;
            }
        }
    }

    /// Removes all entries without invoking the hook.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.total_bytes = 0;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the size estimates of all resident entries.
    pub fn total_bytes(&self) -> usize {
        self.state.lock().total_bytes
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<String> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }
}

impl<P: Serialize> Default for L1Cache<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> std::fmt::Debug for L1Cache<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("L1Cache")
            .field("entries", &state.entries.len())
            .field("total_bytes", &state.total_bytes)
            .field("max_entries", &self.max_entries)
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}
