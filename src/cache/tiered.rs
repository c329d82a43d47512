//! Tiered cache: L1 in-process + L2 durable.
//!
//! `set` writes through to both tiers. L1 capacity evictions of unexpired, non-`Rare` entries are
//! queued by the L1 hook and persisted to L2 before the operation that caused them returns.
//! A read/write gate makes `invalidate_all` exclusive with respect to every other operation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, instrument, warn};

use super::clock::{SharedClock, SystemClock};
use super::entry::{CacheEntry, TierPolicy, TtlTier};
use super::l1::{EvictionHook, L1Cache};
use super::l2::{L2Backend, L2Record};
use super::types::{CacheHit, CacheStatus, TierCounts, TieredCacheStats};
use crate::constants::{DEFAULT_L1_MAX_BYTES, DEFAULT_L1_MAX_ENTRIES};
use crate::hashing::validate_cache_key;

#[cfg(any(test, feature = "mock"))]
use super::clock::ManualClock;
#[cfg(any(test, feature = "mock"))]
use super::l2::InMemoryL2Store;

/// Settings for [`TieredCache`].
#[derive(Debug, Clone, PartialEq)]
pub struct TieredCacheConfig {
    pub l1_max_entries: usize,
    pub l1_max_bytes: usize,
    /// Whether the durable tier is consulted at all.
    pub l2_enabled: bool,
    /// Copy L2 hits into L1.
    pub promotion_enabled: bool,
    pub policy: TierPolicy,
}

impl Default for TieredCacheConfig {
    fn default() -> Self {
        Self {
            l1_max_entries: DEFAULT_L1_MAX_ENTRIES,
            l1_max_bytes: DEFAULT_L1_MAX_BYTES,
            l2_enabled: true,
            promotion_enabled: true,
            policy: TierPolicy::default(),
        }
    }
}

impl TieredCacheConfig {
    pub fn with_l1_limits(mut self, max_entries: usize, max_bytes: usize) -> Self {
        self.l1_max_entries = max_entries;
        self.l1_max_bytes = max_bytes;
        self
    }

    pub fn with_l2_enabled(mut self, enabled: bool) -> Self {
        self.l2_enabled = enabled;
        self
    }

    pub fn with_promotion(mut self, enabled: bool) -> Self {
        self.promotion_enabled = enabled;
        self
    }

    pub fn with_policy(mut self, policy: TierPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    l1_hits: AtomicU64,
    l1_misses: AtomicU64,
    l2_hits: AtomicU64,
    l2_misses: AtomicU64,
    promotions: AtomicU64,
    demotions: AtomicU64,
    evictions: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Two-tier cache of serializable payloads keyed by validated cache keys.
pub struct TieredCache<P, B: L2Backend> {
    l1: L1Cache<P>,
    l2: Option<B>,
    config: TieredCacheConfig,
    clock: SharedClock,
    counters: Arc<Counters>,
    pending_demotions: Mutex<mpsc::UnboundedReceiver<L2Record>>,
    gate: RwLock<()>,
}

impl<P, B: L2Backend> std::fmt::Debug for TieredCache<P, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("l1", &self.l1)
            .field("l2_enabled", &self.l2.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl<P, B> TieredCache<P, B>
where
    P: Serialize + DeserializeOwned + Send + Sync + 'static,
    B: L2Backend,
{
    /// Creates a cache reading the system clock. `l2` is ignored when `config.l2_enabled` is false.
    pub fn new(config: TieredCacheConfig, l2: B) -> Self {
        Self::with_clock(config, l2, Arc::new(SystemClock))
    }

    pub fn with_clock(config: TieredCacheConfig, l2: B, clock: SharedClock) -> Self {
        let counters = Arc::new(Counters::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let l2 = config.l2_enabled.then_some(l2);

        let hook = demotion_hook(
            tx,
            Arc::clone(&clock),
            config.policy.clone(),
            Arc::clone(&counters),
            l2.is_some(),
        );
        let l1 = L1Cache::with_limits(config.l1_max_entries, config.l1_max_bytes)
            .with_eviction_hook(hook);

        Self {
            l1,
            l2,
            config,
            clock,
            counters,
            pending_demotions: Mutex::new(rx),
            gate: RwLock::new(()),
        }
    }

    pub fn l1(&self) -> &L1Cache<P> {
        &self.l1
    }

    pub fn l2(&self) -> Option<&B> {
        self.l2.as_ref()
    }

    pub fn config(&self) -> &TieredCacheConfig {
        &self.config
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Looks `key` up in L1, then L2. Invalid keys are absent without touching either tier.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn get(&self, key: &str) -> Option<CacheHit<P>> {
        if let Err(e) = validate_cache_key(key) {
            debug!(error = %e, "Rejected cache key");
            return None;
        }

        let _gate = self.gate.read().await;
        let hit = self.lookup(key).await;
        self.drain_demotions().await;
        hit
    }

    async fn lookup(&self, key: &str) -> Option<CacheHit<P>> {
        let now = self.clock.now_ms();
        let policy = &self.config.policy;

        let l1_hit = self.l1.update(key, |entry| {
            if entry.is_expired(now) {
                return None;
            }
            entry.record_hit(now, policy);
            Some(hit_from(entry, CacheStatus::HitL1, now, policy))
        });

        match l1_hit {
            Some(Some(hit)) => {
                Counters::bump(&self.counters.l1_hits);
                debug!(tier = %hit.tier, "L1 cache hit");
                return Some(hit);
            }
            Some(None) => {
                self.l1.remove(key);
                debug!("Dropped expired L1 entry");
            }
            None => {}
        }
        Counters::bump(&self.counters.l1_misses);

        let l2 = self.l2.as_ref()?;
        let record = match l2.get(key, now).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                Counters::bump(&self.counters.l2_misses);
                return None;
            }
            Err(e) => {
                warn!(error = %e, "L2 lookup failed, treating as miss");
                Counters::bump(&self.counters.l2_misses);
                return None;
            }
        };

        let mut entry = match CacheEntry::<P>::from_record(record) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Rejected L2 payload, deleting row");
                if let Err(e) = l2.delete(key).await {
                    warn!(error = %e, "Failed to delete rejected L2 row");
                }
                Counters::bump(&self.counters.l2_misses);
                return None;
            }
        };

        entry.record_hit(now, policy);
        Counters::bump(&self.counters.l2_hits);
        self.write_l2(l2, &entry).await;

        let hit = hit_from(&entry, CacheStatus::HitL2, now, policy);
        if self.config.promotion_enabled && self.l1.insert(entry) {
            Counters::bump(&self.counters.promotions);
            debug!("Promoted L2 entry into L1");
        }
        debug!(tier = %hit.tier, "L2 cache hit");
        Some(hit)
    }

    /// Stores a fresh entry in L1 and writes it through to L2.
    ///
    /// Returns `false` only for an invalid key. L2 failures are logged and leave the L1 copy in place.
    #[instrument(skip(self, payload), fields(key = %key, tier = %tier))]
    pub async fn set(&self, key: &str, payload: P, total_count: u64, tier: TtlTier) -> bool {
        if let Err(e) = validate_cache_key(key) {
            debug!(error = %e, "Rejected cache key");
            return false;
        }

        let _gate = self.gate.read().await;
        let now = self.clock.now_ms();
        let entry = CacheEntry::create(key, payload, total_count, tier, &self.config.policy, now);

        if !self.l1.insert(entry.clone()) {
            debug!("Entry exceeds L1 byte bound");
        }
        if let Some(l2) = &self.l2 {
            self.write_l2(l2, &entry).await;
        }

        self.drain_demotions().await;
        true
    }

    /// Removes `key` from both tiers. Returns whether either tier held it.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn invalidate(&self, key: &str) -> bool {
        if validate_cache_key(key).is_err() {
            return false;
        }

        let _gate = self.gate.read().await;
        let mut removed = self.l1.remove(key).is_some();
        if let Some(l2) = &self.l2 {
            match l2.delete(key).await {
                Ok(deleted) => removed |= deleted,
                Err(e) => warn!(error = %e, "L2 delete failed"),
            }
        }
        removed
    }

    /// Clears both tiers while no other operation is in flight.
    #[instrument(skip(self))]
    pub async fn invalidate_all(&self) {
        let _gate = self.gate.write().await;

        self.l1.clear();
        let discarded = {
            let mut rx = self.pending_demotions.lock();
            std::iter::from_fn(|| rx.try_recv().ok()).count()
        };

        let l2_removed = match &self.l2 {
            Some(l2) => match l2.clear().await {
                Ok(removed) => removed,
                Err(e) => {
                    warn!(error = %e, "L2 clear failed");
                    0
                }
            },
            None => 0,
        };
        info!(l2_removed, discarded, "Invalidated all cache entries");
    }

    /// Drops expired entries from both tiers; returns the number removed.
    #[instrument(skip(self))]
    pub async fn prune(&self) -> u64 {
        let _gate = self.gate.read().await;
        let now = self.clock.now_ms();

        let l1_removed = self.l1.purge_stale(now) as u64;
        let l2_removed = match &self.l2 {
            Some(l2) => match l2.delete_expired(now).await {
                Ok(removed) => removed,
                Err(e) => {
                    warn!(error = %e, "L2 prune failed");
                    0
                }
            },
            None => 0,
        };

        self.drain_demotions().await;
        debug!(l1_removed, l2_removed, "Pruned cache");
        l1_removed + l2_removed
    }

    /// Counter snapshot plus current L1 occupancy and live L2 tier counts (zero on L2 failure).
    pub async fn get_stats(&self) -> TieredCacheStats {
        let now = self.clock.now_ms();
        let mut l2_tier_counts = TierCounts::default();
        if let Some(l2) = &self.l2 {
            for tier in TtlTier::ALL {
                let count = match l2.count_by_tier(tier, now).await {
                    Ok(count) => count,
                    Err(e) => {
                        warn!(tier = %tier, error = %e, "L2 tier count failed");
                        0
                    }
                };
                match tier {
                    TtlTier::Standard => l2_tier_counts.standard = count,
                    TtlTier::Popular => l2_tier_counts.popular = count,
                    TtlTier::Rare => l2_tier_counts.rare = count,
                }
            }
        }

        let c = &self.counters;
        TieredCacheStats {
            l1_hits: c.l1_hits.load(Ordering::Relaxed),
            l1_misses: c.l1_misses.load(Ordering::Relaxed),
            l2_hits: c.l2_hits.load(Ordering::Relaxed),
            l2_misses: c.l2_misses.load(Ordering::Relaxed),
            promotions: c.promotions.load(Ordering::Relaxed),
            demotions: c.demotions.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            l1_entries: self.l1.len(),
            l1_bytes: self.l1.total_bytes(),
            l2_tier_counts,
        }
    }

    async fn write_l2(&self, l2: &B, entry: &CacheEntry<P>) {
        match entry.to_record() {
            Ok(record) => {
                if let Err(e) = l2.set(record).await {
                    warn!(error = %e, "L2 write failed");
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode entry for L2"),
        }
    }

    async fn drain_demotions(&self) {
        let Some(l2) = &self.l2 else {
            return;
        };
        let pending: Vec<L2Record> = {
            let mut rx = self.pending_demotions.lock();
            std::iter::from_fn(|| rx.try_recv().ok()).collect()
        };

        for record in pending {
            // A resident key was re-set or promoted after eviction; its L2 row is already newer.
            if self.l1.contains(&record.key) {
                continue;
            }
            let key = record.key.clone();
            match l2.set(record).await {
                Ok(()) => {
                    Counters::bump(&self.counters.demotions);
                    debug!(key = %key, "Demoted L1 entry into L2");
                }
                Err(e) => warn!(key = %key, error = %e, "Demotion write failed"),
            }
        }
    }
}

fn hit_from<P>(
    entry: &CacheEntry<P>,
    status: CacheStatus,
    now: i64,
    policy: &TierPolicy,
) -> CacheHit<P> {
    CacheHit {
        payload: Arc::clone(&entry.payload),
        total_count: entry.total_count,
        tier: entry.ttl_tier,
        status,
        should_refresh: entry.should_refresh(now, policy.refresh_fraction),
    }
}

fn demotion_hook<P: Serialize + Send + Sync + 'static>(
    tx: mpsc::UnboundedSender<L2Record>,
    clock: SharedClock,
    policy: TierPolicy,
    counters: Arc<Counters>,
    l2_enabled: bool,
) -> EvictionHook<P> {
    Arc::new(move |key: &str, evicted: &CacheEntry<P>| {
        Counters::bump(&counters.evictions);
        if !l2_enabled {
            return;
        }

        let now = clock.now_ms();
        let mut entry = evicted.clone();
        entry.decay(now, &policy);
        if !entry.is_demotable(now) {
            debug!(key = %key, tier = %entry.ttl_tier, "Evicted entry not demoted");
            return;
        }

        match entry.to_record() {
            Ok(record) => {
                if tx.send(record).is_err() {
                    debug!(key = %key, "Demotion queue closed");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "Failed to encode evicted entry"),
        }
    })
}

#[cfg(any(test, feature = "mock"))]
pub type MockTieredCache<P> = TieredCache<P, InMemoryL2Store>;

#[cfg(any(test, feature = "mock"))]
impl<P> TieredCache<P, InMemoryL2Store>
where
    P: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// In-memory L2 and a manual clock shared with the caller.
    pub fn new_mock(config: TieredCacheConfig, clock: ManualClock) -> Self {
        Self::with_clock(config, InMemoryL2Store::new(), Arc::new(clock))
    }

    /// The in-memory L2 store (panics if L2 is disabled).
    pub fn mock_l2(&self) -> &InMemoryL2Store {
        match &self.l2 {
            Some(l2) => l2,
            None => panic!("mock_l2 called with L2 disabled"),
        }
    }
}
