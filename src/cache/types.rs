use std::sync::Arc;

use serde::Serialize;

use super::entry::TtlTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CacheStatus {
    HitL1,
    HitL2,
    Miss,
}

impl CacheStatus {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::HitL1 => "HIT_L1",
            CacheStatus::HitL2 => "HIT_L2",
            CacheStatus::Miss => "MISS",
        }
    }

    #[inline]
    pub fn is_hit(&self) -> bool {
        !matches!(self, CacheStatus::Miss)
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A successful tiered lookup.
#[derive(Debug)]
pub struct CacheHit<P> {
    pub payload: Arc<P>,
    pub total_count: u64,
    pub tier: TtlTier,
    pub status: CacheStatus,
    /// The entry is in the tail of its TTL; callers may recompute in the background.
    pub should_refresh: bool,
}

/// Live entry counts per tier in L2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub standard: u64,
    pub popular: u64,
    pub rare: u64,
}

impl TierCounts {
    pub fn total(&self) -> u64 {
        self.standard + self.popular + self.rare
    }
}

/// Point-in-time snapshot of the tiered cache counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TieredCacheStats {
    pub l1_hits: u64,
    pub l1_misses: u64,
    pub l2_hits: u64,
    pub l2_misses: u64,
    pub promotions: u64,
    pub demotions: u64,
    pub evictions: u64,
    pub l1_entries: usize,
    pub l1_bytes: usize,
    pub l2_tier_counts: TierCounts,
}

impl TieredCacheStats {
    /// Hits from either tier.
    pub fn total_hits(&self) -> u64 {
        self.l1_hits + self.l2_hits
    }

    /// A lookup is a miss only if it missed every consulted tier, i.e. an L2 miss, or an L1 miss
    /// when L2 was not consulted.
    pub fn total_misses(&self) -> u64 {
        self.l1_misses.saturating_sub(self.l2_hits)
    }

    /// `hits / (hits + misses)`, `0.0` before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.total_hits();
        let total = hits + self.total_misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}
