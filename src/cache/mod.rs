//! Two-tier result cache: bounded in-process L1 over a durable L2.

pub mod clock;
pub mod entry;
pub mod l1;
pub mod l2;
pub mod tiered;
pub mod types;

#[cfg(test)]
mod l1_tests;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use entry::{CacheEntry, TierPolicy, TtlTier};
pub use l1::{EvictionHook, L1Cache, estimate_entry_size};
#[cfg(any(test, feature = "mock"))]
pub use l2::InMemoryL2Store;
pub use l2::{L2_TABLE_NAME, L2Backend, L2CacheError, L2CacheResult, L2Record, SqliteL2Store};
#[cfg(any(test, feature = "mock"))]
pub use tiered::MockTieredCache;
pub use tiered::{TieredCache, TieredCacheConfig};
pub use types::{CacheHit, CacheStatus, TierCounts, TieredCacheStats};
