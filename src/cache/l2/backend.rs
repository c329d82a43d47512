use crate::cache::entry::TtlTier;

use super::error::L2CacheResult;
use super::types::L2Record;

/// Durable key-value store behind the L1 cache.
///
/// Every read that takes `now` must treat rows with `expires_at <= now` as absent, whether or
/// not they have been physically deleted yet.
pub trait L2Backend: Send + Sync + 'static {
    /// Fetches a live record.
    fn get(
        &self,
        key: &str,
        now: i64,
    ) -> impl std::future::Future<Output = L2CacheResult<Option<L2Record>>> + Send;

    /// Insert-or-replace; last writer wins.
    fn set(&self, record: L2Record)
    -> impl std::future::Future<Output = L2CacheResult<()>> + Send;

    /// Removes a key; returns `true` if a row was deleted.
    fn delete(&self, key: &str) -> impl std::future::Future<Output = L2CacheResult<bool>> + Send;

    /// Deletes every expired row in one statement; returns the number removed.
    fn delete_expired(
        &self,
        now: i64,
    ) -> impl std::future::Future<Output = L2CacheResult<u64>> + Send;

    /// Number of live rows in `tier`.
    fn count_by_tier(
        &self,
        tier: TtlTier,
        now: i64,
    ) -> impl std::future::Future<Output = L2CacheResult<u64>> + Send;

    /// Truncates the table; returns the number of rows removed.
    fn clear(&self) -> impl std::future::Future<Output = L2CacheResult<u64>> + Send;
}
