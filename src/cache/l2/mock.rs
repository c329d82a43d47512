use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;

use super::backend::L2Backend;
use super::error::{L2CacheError, L2CacheResult};
use super::types::L2Record;
use crate::cache::entry::TtlTier;

/// In-memory L2 backend with a failure switch and write counter for tests.
#[derive(Default, Clone)]
pub struct InMemoryL2Store {
    records: Arc<RwLock<HashMap<String, L2Record>>>,
    failing: Arc<AtomicBool>,
    writes: Arc<AtomicU64>,
}

impl InMemoryL2Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation returns [`L2CacheError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Raw row regardless of expiry.
    pub fn raw(&self, key: &str) -> Option<L2Record> {
        self.records.read().get(key).cloned()
    }

    /// Inserts a row directly, bypassing the failure switch.
    pub fn insert_raw(&self, record: L2Record) {
        self.records.write().insert(record.key.clone(), record);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Number of successful `set` calls.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self) -> L2CacheResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(L2CacheError::Unavailable {
                reason: "mock store set to fail".to_string(),
            });
        }
        Ok(())
    }
}

impl L2Backend for InMemoryL2Store {
    async fn get(&self, key: &str, now: i64) -> L2CacheResult<Option<L2Record>> {
        self.check()?;
        Ok(self
            .records
            .read()
            .get(key)
            .filter(|r| r.is_live(now))
            .cloned())
    }

    async fn set(&self, record: L2Record) -> L2CacheResult<()> {
        self.check()?;
        self.records.write().insert(record.key.clone(), record);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> L2CacheResult<bool> {
        self.check()?;
        Ok(self.records.write().remove(key).is_some())
    }

    async fn delete_expired(&self, now: i64) -> L2CacheResult<u64> {
        self.check()?;
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, r| r.is_live(now));
        Ok((before - records.len()) as u64)
    }

    async fn count_by_tier(&self, tier: TtlTier, now: i64) -> L2CacheResult<u64> {
        self.check()?;
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.ttl_tier == tier && r.is_live(now))
            .count() as u64)
    }

    async fn clear(&self) -> L2CacheResult<u64> {
        self.check()?;
        let mut records = self.records.write();
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }
}
