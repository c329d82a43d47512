use crate::cache::entry::TtlTier;

/// Flat, payload-agnostic row of the durable tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L2Record {
    pub key: String,
    /// Serialized JSON payload.
    pub payload: String,
    pub total_count: u64,
    pub ttl_tier: TtlTier,
    pub created_at: i64,
    pub expires_at: i64,
    pub last_accessed_at: i64,
    pub hit_count: u64,
}

impl L2Record {
    #[inline]
    pub fn is_live(&self, now: i64) -> bool {
        self.expires_at > now
    }
}
