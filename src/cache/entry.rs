//! Cache entry value type and the TTL-tier policy that drives its transitions.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::l2::L2Record;
use crate::constants::{
    DEFAULT_POPULAR_HIT_THRESHOLD, DEFAULT_POPULAR_TTL_SECS, DEFAULT_RARE_TTL_SECS,
    DEFAULT_REFRESH_FRACTION, DEFAULT_STALL_WINDOW_SECS, DEFAULT_STANDARD_TTL_SECS,
};
use crate::payload::{self, PayloadError};

/// Coarse popularity class controlling TTL and demotion eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtlTier {
    #[default]
    Standard,
    Popular,
    Rare,
}

impl TtlTier {
    pub const ALL: [TtlTier; 3] = [TtlTier::Standard, TtlTier::Popular, TtlTier::Rare];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            TtlTier::Standard => "standard",
            TtlTier::Popular => "popular",
            TtlTier::Rare => "rare",
        }
    }
}

impl fmt::Display for TtlTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TtlTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "popular" => Ok(Self::Popular),
            "rare" => Ok(Self::Rare),
            _ => Err(format!("Unknown TTL tier: {}", s)),
        }
    }
}

/// TTL durations and the thresholds for moving between tiers.
#[derive(Debug, Clone, PartialEq)]
pub struct TierPolicy {
    pub standard_ttl: Duration,
    pub popular_ttl: Duration,
    pub rare_ttl: Duration,
    /// Hits at which an entry becomes `Popular`.
    pub popular_hit_threshold: u64,
    /// Idle time after which the tier decays one step toward `Rare`.
    pub stall_window: Duration,
    /// Tail fraction of the lifetime in which [`CacheEntry::should_refresh`] is true.
    pub refresh_fraction: f64,
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self {
            standard_ttl: Duration::from_secs(DEFAULT_STANDARD_TTL_SECS),
            popular_ttl: Duration::from_secs(DEFAULT_POPULAR_TTL_SECS),
            rare_ttl: Duration::from_secs(DEFAULT_RARE_TTL_SECS),
            popular_hit_threshold: DEFAULT_POPULAR_HIT_THRESHOLD,
            stall_window: Duration::from_secs(DEFAULT_STALL_WINDOW_SECS),
            refresh_fraction: DEFAULT_REFRESH_FRACTION,
        }
    }
}

impl TierPolicy {
    /// TTL in milliseconds for `tier`, never below 1.
    pub fn ttl_ms(&self, tier: TtlTier) -> i64 {
        let ttl = match tier {
            TtlTier::Standard => self.standard_ttl,
            TtlTier::Popular => self.popular_ttl,
            TtlTier::Rare => self.rare_ttl,
        };
        i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1)
    }

    fn stall_window_ms(&self) -> i64 {
        i64::try_from(self.stall_window.as_millis()).unwrap_or(i64::MAX)
    }
}

/// A cached payload plus its bookkeeping. Timestamps are epoch milliseconds.
///
/// The payload is reference counted so hits hand out cheap clones.
#[derive(Debug)]
pub struct CacheEntry<P> {
    pub key: String,
    pub payload: Arc<P>,
    pub total_count: u64,
    pub ttl_tier: TtlTier,
    pub created_at: i64,
    pub expires_at: i64,
    pub last_accessed_at: i64,
    pub hit_count: u64,
}

impl<P> Clone for CacheEntry<P> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            payload: Arc::clone(&self.payload),
            total_count: self.total_count,
            ttl_tier: self.ttl_tier,
            created_at: self.created_at,
            expires_at: self.expires_at,
            last_accessed_at: self.last_accessed_at,
            hit_count: self.hit_count,
        }
    }
}

impl<P> CacheEntry<P> {
    /// Fresh entry with `hit_count = 0` and `expires_at = now + ttl(tier)`.
    pub fn create(
        key: impl Into<String>,
        payload: P,
        total_count: u64,
        ttl_tier: TtlTier,
        policy: &TierPolicy,
        now: i64,
    ) -> Self {
        Self {
            key: key.into(),
            payload: Arc::new(payload),
            total_count,
            ttl_tier,
            created_at: now,
            expires_at: now.saturating_add(policy.ttl_ms(ttl_tier)),
            last_accessed_at: now,
            hit_count: 0,
        }
    }

    /// Counts a hit and escalates to `Popular` once the threshold is reached.
    ///
    /// Returns `true` if the tier changed.
    pub fn record_hit(&mut self, now: i64, policy: &TierPolicy) -> bool {
        self.hit_count = self.hit_count.saturating_add(1);
        self.last_accessed_at = self.last_accessed_at.max(now);

        if self.ttl_tier != TtlTier::Popular && self.hit_count >= policy.popular_hit_threshold {
            self.ttl_tier = TtlTier::Popular;
            self.expires_at = self
                .expires_at
                .max(now.saturating_add(policy.ttl_ms(TtlTier::Popular)));
            return true;
        }
        false
    }

    /// Steps the tier down once if the entry has been idle past the stall window.
    ///
    /// Expiry is left untouched. Returns the new tier if it changed.
    pub fn decay(&mut self, now: i64, policy: &TierPolicy) -> Option<TtlTier> {
        if now.saturating_sub(self.last_accessed_at) <= policy.stall_window_ms() {
            return None;
        }
        let next = match self.ttl_tier {
            TtlTier::Popular => TtlTier::Standard,
            TtlTier::Standard => TtlTier::Rare,
            TtlTier::Rare => return None,
        };
        self.ttl_tier = next;
        Some(next)
    }

    #[inline]
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }

    /// True in the last `refresh_fraction` of the entry's lifetime (and not yet expired).
    pub fn should_refresh(&self, now: i64, refresh_fraction: f64) -> bool {
        if self.is_expired(now) {
            return false;
        }
        let lifetime = (self.expires_at - self.created_at).max(1) as f64;
        let remaining = (self.expires_at - now) as f64;
        remaining <= lifetime * refresh_fraction.clamp(0.0, 1.0)
    }

    /// Whether an L1 capacity eviction should persist this entry into L2.
    #[inline]
    pub fn is_demotable(&self, now: i64) -> bool {
        !self.is_expired(now) && self.ttl_tier != TtlTier::Rare
    }
}

impl<P: Serialize> CacheEntry<P> {
    /// Flattens the entry for the durable tier.
    pub fn to_record(&self) -> Result<L2Record, PayloadError> {
        Ok(L2Record {
            key: self.key.clone(),
            payload: payload::encode(self.payload.as_ref())?,
            total_count: self.total_count,
            ttl_tier: self.ttl_tier,
            created_at: self.created_at,
            expires_at: self.expires_at,
            last_accessed_at: self.last_accessed_at,
            hit_count: self.hit_count,
        })
    }

    /// Serialized payload length, used for the L1 size estimate.
    pub fn payload_len(&self) -> usize {
        serde_json::to_vec(self.payload.as_ref())
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

impl<P: DeserializeOwned> CacheEntry<P> {
    /// Rebuilds an entry from a durable record, rejecting poisoned payloads.
    pub fn from_record(record: L2Record) -> Result<Self, PayloadError> {
        let payload: P = payload::decode_guarded(&record.payload)?;
        Ok(Self {
            key: record.key,
            payload: Arc::new(payload),
            total_count: record.total_count,
            ttl_tier: record.ttl_tier,
            created_at: record.created_at,
            expires_at: record.expires_at,
            last_accessed_at: record.last_accessed_at,
            hit_count: record.hit_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> TierPolicy {
        TierPolicy {
            standard_ttl: Duration::from_secs(100),
            popular_ttl: Duration::from_secs(1_000),
            rare_ttl: Duration::from_secs(10),
            popular_hit_threshold: 3,
            stall_window: Duration::from_secs(50),
            refresh_fraction: 0.1,
        }
    }

    #[test]
    fn test_create_sets_expiry_from_tier() {
        let p = policy();
        let entry = CacheEntry::create("k", vec![1u32], 1, TtlTier::Standard, &p, 1_000);
        assert_eq!(entry.created_at, 1_000);
        assert_eq!(entry.expires_at, 1_000 + 100_000);
        assert_eq!(entry.hit_count, 0);
        assert!(entry.expires_at > entry.created_at);

        let rare = CacheEntry::create("k", (), 0, TtlTier::Rare, &p, 0);
        assert_eq!(rare.expires_at, 10_000);
    }

    #[test]
    fn test_zero_ttl_still_expires_after_creation() {
        let p = TierPolicy {
            standard_ttl: Duration::ZERO,
            ..policy()
        };
        let entry = CacheEntry::create("k", (), 0, TtlTier::Standard, &p, 5);
        assert!(entry.expires_at > entry.created_at);
    }

    #[test]
    fn test_is_expired_boundary() {
        let entry = CacheEntry::create("k", (), 0, TtlTier::Standard, &policy(), 0);
        assert!(!entry.is_expired(entry.expires_at));
        assert!(entry.is_expired(entry.expires_at + 1));
    }

    #[test]
    fn test_record_hit_escalates_to_popular() {
        let p = policy();
        let mut entry = CacheEntry::create("k", (), 0, TtlTier::Standard, &p, 0);

        assert!(!entry.record_hit(10, &p));
        assert!(!entry.record_hit(20, &p));
        assert_eq!(entry.ttl_tier, TtlTier::Standard);
        assert_eq!(entry.last_accessed_at, 20);

        assert!(entry.record_hit(30, &p));
        assert_eq!(entry.hit_count, 3);
        assert_eq!(entry.ttl_tier, TtlTier::Popular);
        assert_eq!(entry.expires_at, 30 + 1_000_000);

        assert!(!entry.record_hit(40, &p));
        assert_eq!(entry.hit_count, 4);
    }

    #[test]
    fn test_decay_steps_toward_rare_when_idle() {
        let p = policy();
        let mut entry = CacheEntry::create("k", (), 0, TtlTier::Popular, &p, 0);
        let expires = entry.expires_at;

        assert_eq!(entry.decay(50_000, &p), None);
        assert_eq!(entry.decay(50_001, &p), Some(TtlTier::Standard));
        assert_eq!(entry.decay(50_001, &p), Some(TtlTier::Rare));
        assert_eq!(entry.decay(50_001, &p), None);
        assert_eq!(entry.expires_at, expires);
    }

    #[test]
    fn test_should_refresh_in_tail_window() {
        let p = policy();
        let entry = CacheEntry::create("k", (), 0, TtlTier::Standard, &p, 0);

        assert!(!entry.should_refresh(0, 0.1));
        assert!(!entry.should_refresh(89_999, 0.1));
        assert!(entry.should_refresh(90_000, 0.1));
        assert!(entry.should_refresh(100_000, 0.1));
        assert!(!entry.should_refresh(100_001, 0.1));
    }

    #[test]
    fn test_is_demotable() {
        let p = policy();
        let standard = CacheEntry::create("k", (), 0, TtlTier::Standard, &p, 0);
        let rare = CacheEntry::create("k", (), 0, TtlTier::Rare, &p, 0);

        assert!(standard.is_demotable(1));
        assert!(!standard.is_demotable(standard.expires_at + 1));
        assert!(!rare.is_demotable(1));
    }

    #[test]
    fn test_record_roundtrip_preserves_bookkeeping() {
        let p = policy();
        let mut entry = CacheEntry::create(
            "search:abc",
            vec!["a".to_string(), "b".to_string()],
            7,
            TtlTier::Standard,
            &p,
            100,
        );
        entry.record_hit(200, &p);

        let record = entry.to_record().unwrap();
        assert_eq!(record.payload, r#"["a","b"]"#);

        let back: CacheEntry<Vec<String>> = CacheEntry::from_record(record).unwrap();
        assert_eq!(back.payload.as_slice(), ["a", "b"]);
        assert_eq!(back.total_count, 7);
        assert_eq!(back.hit_count, 1);
        assert_eq!(back.last_accessed_at, 200);
        assert_eq!(back.expires_at, entry.expires_at);
    }

    #[test]
    fn test_from_record_rejects_poisoned_payload() {
        let record = L2Record {
            key: "k".into(),
            payload: r#"[{"id": "a", "__proto__": {"admin": true}}]"#.into(),
            total_count: 1,
            ttl_tier: TtlTier::Standard,
            created_at: 0,
            expires_at: 10,
            last_accessed_at: 0,
            hit_count: 0,
        };
        let result = CacheEntry::<serde_json::Value>::from_record(record);
        assert!(matches!(result, Err(PayloadError::DangerousKey { .. })));
    }

    #[test]
    fn test_tier_parse_and_display() {
        for tier in TtlTier::ALL {
            assert_eq!(tier.as_str().parse::<TtlTier>().unwrap(), tier);
            assert_eq!(tier.to_string(), tier.as_str());
        }
        assert!("legendary".parse::<TtlTier>().is_err());
    }
}
