use std::sync::Arc;

use parking_lot::Mutex;

use super::entry::{CacheEntry, TierPolicy, TtlTier};
use super::l1::{L1Cache, estimate_entry_size};
use crate::constants::{ENTRY_OVERHEAD_BYTES, L1_PURGE_BATCH};

fn entry(key: &str, payload: &str) -> CacheEntry<String> {
    CacheEntry::create(
        key,
        payload.to_string(),
        1,
        TtlTier::Standard,
        &TierPolicy::default(),
        1_000,
    )
}

fn recording_hook(cache: L1Cache<String>) -> (L1Cache<String>, Arc<Mutex<Vec<String>>>) {
    let evicted = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&evicted);
    let cache = cache.with_eviction_hook(Arc::new(move |key: &str, _entry: &CacheEntry<String>| {
        sink.lock().push(key.to_string());
    }));
    (cache, evicted)
}

#[test]
fn test_l1_cache_new_is_empty() {
    let cache: L1Cache<String> = L1Cache::new();
    assert!(cache.is_empty());
    assert_eq!(cache.len(), 0);
    assert_eq!(cache.total_bytes(), 0);
}

#[test]
fn test_l1_insert_and_get() {
    let cache = L1Cache::with_limits(10, 1 << 20);
    assert!(cache.insert(entry("k1", "payload")));

    let got = cache.get("k1").expect("should find entry");
    assert_eq!(got.payload.as_str(), "payload");
    assert_eq!(got.total_count, 1);
    assert!(cache.get("missing").is_none());
}

#[test]
fn test_l1_size_estimate() {
    let e = entry("abc", "xy");
    // "xy" serializes to "\"xy\"" (4 bytes).
    assert_eq!(estimate_entry_size(&e), 3 + 4 + ENTRY_OVERHEAD_BYTES);

    let cache = L1Cache::with_limits(10, 1 << 20);
    cache.insert(e.clone());
    assert_eq!(cache.total_bytes(), estimate_entry_size(&e));
}

#[test]
fn test_l1_replace_does_not_double_count_bytes() {
    let cache = L1Cache::with_limits(10, 1 << 20);
    cache.insert(entry("k", "short"));
    cache.insert(entry("k", "a much longer payload"));

    assert_eq!(cache.len(), 1);
    assert_eq!(
        cache.total_bytes(),
        estimate_entry_size(&entry("k", "a much longer payload"))
    );
}

#[test]
fn test_l1_evicts_least_recently_used_by_count() {
    let (cache, evicted) = recording_hook(L1Cache::with_limits(2, 1 << 20));

    cache.insert(entry("a", "1"));
    cache.insert(entry("b", "2"));
    // Touch "a" so "b" becomes the LRU entry.
    assert!(cache.get("a").is_some());
    cache.insert(entry("c", "3"));

    assert_eq!(cache.len(), 2);
    assert!(cache.contains("a"));
    assert!(!cache.contains("b"));
    assert!(cache.contains("c"));
    assert_eq!(evicted.lock().as_slice(), ["b"]);
}

#[test]
fn test_l1_evicts_by_byte_bound() {
    let one = estimate_entry_size(&entry("a", "1"));
    let (cache, evicted) = recording_hook(L1Cache::with_limits(100, one * 2));

    cache.insert(entry("a", "1"));
    cache.insert(entry("b", "2"));
    cache.insert(entry("c", "3"));

    assert_eq!(cache.len(), 2);
    assert!(cache.total_bytes() <= one * 2);
    assert_eq!(evicted.lock().as_slice(), ["a"]);
}

#[test]
fn test_l1_rejects_oversized_entry() {
    let (cache, evicted) = recording_hook(L1Cache::with_limits(10, ENTRY_OVERHEAD_BYTES + 8));

    assert!(cache.insert(entry("a", "1")));
    assert!(!cache.insert(entry("big", &"x".repeat(64))));

    assert!(cache.contains("a"));
    assert!(!cache.contains("big"));
    assert!(evicted.lock().is_empty());
}

#[test]
fn test_l1_remove_and_clear_skip_hook() {
    let (cache, evicted) = recording_hook(L1Cache::with_limits(10, 1 << 20));
    cache.insert(entry("a", "1"));
    cache.insert(entry("b", "2"));

    assert!(cache.remove("a").is_some());
    assert!(cache.remove("a").is_none());
    cache.clear();

    assert!(cache.is_empty());
    assert_eq!(cache.total_bytes(), 0);
    assert!(evicted.lock().is_empty());
}

#[test]
fn test_l1_purge_stale_removes_only_expired() {
    let cache = L1Cache::with_limits(10, 1 << 20);
    let policy = TierPolicy::default();
    let short = CacheEntry::create("rare", "r".to_string(), 0, TtlTier::Rare, &policy, 0);
    let long = CacheEntry::create("popular", "p".to_string(), 0, TtlTier::Popular, &policy, 0);
    let rare_expiry = short.expires_at;

    cache.insert(short);
    cache.insert(long);

    assert_eq!(cache.purge_stale(rare_expiry), 0);
    assert_eq!(cache.purge_stale(rare_expiry + 1), 1);
    assert!(!cache.contains("rare"));
    assert!(cache.contains("popular"));
    assert_eq!(
        cache.total_bytes(),
        estimate_entry_size(&cache.peek("popular").unwrap())
    );
}

#[test]
fn test_l1_update_mutates_in_place() {
    let cache = L1Cache::with_limits(10, 1 << 20);
    cache.insert(entry("a", "1"));

    let hits = cache.update("a", |e| {
        e.hit_count += 1;
        e.hit_count
    });
    assert_eq!(hits, Some(1));
    assert_eq!(cache.peek("a").unwrap().hit_count, 1);
    assert_eq!(cache.update("missing", |e| e.hit_count), None);
}

#[test]
fn test_l1_peek_does_not_refresh_recency() {
    let cache = L1Cache::with_limits(2, 1 << 20);
    cache.insert(entry("a", "1"));
    cache.insert(entry("b", "2"));

    assert!(cache.peek("a").is_some());
    cache.insert(entry("c", "3"));

    assert!(!cache.contains("a"));
    assert_eq!(cache.keys(), vec!["c".to_string(), "b".to_string()]);
}

#[test]
fn test_l1_hook_receives_evicted_entry() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let cache = L1Cache::with_limits(1, 1 << 20).with_eviction_hook(Arc::new(
        move |key: &str, e: &CacheEntry<String>| {
            sink.lock().push((key.to_string(), e.payload.as_ref().clone()));
        },
    ));

    cache.insert(entry("first", "one"));
    cache.insert(entry("second", "two"));

    assert_eq!(
        seen.lock().as_slice(),
        [("first".to_string(), "one".to_string())]
    );
}

#[test]
fn test_l1_purge_stale_spans_multiple_batches() {
    let total = L1_PURGE_BATCH * 2 + 7;
    let cache = L1Cache::with_limits(total, 1 << 24);
    let policy = TierPolicy::default();
    let mut rare_expiry = 0;
    for i in 0..total {
        let tier = if i % 3 == 0 { TtlTier::Rare } else { TtlTier::Popular };
        let e = CacheEntry::create(format!("k{i}"), i.to_string(), 0, tier, &policy, 0);
        if tier == TtlTier::Rare {
            rare_expiry = e.expires_at;
        }
        cache.insert(e);
    }
    let expected = (0..total).filter(|i| i % 3 == 0).count();

    assert_eq!(cache.purge_stale(rare_expiry + 1), expected);
    assert_eq!(cache.len(), total - expected);
    assert!((0..total).all(|i| cache.contains(&format!("k{i}")) == (i % 3 != 0)));
    assert_eq!(cache.purge_stale(rare_expiry + 1), 0);
}
