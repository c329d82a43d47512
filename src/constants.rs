//! Cross-cutting, shared constants.
//!
//! Module configs default to these values; [`crate::Config`] can override most of them from the
//! environment.

/// Default time-to-live of a `STANDARD` cache entry.
pub const DEFAULT_STANDARD_TTL_SECS: u64 = 60 * 60;
/// Default time-to-live of a `POPULAR` cache entry.
pub const DEFAULT_POPULAR_TTL_SECS: u64 = 24 * 60 * 60;
/// Default time-to-live of a `RARE` cache entry.
pub const DEFAULT_RARE_TTL_SECS: u64 = 5 * 60;

/// Hit count at which an entry is escalated to `POPULAR`.
pub const DEFAULT_POPULAR_HIT_THRESHOLD: u64 = 10;
/// Idle time after which an entry's tier decays one step toward `RARE`.
pub const DEFAULT_STALL_WINDOW_SECS: u64 = 30 * 60;
/// Fraction of the TTL (at the tail end) in which an entry is refresh-eligible.
pub const DEFAULT_REFRESH_FRACTION: f64 = 0.1;

/// Default max number of entries held in L1.
pub const DEFAULT_L1_MAX_ENTRIES: usize = 1_000;
/// Default max estimated bytes held in L1.
pub const DEFAULT_L1_MAX_BYTES: usize = 64 * 1024 * 1024;
/// Fixed per-entry overhead added to the L1 size estimate.
pub const ENTRY_OVERHEAD_BYTES: usize = 256;
/// Entries examined per lock acquisition when purging expired L1 entries.
pub const L1_PURGE_BATCH: usize = 256;

/// Default interval between background prune runs.
pub const DEFAULT_PRUNE_INTERVAL_SECS: u64 = 5 * 60;

/// Max accepted cache key length (bytes).
pub const MAX_CACHE_KEY_LEN: usize = 256;
/// Prefix of keys derived for search results.
pub const SEARCH_KEY_PREFIX: &str = "search";

/// RRF smoothing constant.
pub const DEFAULT_RRF_K: f64 = 60.0;
/// Default weight of the keyword signal.
pub const DEFAULT_KEYWORD_WEIGHT: f64 = 0.5;
/// Default weight of the semantic signal.
pub const DEFAULT_SEMANTIC_WEIGHT: f64 = 0.5;
/// Ranking queries request `page_end * multiplier` candidates.
pub const DEFAULT_CANDIDATE_MULTIPLIER: usize = 3;
/// Lower bound on candidates requested per ranking query.
pub const DEFAULT_MIN_CANDIDATES: usize = 50;
/// Upper bound on candidates requested per ranking query.
pub const DEFAULT_MAX_CANDIDATES: usize = 300;
/// Max page size accepted by `search`.
pub const DEFAULT_MAX_LIMIT: usize = 100;

/// Default embedding dimension of the built-in hash embedder.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;
/// Max number of query embeddings memoized by the search engine.
pub const DEFAULT_QUERY_EMBEDDING_CACHE_SIZE: u64 = 1_024;

/// SQLite file holding both the skill rows and the L2 cache table.
pub const DEFAULT_DATABASE_FILENAME: &str = "skillfuse.db";
