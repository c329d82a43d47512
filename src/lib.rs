//! Skillfuse library crate: hybrid skill search over a two-tier result cache.
//!
//! # Public API Surface
//!
//! ## Search
//! - [`HybridSearchEngine`], [`SqliteSearchEngine`] - keyword + semantic ranking fused with RRF
//! - [`SearchRequest`], [`SearchResponse`], [`SearchResultRow`], [`SearchFilters`]
//! - [`reciprocal_rank_fusion`] - weighted RRF over arbitrary ranked lists
//!
//! ## Cache
//! - [`TieredCache`], [`TieredCacheConfig`] - L1 in-process over a durable L2
//! - [`CacheEntry`], [`TtlTier`], [`TierPolicy`] - entry lifecycle and TTL classes
//! - [`L1Cache`], [`L2Backend`], [`SqliteL2Store`] - the individual tiers
//! - [`CachePruner`] - periodic expiry pruning
//!
//! ## Storage & Embedding
//! - [`SkillDocument`], [`DocumentStore`], [`KeywordIndex`], [`SqliteSkillStore`]
//! - [`Embedder`], [`HashEmbedder`], [`VectorIndex`], [`InMemoryVectorIndex`]
//!
//! ## Utilities
//! - [`Config`] - `SKILLFUSE_*` environment configuration
//! - Cache-key derivation and validation, hardened payload decoding
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod hashing;
pub mod lifecycle;
pub mod payload;
pub mod search;
pub mod storage;
pub mod vectordb;

#[cfg(any(test, feature = "mock"))]
pub use cache::{InMemoryL2Store, MockTieredCache};
pub use cache::{
    CacheEntry, CacheHit, CacheStatus, Clock, L1Cache, L2Backend, L2CacheError, L2CacheResult,
    L2Record, ManualClock, SqliteL2Store, SystemClock, TierCounts, TierPolicy, TieredCache,
    TieredCacheConfig, TieredCacheStats, TtlTier,
};

pub use config::{Config, ConfigError};
pub use embedding::{Embedder, EmbeddingError, HashEmbedder, cosine_similarity};
pub use hashing::{KeyError, derive_cache_key, hash_query, normalize_query, validate_cache_key};
pub use lifecycle::CachePruner;
pub use payload::{PayloadError, decode_guarded};

#[cfg(any(test, feature = "mock"))]
pub use search::MockSearchEngine;
pub use search::{
    HybridSearchEngine, SearchConfig, SearchError, SearchFilters, SearchRequest, SearchResponse,
    SearchResultRow, SqliteSearchEngine, reciprocal_rank_fusion,
};

#[cfg(any(test, feature = "mock"))]
pub use storage::InMemorySkillStore;
pub use storage::{DocumentStore, KeywordIndex, SkillDocument, SqliteSkillStore, StorageError};

#[cfg(any(test, feature = "mock"))]
pub use vectordb::FailingVectorIndex;
pub use vectordb::{InMemoryVectorIndex, VectorDbError, VectorIndex, VectorPoint};
