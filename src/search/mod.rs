//! Hybrid search: keyword + semantic ranking fused with weighted Reciprocal Rank Fusion.
//!
//! - [`HybridSearchEngine`] runs the pipeline and caches results through
//!   [`TieredCache`](crate::cache::TieredCache).
//! - [`fusion`] holds the rank-fusion math, independent of any store.

mod config;
mod engine;
mod error;
pub mod fusion;
mod types;


pub use config::SearchConfig;
#[cfg(any(test, feature = "mock"))]
pub use engine::MockSearchEngine;
pub use engine::{CachedResults, HybridSearchEngine, SqliteSearchEngine};
pub use error::SearchError;
pub use fusion::{FusedHit, RankedList, ScoredId, reciprocal_rank_fusion};
pub use types::{SearchFilters, SearchRequest, SearchResponse, SearchResultRow};
