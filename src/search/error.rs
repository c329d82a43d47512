use thiserror::Error;

use crate::cache::L2CacheError;
use crate::config::ConfigError;
use crate::embedding::EmbeddingError;
use crate::storage::StorageError;
use crate::vectordb::VectorDbError;

/// Errors returned by indexing and engine construction. `search` itself never fails.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A document failed validation before anything was written.
    #[error("invalid document {id:?}: {reason}")]
    InvalidDocument { id: String, reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector index error: {0}")]
    VectorDb(#[from] VectorDbError),

    /// The durable cache tier could not be opened.
    #[error("cache error: {0}")]
    Cache(#[from] L2CacheError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
