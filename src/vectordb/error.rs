use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by vector index operations.
pub enum VectorDbError {
    /// Vector dimension mismatch.
    #[error("invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        actual: usize,
    },

    /// Embedding bytes were not a whole number of `f32` values.
    #[error("invalid embedding byte length: {actual} is not a multiple of 4")]
    InvalidEmbeddingBytesLength {
        /// Actual byte length.
        actual: usize,
    },

    /// Upsert failed.
    #[error("failed to upsert vectors: {message}")]
    UpsertFailed {
        /// Error message.
        message: String,
    },

    /// Search failed.
    #[error("vector search failed: {message}")]
    SearchFailed {
        /// Error message.
        message: String,
    },

    /// Delete failed.
    #[error("failed to delete vectors: {message}")]
    DeleteFailed {
        /// Error message.
        message: String,
    },
}
