use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by an L2 backend.
pub enum L2CacheError {
    /// SQLite returned an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The blocking task running the statement panicked or was cancelled.
    #[error("blocking task failed: {reason}")]
    TaskJoin {
        /// Error message.
        reason: String,
    },

    /// The backend cannot serve requests right now.
    #[error("L2 unavailable: {reason}")]
    Unavailable {
        /// Error message.
        reason: String,
    },
}

/// Convenience result type for L2 operations.
pub type L2CacheResult<T> = Result<T, L2CacheError>;
