use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("invalid embedder configuration: {reason}")]
    InvalidConfig { reason: String },
}
