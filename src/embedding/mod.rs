//! Text embedding.
//!
//! - [`Embedder`] is the seam the search engine embeds queries and documents through.
//! - [`hash`] provides a deterministic, model-free implementation.

mod error;
/// Feature-hashing embedder.
pub mod hash;

pub use error::EmbeddingError;
pub use hash::HashEmbedder;

/// Maps text to a fixed-length vector.
pub trait Embedder: Send + Sync + 'static {
    /// Length of every vector this embedder returns.
    fn dim(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Cosine similarity; `0.0` for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
