use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use super::{SearchResult, VectorDbError, VectorPoint};
use crate::embedding::cosine_similarity;

/// Nearest-neighbor lookup over document embeddings.
pub trait VectorIndex: Send + Sync + 'static {
    /// Inserts or replaces points by id.
    fn upsert_vectors(
        &self,
        points: Vec<VectorPoint>,
    ) -> impl std::future::Future<Output = Result<(), VectorDbError>> + Send;

    /// Up to `limit` ids ordered by descending similarity (ties by id).
    fn find_similar(
        &self,
        query: Vec<f32>,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<SearchResult>, VectorDbError>> + Send;

    /// Deletes points.
    fn delete_vectors(
        &self,
        ids: Vec<String>,
    ) -> impl std::future::Future<Output = Result<(), VectorDbError>> + Send;
}

/// Sorts by descending score, breaking ties by id, and truncates to `limit`.
pub(crate) fn rank_by_similarity(mut hits: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    hits.retain(|h| h.score.is_finite());
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    hits.truncate(limit);
    hits
}

/// Brute-force cosine index held in memory.
#[derive(Debug)]
pub struct InMemoryVectorIndex {
    dim: usize,
    points: RwLock<HashMap<String, Vec<f32>>>,
}

impl InMemoryVectorIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            points: RwLock::new(HashMap::new()),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.points.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.read().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.points.read().contains_key(id)
    }

    fn check_dim(&self, vector: &[f32]) -> Result<(), VectorDbError> {
        if vector.len() != self.dim {
            return Err(VectorDbError::InvalidDimension {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl VectorIndex for InMemoryVectorIndex {
    async fn upsert_vectors(&self, points: Vec<VectorPoint>) -> Result<(), VectorDbError> {
        for point in &points {
            self.check_dim(&point.vector)?;
        }
        let mut stored = self.points.write();
        for point in points {
            stored.insert(point.id, point.vector);
        }
        Ok(())
    }

    async fn find_similar(
        &self,
        query: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<SearchResult>, VectorDbError> {
        self.check_dim(&query)?;
        let hits: Vec<SearchResult> = self
            .points
            .read()
            .iter()
            .map(|(id, vector)| SearchResult::new(id.clone(), cosine_similarity(&query, vector)))
            .collect();
        debug!(candidates = hits.len(), limit, "In-memory vector scan");
        Ok(rank_by_similarity(hits, limit))
    }

    async fn delete_vectors(&self, ids: Vec<String>) -> Result<(), VectorDbError> {
        let mut stored = self.points.write();
        for id in &ids {
            stored.remove(id);
        }
        Ok(())
    }
}
