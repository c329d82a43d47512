use std::future::Future;

use super::error::StorageResult;
use super::model::{KeywordHit, SearchFilters, SkillDocument};

/// Row store for indexed documents.
pub trait DocumentStore: Send + Sync + 'static {
    /// Inserts or replaces a document by id.
    fn upsert(&self, doc: SkillDocument) -> impl Future<Output = StorageResult<()>> + Send;

    /// Inserts or replaces all documents atomically; returns how many were written.
    fn upsert_many(
        &self,
        docs: Vec<SkillDocument>,
    ) -> impl Future<Output = StorageResult<usize>> + Send;

    /// Documents among `ids` passing `filters`, in unspecified order. Unknown ids are skipped.
    fn get_by_ids(
        &self,
        ids: &[String],
        filters: &SearchFilters,
    ) -> impl Future<Output = StorageResult<Vec<SkillDocument>>> + Send;

    fn count(&self) -> impl Future<Output = StorageResult<u64>> + Send;
}

/// Full-text index over documents.
pub trait KeywordIndex: Send + Sync + 'static {
    /// Up to `limit` hits, most relevant first (lowest score first).
    fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> impl Future<Output = StorageResult<Vec<KeywordHit>>> + Send;
}
