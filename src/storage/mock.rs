use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;

use super::error::{StorageError, StorageResult};
use super::model::{KeywordHit, SearchFilters, SkillDocument, query_terms};
use super::store::{DocumentStore, KeywordIndex};

const NAME_WEIGHT: f64 = 3.0;
const TAG_WEIGHT: f64 = 2.0;
const DESCRIPTION_WEIGHT: f64 = 1.0;

/// In-memory document store and keyword index for tests.
///
/// Keyword scores are negated weighted term-occurrence counts, so lower is better like BM25.
#[derive(Debug, Default, Clone)]
pub struct InMemorySkillStore {
    docs: Arc<RwLock<BTreeMap<String, SkillDocument>>>,
    keyword_failing: Arc<AtomicBool>,
    keyword_queries: Arc<AtomicU64>,
}

impl InMemorySkillStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, [`KeywordIndex::search`] fails.
    pub fn set_keyword_failing(&self, failing: bool) {
        self.keyword_failing.store(failing, Ordering::SeqCst);
    }

    /// Number of keyword searches served (including failed ones).
    pub fn keyword_query_count(&self) -> u64 {
        self.keyword_queries.load(Ordering::SeqCst)
    }

    pub fn get(&self, id: &str) -> Option<SkillDocument> {
        self.docs.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }
}

fn occurrences(haystack: &str, term: &str) -> f64 {
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.to_lowercase() == term)
        .count() as f64
}

fn keyword_score(doc: &SkillDocument, terms: &[String]) -> f64 {
    let tags = doc.tags.join(" ");
    let relevance: f64 = terms
        .iter()
        .map(|term| {
            NAME_WEIGHT * occurrences(&doc.name, term)
                + TAG_WEIGHT * occurrences(&tags, term)
                + DESCRIPTION_WEIGHT * occurrences(&doc.description, term)
        })
        .sum();
    -relevance
}

impl DocumentStore for InMemorySkillStore {
    async fn upsert(&self, doc: SkillDocument) -> StorageResult<()> {
        self.docs.write().insert(doc.id.clone(), doc);
        Ok(())
    }

    async fn upsert_many(&self, docs: Vec<SkillDocument>) -> StorageResult<usize> {
        let count = docs.len();
        let mut stored = self.docs.write();
        for doc in docs {
            stored.insert(doc.id.clone(), doc);
        }
        Ok(count)
    }

    async fn get_by_ids(
        &self,
        ids: &[String],
        filters: &SearchFilters,
    ) -> StorageResult<Vec<SkillDocument>> {
        let stored = self.docs.read();
        Ok(ids
            .iter()
            .filter_map(|id| stored.get(id))
            .filter(|doc| doc.matches(filters))
            .cloned()
            .collect())
    }

    async fn count(&self) -> StorageResult<u64> {
        Ok(self.docs.read().len() as u64)
    }
}

impl KeywordIndex for InMemorySkillStore {
    async fn search(&self, query: &str, limit: usize) -> StorageResult<Vec<KeywordHit>> {
        self.keyword_queries.fetch_add(1, Ordering::SeqCst);
        if self.keyword_failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "mock keyword index set to fail".to_string(),
            ));
        }

        let terms = query_terms(query);
        let mut hits: Vec<KeywordHit> = self
            .docs
            .read()
            .values()
            .map(|doc| KeywordHit::new(doc.id.clone(), keyword_score(doc, &terms)))
            .filter(|hit| hit.score < 0.0)
            .collect();
        hits.sort_by(|a, b| a.score.total_cmp(&b.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }
}
