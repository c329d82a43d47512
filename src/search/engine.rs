//! Hybrid keyword + semantic search over skills, cached through the tiered cache.
//!
//! A request runs `cache check -> keyword + semantic ranking (concurrent) -> weighted RRF ->
//! hydration -> cache write -> pagination`. The cached payload is the full ordered, filtered list,
//! so every page of a query is served from one computation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use moka::sync::Cache;
use tracing::{debug, info, instrument, warn};

use super::config::SearchConfig;
use super::error::SearchError;
use super::fusion::{FusedHit, RankedList, ScoredId, reciprocal_rank_fusion};
use super::types::{SearchFilters, SearchRequest, SearchResponse, SearchResultRow, paginate};
use crate::cache::{L2Backend, SqliteL2Store, TieredCache, TieredCacheStats, TtlTier};
use crate::config::Config;
use crate::embedding::{Embedder, HashEmbedder};
use crate::hashing::{derive_cache_key, hash_query};
use crate::storage::{DocumentStore, KeywordIndex, SkillDocument, SqliteSkillStore};
use crate::vectordb::{VectorIndex, VectorPoint};

#[cfg(any(test, feature = "mock"))]
use crate::cache::{InMemoryL2Store, ManualClock, TieredCacheConfig};
#[cfg(any(test, feature = "mock"))]
use crate::storage::InMemorySkillStore;
#[cfg(any(test, feature = "mock"))]
use crate::vectordb::InMemoryVectorIndex;

/// Cached value: the full hydrated ranking of one query + filter combination.
pub type CachedResults = Vec<SearchResultRow>;

const KEYWORD_LIST: usize = 0;
const SEMANTIC_LIST: usize = 1;

/// Keyword and semantic ranking fused with RRF over a document store.
pub struct HybridSearchEngine<K, V, D, B, E>
where
    B: L2Backend,
{
    keyword: Arc<K>,
    vectors: Arc<V>,
    documents: Arc<D>,
    embedder: E,
    cache: Arc<TieredCache<CachedResults, B>>,
    query_embeddings: Cache<[u8; 32], Arc<Vec<f32>>>,
    config: SearchConfig,
}

impl<K, V, D, B: L2Backend, E> std::fmt::Debug for HybridSearchEngine<K, V, D, B, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSearchEngine")
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish()
    }
}

impl<K, V, D, B, E> HybridSearchEngine<K, V, D, B, E>
where
    K: KeywordIndex,
    V: VectorIndex,
    D: DocumentStore,
    B: L2Backend,
    E: Embedder,
{
    pub fn new(
        keyword: Arc<K>,
        vectors: Arc<V>,
        documents: Arc<D>,
        embedder: E,
        cache: Arc<TieredCache<CachedResults, B>>,
        config: SearchConfig,
    ) -> Self {
        let query_embeddings = Cache::builder()
            .max_capacity(config.embedding_cache_size)
            .build();

        Self {
            keyword,
            vectors,
            documents,
            embedder,
            cache,
            query_embeddings,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<TieredCache<CachedResults, B>> {
        &self.cache
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn documents(&self) -> &Arc<D> {
        &self.documents
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub async fn cache_stats(&self) -> TieredCacheStats {
        self.cache.get_stats().await
    }

    /// Number of memoized query embeddings.
    pub fn cached_query_embeddings(&self) -> u64 {
        self.query_embeddings.run_pending_tasks();
        self.query_embeddings.entry_count()
    }

    /// Runs a search. Never fails: signal, storage and cache errors degrade to fewer or no results.
    #[instrument(skip(self, request), fields(query = %request.query, limit = request.limit, offset = request.offset))]
    pub async fn search(&self, request: &SearchRequest) -> SearchResponse {
        let started = Instant::now();
        let query = request.query.trim();
        if query.is_empty() {
            debug!("Blank query");
            return SearchResponse::empty(elapsed_ms(started));
        }

        if let Some(min) = request.filters.min_quality
            && !min.is_finite()
        {
            warn!(min_quality = min, "Non-finite quality filter, nothing can match");
            return SearchResponse::empty(elapsed_ms(started));
        }

        let limit = self.config.clamp_limit(request.limit);
        let offset = request.offset;

        let key = match derive_cache_key(query, &request.filters) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(error = %e, "Cache key derivation failed, bypassing cache");
                None
            }
        };

        if let Some(key) = &key
            && let Some(hit) = self.cache.get(key).await
        {
            debug!(status = %hit.status, should_refresh = hit.should_refresh, "Serving cached results");
            return SearchResponse {
                results: paginate(&hit.payload, offset, limit),
                total_count: hit.total_count,
                cached: true,
                search_time_ms: elapsed_ms(started),
            };
        }

        let Some(rows) = self.compute(query, &request.filters).await else {
            return SearchResponse::empty(elapsed_ms(started));
        };

        let total_count = rows.len() as u64;
        let results = paginate(&rows, offset, limit);
        if let Some(key) = key {
            self.cache
                .set(&key, rows, total_count, TtlTier::Standard)
                .await;
        }

        let search_time_ms = elapsed_ms(started);
        debug!(total_count, returned = results.len(), search_time_ms, "Search computed");
        SearchResponse {
            results,
            total_count,
            cached: false,
            search_time_ms,
        }
    }

    /// Ranks, fuses and hydrates. `None` when nothing trustworthy was produced (both signals
    /// failed or hydration failed), so the caller does not cache it.
    async fn compute(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Option<Vec<SearchResultRow>> {
        let candidates = self.config.candidate_count();
        let (keyword, semantic) = futures_util::join!(
            self.keyword_ranking(query, candidates),
            self.semantic_ranking(query, candidates),
        );

        if keyword.is_none() && semantic.is_none() {
            warn!("Both ranking signals failed");
            return None;
        }
        let keyword = keyword.unwrap_or_default();
        let semantic = semantic.unwrap_or_default();

        // Order must match KEYWORD_LIST and SEMANTIC_LIST.
        let lists = [
            RankedList::new(&keyword, self.config.keyword_weight),
            RankedList::new(&semantic, self.config.semantic_weight),
        ];
        let fused = reciprocal_rank_fusion(&lists, self.config.rrf_k);

        debug!(
            keyword = keyword.len(),
            semantic = semantic.len(),
            fused = fused.len(),
            "Fused rankings"
        );
        self.hydrate(fused, filters).await
    }

    /// Keyword hits with BM25-style scores negated so higher is better. `None` on failure.
    async fn keyword_ranking(&self, query: &str, limit: usize) -> Option<Vec<ScoredId>> {
        match self.keyword.search(query, limit).await {
            Ok(hits) => Some(
                hits.into_iter()
                    .map(|hit| ScoredId::new(hit.id, -hit.score))
                    .collect(),
            ),
            Err(e) => {
                warn!(error = %e, "Keyword ranking failed");
                None
            }
        }
    }

    async fn semantic_ranking(&self, query: &str, limit: usize) -> Option<Vec<ScoredId>> {
        let embedding = match self.query_embedding(query) {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(error = %e, "Query embedding failed");
                return None;
            }
        };

        match self.vectors.find_similar(embedding.to_vec(), limit).await {
            Ok(hits) => Some(
                hits.into_iter()
                    .map(|hit| ScoredId::new(hit.id, f64::from(hit.score)))
                    .collect(),
            ),
            Err(e) => {
                warn!(error = %e, "Semantic ranking failed");
                None
            }
        }
    }

    fn query_embedding(&self, query: &str) -> Result<Arc<Vec<f32>>, SearchError> {
        let hash = hash_query(query);
        if let Some(embedding) = self.query_embeddings.get(&hash) {
            return Ok(embedding);
        }

        let embedding = Arc::new(self.embedder.embed(query)?);
        self.query_embeddings.insert(hash, Arc::clone(&embedding));
        Ok(embedding)
    }

    /// Loads fused ids (filters applied by the store) and restores fused order.
    async fn hydrate(
        &self,
        fused: Vec<FusedHit>,
        filters: &SearchFilters,
    ) -> Option<Vec<SearchResultRow>> {
        if fused.is_empty() {
            return Some(Vec::new());
        }

        let ids: Vec<String> = fused.iter().map(|hit| hit.id.clone()).collect();
        let docs = match self.documents.get_by_ids(&ids, filters).await {
            Ok(docs) => docs,
            Err(e) => {
                warn!(error = %e, "Hydration failed");
                return None;
            }
        };

        let mut by_id: HashMap<String, SkillDocument> =
            docs.into_iter().map(|doc| (doc.id.clone(), doc)).collect();
        let rows = fused
            .into_iter()
            .filter_map(|hit| {
                let doc = by_id.remove(&hit.id)?;
                Some(SearchResultRow::from_document(
                    doc,
                    hit.score,
                    hit.ranks[KEYWORD_LIST],
                    hit.ranks[SEMANTIC_LIST],
                ))
            })
            .collect();
        Some(rows)
    }

    /// Validates, embeds and stores one document, then clears the result cache.
    #[instrument(skip(self, doc), fields(id = %doc.id))]
    pub async fn index_document(&self, doc: SkillDocument) -> Result<(), SearchError> {
        validate_document(&doc)?;
        let vector = self.embedder.embed(&doc.embedding_text())?;
        let point = VectorPoint::new(doc.id.clone(), vector);

        let outcome = self.write(vec![doc], vec![point]).await;
        self.cache.invalidate_all().await;
        outcome.map(|_| ())
    }

    /// Validates every document before writing any; returns how many were indexed.
    #[instrument(skip(self, docs), fields(count = docs.len()))]
    pub async fn bulk_index(&self, docs: Vec<SkillDocument>) -> Result<usize, SearchError> {
        for doc in &docs {
            validate_document(doc)?;
        }

        let texts: Vec<String> = docs.iter().map(SkillDocument::embedding_text).collect();
        let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = self.embedder.embed_batch(&text_refs)?;
        let points = docs
            .iter()
            .zip(vectors)
            .map(|(doc, vector)| VectorPoint::new(doc.id.clone(), vector))
            .collect();

        let outcome = self.write(docs, points).await;
        self.cache.invalidate_all().await;
        let indexed = outcome?;
        info!(indexed, "Bulk indexed documents");
        Ok(indexed)
    }

    async fn write(
        &self,
        docs: Vec<SkillDocument>,
        points: Vec<VectorPoint>,
    ) -> Result<usize, SearchError> {
        let written = self.documents.upsert_many(docs).await?;
        self.vectors.upsert_vectors(points).await?;
        Ok(written)
    }
}

fn validate_document(doc: &SkillDocument) -> Result<(), SearchError> {
    let invalid = |reason: &str| SearchError::InvalidDocument {
        id: doc.id.clone(),
        reason: reason.to_string(),
    };

    if doc.id.trim().is_empty() {
        return Err(invalid("id is empty"));
    }
    if doc.name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if !doc.quality.is_finite() || !(0.0..=1.0).contains(&doc.quality) {
        return Err(invalid("quality must be within 0..=1"));
    }
    Ok(())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Engine over one SQLite database holding skills, FTS, embeddings and the L2 cache table.
pub type SqliteSearchEngine =
    HybridSearchEngine<SqliteSkillStore, SqliteSkillStore, SqliteSkillStore, SqliteL2Store, HashEmbedder>;

impl SqliteSearchEngine {
    /// Opens (or creates) the database at [`Config::database_path`].
    pub fn open(config: &Config) -> Result<Self, SearchError> {
        config.validate()?;
        let path = config.database_path();

        let store = Arc::new(SqliteSkillStore::open(&path, config.embedding_dim)?);
        let l2 = SqliteL2Store::open(&path)?;
        let embedder = HashEmbedder::new(config.embedding_dim)?;
        let cache = Arc::new(TieredCache::new(config.tiered_config(), l2));

        info!(path = %path.display(), dim = config.embedding_dim, "Opened search engine");
        Ok(Self::new(
            Arc::clone(&store),
            Arc::clone(&store),
            store,
            embedder,
            cache,
            config.search_config(),
        ))
    }
}

#[cfg(any(test, feature = "mock"))]
pub type MockSearchEngine = HybridSearchEngine<
    InMemorySkillStore,
    InMemoryVectorIndex,
    InMemorySkillStore,
    InMemoryL2Store,
    HashEmbedder,
>;

#[cfg(any(test, feature = "mock"))]
impl MockSearchEngine {
    /// In-memory store, vector index and L2, driven by `clock`.
    pub fn new_mock(
        config: SearchConfig,
        cache_config: TieredCacheConfig,
        clock: ManualClock,
        dim: usize,
    ) -> Result<Self, SearchError> {
        let store = Arc::new(InMemorySkillStore::new());
        let embedder = HashEmbedder::new(dim)?;
        let cache = Arc::new(TieredCache::new_mock(cache_config, clock));
        Ok(Self::new(
            Arc::clone(&store),
            Arc::new(InMemoryVectorIndex::new(dim)),
            store,
            embedder,
            cache,
            config,
        ))
    }

    pub fn vectors(&self) -> &Arc<InMemoryVectorIndex> {
        &self.vectors
    }
}
