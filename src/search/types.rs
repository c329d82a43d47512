use serde::{Deserialize, Serialize};

pub use crate::storage::SearchFilters;
use crate::storage::SkillDocument;

/// A search call: query text, page window and post-ranking filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub filters: SearchFilters,
}

impl SearchRequest {
    /// First page of 10 results, no filters.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: 10,
            offset: 0,
            filters: SearchFilters::default(),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }
}

/// One hydrated, ranked document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub quality: f64,
    /// Fused RRF score.
    pub score: f64,
    /// 0-based position in the keyword ranking, if the document appeared there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_rank: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_rank: Option<usize>,
}

impl SearchResultRow {
    pub fn from_document(
        doc: SkillDocument,
        score: f64,
        keyword_rank: Option<usize>,
        semantic_rank: Option<usize>,
    ) -> Self {
        Self {
            id: doc.id,
            name: doc.name,
            description: doc.description,
            tags: doc.tags,
            source: doc.source,
            category: doc.category,
            quality: doc.quality,
            score,
            keyword_rank,
            semantic_rank,
        }
    }
}

/// A page of results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResultRow>,
    /// Matches after filtering, before pagination.
    pub total_count: u64,
    /// Served from the tiered cache.
    pub cached: bool,
    pub search_time_ms: u64,
}

impl SearchResponse {
    pub fn empty(search_time_ms: u64) -> Self {
        Self {
            search_time_ms,
            ..Default::default()
        }
    }
}

/// `rows[offset..offset + limit]`, empty past the end.
pub(crate) fn paginate(rows: &[SearchResultRow], offset: usize, limit: usize) -> Vec<SearchResultRow> {
    rows.iter().skip(offset).take(limit).cloned().collect()
}
