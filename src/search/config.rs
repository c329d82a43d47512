use crate::constants::{
    DEFAULT_CANDIDATE_MULTIPLIER, DEFAULT_KEYWORD_WEIGHT, DEFAULT_MAX_CANDIDATES,
    DEFAULT_MAX_LIMIT, DEFAULT_MIN_CANDIDATES, DEFAULT_QUERY_EMBEDDING_CACHE_SIZE, DEFAULT_RRF_K,
    DEFAULT_SEMANTIC_WEIGHT,
};

/// Ranking and fusion settings for [`HybridSearchEngine`](super::HybridSearchEngine).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// RRF smoothing constant.
    pub rrf_k: f64,
    pub keyword_weight: f64,
    pub semantic_weight: f64,
    /// Each ranking query asks for `max_limit * candidate_multiplier` ids, clamped to
    /// `min_candidates..=max_candidates`.
    pub candidate_multiplier: usize,
    pub min_candidates: usize,
    pub max_candidates: usize,
    /// Largest accepted page size; larger limits are clamped.
    pub max_limit: usize,
    /// Capacity of the query-embedding memo.
    pub embedding_cache_size: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rrf_k: DEFAULT_RRF_K,
            keyword_weight: DEFAULT_KEYWORD_WEIGHT,
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
            min_candidates: DEFAULT_MIN_CANDIDATES,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            max_limit: DEFAULT_MAX_LIMIT,
            embedding_cache_size: DEFAULT_QUERY_EMBEDDING_CACHE_SIZE,
        }
    }
}

impl SearchConfig {
    pub fn with_rrf_k(mut self, k: f64) -> Self {
        self.rrf_k = k;
        self
    }

    /// Negative or non-finite weights are treated as zero.
    pub fn with_weights(mut self, keyword: f64, semantic: f64) -> Self {
        self.keyword_weight = sanitize_weight(keyword);
        self.semantic_weight = sanitize_weight(semantic);
        self
    }

    pub fn with_candidate_multiplier(mut self, multiplier: usize) -> Self {
        self.candidate_multiplier = multiplier.max(1);
        self
    }

    pub fn with_candidate_bounds(mut self, min: usize, max: usize) -> Self {
        self.min_candidates = min;
        self.max_candidates = max.max(min);
        self
    }

    pub fn with_max_limit(mut self, max_limit: usize) -> Self {
        self.max_limit = max_limit.max(1);
        self
    }

    pub fn with_embedding_cache_size(mut self, size: u64) -> Self {
        self.embedding_cache_size = size;
        self
    }

    /// Candidates to request from each ranking signal. Independent of the requested page, so a
    /// cached result list is the same whichever page computed it.
    pub fn candidate_count(&self) -> usize {
        self.max_limit
            .saturating_mul(self.candidate_multiplier)
            .max(self.min_candidates)
            .min(self.max_candidates)
    }

    /// Clamps a requested page size into `1..=max_limit`.
    pub fn clamp_limit(&self, limit: usize) -> usize {
        limit.clamp(1, self.max_limit)
    }
}

fn sanitize_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}
