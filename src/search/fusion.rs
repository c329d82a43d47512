//! Weighted Reciprocal Rank Fusion.
//!
//! Each list is ranked by its own scores (higher is better); an id at rank `r` (0-based)
//! contributes `weight / (k + r + 1)`. Only positions matter, so lists with incomparable score
//! units fuse cleanly. The output is sorted by fused score with a stable sort, so equal scores
//! keep first-encounter order (list order, then rank).

use std::collections::HashMap;

/// An id with a signal score; higher is more relevant.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredId {
    pub id: String,
    pub score: f64,
}

impl ScoredId {
    pub fn new(id: impl Into<String>, score: f64) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// One input list and the weight applied to its contributions.
#[derive(Debug, Clone, Copy)]
pub struct RankedList<'a> {
    pub hits: &'a [ScoredId],
    pub weight: f64,
}

impl<'a> RankedList<'a> {
    pub fn new(hits: &'a [ScoredId], weight: f64) -> Self {
        Self { hits, weight }
    }
}

/// A fused id. `ranks[i]` is its 0-based rank in input list `i`, if present.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    pub id: String,
    pub score: f64,
    pub ranks: Vec<Option<usize>>,
}

/// Orders a list by descending score. Non-finite scores are dropped and a repeated id keeps
/// only its best position.
fn rank_list(hits: &[ScoredId]) -> Vec<&ScoredId> {
    let mut ranked: Vec<&ScoredId> = hits.iter().filter(|h| h.score.is_finite()).collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut seen = std::collections::HashSet::new();
    ranked.retain(|h| seen.insert(h.id.as_str()));
    ranked
}

/// Fuses `lists` with smoothing constant `k`.
///
/// Ids whose fused score is exactly zero (every contributing weight was zero) are dropped.
pub fn reciprocal_rank_fusion(lists: &[RankedList<'_>], k: f64) -> Vec<FusedHit> {
    let mut fused: Vec<FusedHit> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (list_idx, list) in lists.iter().enumerate() {
        let weight = list.weight.max(0.0);
        for (rank, hit) in rank_list(list.hits).into_iter().enumerate() {
            let slot = *index.entry(hit.id.clone()).or_insert_with(|| {
                fused.push(FusedHit {
                    id: hit.id.clone(),
                    score: 0.0,
                    ranks: vec![None; lists.len()],
                });
                fused.len() - 1
            });

            let entry = &mut fused[slot];
            entry.score += weight / (k + rank as f64 + 1.0);
            entry.ranks[list_idx] = Some(rank);
        }
    }

    fused.retain(|h| h.score > 0.0);
    fused.sort_by(|a, b| b.score.total_cmp(&a.score));
    fused
}
