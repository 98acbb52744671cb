//! Rank fusion of semantic and lexical result lists.
//!
//! The default strategy is Reciprocal Rank Fusion: it uses only each
//! result's position, so the incomparable raw scales of BM25 and
//! `1 - distance` never meet. A weighted raw-score blend over min-max
//! normalised scores is available as an explicit alternative.
//!
//! # De-duplication key
//!
//! Results are merged by the first 100 characters of their content. Two
//! different chunks or documents sharing that prefix collapse into one
//! entry, which keeps the first instance encountered (semantic list first,
//! then lexical). This is lossy on purpose: it is what lets a whole-document
//! lexical hit and the first chunk of the same document reinforce each
//! other.
//!
//! # Ordering
//!
//! Entries are sorted by descending fused score with a stable sort, so
//! equal scores keep first-seen order and repeated calls are identical.

use std::collections::HashMap;

use crate::models::{FusedHit, SearchResult};

/// RRF constant `C` in `1 / (C + rank + 1)`.
pub const DEFAULT_RRF_K: f64 = 60.0;

/// Characters of content used as the de-duplication key.
pub const DEDUP_KEY_CHARS: usize = 100;

/// How the semantic and lexical rankings are combined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FusionStrategy {
    /// Reciprocal rank fusion, ignoring raw scores.
    Rrf { constant: f64 },
    /// `semantic_weight × norm(semantic) + lexical_weight × norm(lexical)`.
    Weighted {
        semantic_weight: f64,
        lexical_weight: f64,
    },
}

impl Default for FusionStrategy {
    fn default() -> Self {
        FusionStrategy::Rrf {
            constant: DEFAULT_RRF_K,
        }
    }
}

impl FusionStrategy {
    /// Reported as `strategy_used` on responses.
    pub fn label(&self) -> &'static str {
        match self {
            FusionStrategy::Rrf { .. } => "hybrid",
            FusionStrategy::Weighted { .. } => "hybrid-weighted",
        }
    }

    pub fn fuse(&self, semantic: Vec<SearchResult>, lexical: Vec<SearchResult>, k: usize) -> Vec<FusedHit> {
        match *self {
            FusionStrategy::Rrf { constant } => rrf_fuse(&[semantic, lexical], k, constant),
            FusionStrategy::Weighted {
                semantic_weight,
                lexical_weight,
            } => weighted_fuse(&semantic, &lexical, k, semantic_weight, lexical_weight),
        }
    }
}

/// First [`DEDUP_KEY_CHARS`] characters of `content`.
pub fn dedup_key(content: &str) -> String {
    content.chars().take(DEDUP_KEY_CHARS).collect()
}

/// Accumulates scores per key while remembering first-seen order.
struct Accumulator {
    positions: HashMap<String, usize>,
    entries: Vec<FusedHit>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            positions: HashMap::new(),
            entries: Vec::new(),
        }
    }

    fn add(&mut self, result: &SearchResult, contribution: f64) {
        let key = dedup_key(&result.content);
        match self.positions.get(&key) {
            Some(&i) => self.entries[i].fused_score += contribution,
            None => {
                self.positions.insert(key, self.entries.len());
                self.entries.push(FusedHit {
                    result: result.clone(),
                    fused_score: contribution,
                });
            }
        }
    }

    fn finish(mut self, k: usize) -> Vec<FusedHit> {
        self.entries.sort_by(|a, b| {
            b.fused_score
                .partial_cmp(&a.fused_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        self.entries.truncate(k);
        self.entries
    }
}

/// Reciprocal Rank Fusion over any number of best-first rankings.
///
/// Each occurrence contributes `1 / (constant + rank + 1)` with zero-based
/// `rank` inside its own ranking.
pub fn rrf_fuse(rankings: &[Vec<SearchResult>], k: usize, constant: f64) -> Vec<FusedHit> {
    let mut acc = Accumulator::new();
    for ranking in rankings {
        for (rank, result) in ranking.iter().enumerate() {
            acc.add(result, 1.0 / (constant + rank as f64 + 1.0));
        }
    }
    acc.finish(k)
}

/// Weighted blend of min-max normalised raw scores.
pub fn weighted_fuse(
    semantic: &[SearchResult],
    lexical: &[SearchResult],
    k: usize,
    semantic_weight: f64,
    lexical_weight: f64,
) -> Vec<FusedHit> {
    let mut acc = Accumulator::new();
    for (result, norm) in semantic.iter().zip(normalize_scores(semantic)) {
        acc.add(result, semantic_weight * norm);
    }
    for (result, norm) in lexical.iter().zip(normalize_scores(lexical)) {
        acc.add(result, lexical_weight * norm);
    }
    acc.finish(k)
}

/// Min-max normalize raw scores to `[0.0, 1.0]`.
///
/// If all scores are equal, they are normalized to `1.0`.
pub fn normalize_scores(results: &[SearchResult]) -> Vec<f64> {
    if results.is_empty() {
        return Vec::new();
    }

    let s_min = results.iter().map(|r| r.score).fold(f64::INFINITY, f64::min);
    let s_max = results
        .iter()
        .map(|r| r.score)
        .fold(f64::NEG_INFINITY, f64::max);

    results
        .iter()
        .map(|r| {
            if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (r.score - s_min) / (s_max - s_min)
            }
        })
        .collect()
}
