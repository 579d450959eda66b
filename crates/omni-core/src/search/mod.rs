//! Hybrid search engine with RRF fusion (C9 entry point).
//!
//! Combines dense (vector) and sparse (lexical) retrieval, fuses them with
//! Reciprocal Rank Fusion, and optionally reranks the fused result set.

use crate::config::Config;
use crate::error::OmniResult;
use crate::reranker::Reranker;
use crate::store::VectorStore;
use crate::types::SearchResult;

/// Hybrid search engine: owns RRF fusion math. The store performs the
/// dense/sparse retrieval itself (it alone knows both indexes); this engine
/// is also used directly by store implementations that need the formula.
pub struct SearchEngine {
    rrf_k: u32,
}

impl SearchEngine {
    /// Create a new search engine with the given RRF constant.
    pub fn new(rrf_k: u32) -> Self {
        Self { rrf_k }
    }

    /// The RRF constant `k` this engine was configured with.
    pub fn k(&self) -> u32 {
        self.rrf_k
    }

    /// Weighted RRF score for one candidate: `w_v/(k+rank_v) + w_t/(k+rank_t)`.
    /// A missing rank contributes zero. `vector_weight` is `w_v`; `w_t = 1 - w_v`.
    pub fn rrf_score(&self, vector_rank: Option<u32>, text_rank: Option<u32>, vector_weight: f64) -> f64 {
        let k = f64::from(self.rrf_k);
        let text_weight = 1.0 - vector_weight;
        let vector_term = vector_rank.map_or(0.0, |r| vector_weight / (k + f64::from(r)));
        let text_term = text_rank.map_or(0.0, |r| text_weight / (k + f64::from(r)));
        vector_term + text_term
    }
}

/// Run a search against `store`, then apply reranking when configured (§4.9).
pub async fn search(
    store: &dyn VectorStore,
    reranker: Option<&dyn Reranker>,
    query_text: &str,
    query_embedding: Option<&[f32]>,
    config: &Config,
) -> OmniResult<Vec<SearchResult>> {
    let max_results = config.search.default_max_results;
    let results = store.search(query_text, query_embedding, max_results).await?;

    match reranker {
        Some(reranker) if config.search.reranking.enabled => {
            reranker.rerank(query_text, results, config.search.reranking.top_k).await
        }
        _ => Ok(results),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rrf_score_both_signals_default_weight() {
        let engine = SearchEngine::new(60);
        let score = engine.rrf_score(Some(1), Some(1), 0.7);
        let expected = 0.7 / 61.0 + 0.3 / 61.0;
        assert!((score - expected).abs() < 1e-10);
    }

    #[test]
    fn test_rrf_score_vector_only() {
        let engine = SearchEngine::new(60);
        let score = engine.rrf_score(Some(1), None, 0.7);
        let expected = 0.7 / 61.0;
        assert!((score - expected).abs() < 1e-10);
    }

    #[test]
    fn test_rrf_score_no_signal() {
        let engine = SearchEngine::new(60);
        assert_eq!(engine.rrf_score(None, None, 0.7), 0.0);
    }

    #[test]
    fn test_rrf_higher_rank_gets_higher_score() {
        let engine = SearchEngine::new(60);
        let score_rank1 = engine.rrf_score(Some(1), Some(1), 0.7);
        let score_rank10 = engine.rrf_score(Some(10), Some(10), 0.7);
        assert!(score_rank1 > score_rank10);
    }

    /// Mirrors the worked example: vector ranks A=1,B=2; text ranks A=2,B=1;
    /// vector_weight=0.7 must still favor A.
    #[test]
    fn test_rrf_cross_signal_example() {
        let engine = SearchEngine::new(60);
        let score_a = engine.rrf_score(Some(1), Some(2), 0.7);
        let score_b = engine.rrf_score(Some(2), Some(1), 0.7);
        assert!(score_a > score_b);
    }

    #[test]
    fn test_rrf_monotone_in_either_rank_list() {
        let engine = SearchEngine::new(60);
        let base = engine.rrf_score(Some(5), Some(5), 0.7);
        let better_vector = engine.rrf_score(Some(1), Some(5), 0.7);
        let better_text = engine.rrf_score(Some(5), Some(1), 0.7);
        assert!(better_vector > base);
        assert!(better_text > base);
    }
}
