//! Weighted reciprocal rank fusion: `score = Σ wᵢ / (c + rankᵢ)` with 1-based ranks.
//!
//! Rank-based fusion avoids normalizing cosine and BM25 scores onto a common scale.

use std::collections::HashMap;
use std::sync::Arc;

use chatdbg_core::error::AppError;

use super::{rank_hits, RetrievalHit, Retriever};

pub struct HybridRetriever {
    parts: Vec<(Arc<dyn Retriever>, f32)>,
    c: u32,
}

impl HybridRetriever {
    /// Semantic and lexical retrievers with their fusion weights.
    pub fn new(
        semantic: Arc<dyn Retriever>,
        semantic_weight: f32,
        lexical: Arc<dyn Retriever>,
        lexical_weight: f32,
        c: u32,
    ) -> Self {
        Self {
            parts: vec![(semantic, semantic_weight), (lexical, lexical_weight)],
            c,
        }
    }
}

/// Fuse ranked lists. Each list is best-first; provenance comes from the first list naming the id.
pub fn fuse(lists: &[(Vec<RetrievalHit>, f32)], c: u32) -> Vec<RetrievalHit> {
    let mut fused: HashMap<String, RetrievalHit> = HashMap::new();
    for (hits, weight) in lists {
        for (i, hit) in hits.iter().enumerate() {
            let rrf = weight / (c as f32 + (i + 1) as f32);
            fused
                .entry(hit.fragment_id.clone())
                .and_modify(|h| h.score += rrf)
                .or_insert_with(|| RetrievalHit {
                    fragment_id: hit.fragment_id.clone(),
                    provenance_id: hit.provenance_id.clone(),
                    score: rrf,
                });
        }
    }
    let mut out: Vec<RetrievalHit> = fused.into_values().collect();
    rank_hits(&mut out);
    out
}

impl Retriever for HybridRetriever {
    fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>, AppError> {
        let mut lists = Vec::with_capacity(self.parts.len());
        for (retriever, weight) in self.parts.iter() {
            lists.push((retriever.search(query, k)?, *weight));
        }
        let mut hits = fuse(&lists, self.c);
        hits.truncate(k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn hit(id: &str) -> RetrievalHit {
        RetrievalHit {
            fragment_id: id.to_string(),
            provenance_id: format!("p-{id}"),
            score: 0.0,
        }
    }

    #[test]
    fn item_in_both_lists_outranks_single_list_leaders() {
        let semantic = vec![hit("a"), hit("shared")];
        let lexical = vec![hit("b"), hit("shared")];
        let fused = fuse(&[(semantic, 0.6), (lexical, 0.4)], 60);
        let ids: Vec<&str> = fused.iter().map(|h| h.fragment_id.as_str()).collect();
        assert_eq!(ids, vec!["shared", "a", "b"]);
        let expected = 0.6 / 62.0 + 0.4 / 62.0;
        assert!((fused[0].score - expected).abs() < 1e-6);
        assert_eq!(fused[0].provenance_id, "p-shared");
    }

    #[test]
    fn weights_break_rank_ties_between_lists() {
        let fused = fuse(&[(vec![hit("s")], 0.6), (vec![hit("l")], 0.4)], 60);
        assert_eq!(fused[0].fragment_id, "s");
    }

    struct Fixed(Vec<RetrievalHit>);

    impl Retriever for Fixed {
        fn search(&self, _query: &str, _k: usize) -> Result<Vec<RetrievalHit>, AppError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn search_truncates_to_k() {
        let r = HybridRetriever::new(
            Arc::new(Fixed(vec![hit("a"), hit("b"), hit("c")])),
            0.6,
            Arc::new(Fixed(vec![hit("d")])),
            0.4,
            60,
        );
        assert_eq!(r.search("q", 2).expect("search").len(), 2);
    }
}
