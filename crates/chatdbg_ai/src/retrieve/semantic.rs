use std::sync::Arc;

use chatdbg_core::corpus::Corpus;
use chatdbg_core::error::AppError;

use super::{rank_hits, similarity, RetrievalHit, Retriever};
use crate::embeddings::Embedder;
use crate::index::VectorIndex;

/// Cosine similarity between the query embedding and every indexed fragment.
pub struct SemanticRetriever {
    corpus: Arc<Corpus>,
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
}

impl SemanticRetriever {
    pub fn new(corpus: Arc<Corpus>, index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            corpus,
            index,
            embedder,
        }
    }
}

impl Retriever for SemanticRetriever {
    fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>, AppError> {
        let q = query.trim();
        if q.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let qv = self.embedder.embed(self.index.model(), q)?;
        if qv.len() as u32 != self.index.dims() {
            return Err(AppError::new(
                "AI_RETRIEVAL_FAILED",
                "Query embedding dims do not match index dims",
            )
            .with_details(format!("index_dims={}; query_dims={}", self.index.dims(), qv.len())));
        }
        let qnorm = similarity::l2_norm(&qv);
        if qnorm == 0.0 {
            return Err(AppError::new("AI_RETRIEVAL_FAILED", "Query embedding norm is zero"));
        }

        let mut hits: Vec<RetrievalHit> = Vec::new();
        for entry in self.index.entries() {
            if entry.norm == 0.0 {
                continue;
            }
            // Vectors for fragments removed since the last index build are ignored.
            let Some(fragment) = self.corpus.get(&entry.fragment_id) else {
                continue;
            };
            hits.push(RetrievalHit {
                fragment_id: fragment.fragment_id.clone(),
                provenance_id: fragment.provenance_id.clone(),
                score: similarity::cosine_similarity(&qv, &entry.vector, qnorm, entry.norm),
            });
        }

        rank_hits(&mut hits);
        hits.truncate(k);
        tracing::debug!(hits = hits.len(), "semantic search");
        Ok(hits)
    }
}
