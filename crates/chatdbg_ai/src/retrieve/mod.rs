use chatdbg_core::error::AppError;
use serde::{Deserialize, Serialize};

pub mod hybrid;
pub mod lexical;
pub mod semantic;
pub(crate) mod similarity;

pub use hybrid::HybridRetriever;
pub use lexical::LexicalRetriever;
pub use semantic::SemanticRetriever;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalHit {
    pub fragment_id: String,
    pub provenance_id: String,
    pub score: f32,
}

/// Ranked search over the corpus. Best hit first; at most `k` hits.
pub trait Retriever: Send + Sync {
    fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>, AppError>;
}

/// Descending score, then fragment id ascending, so equal scores rank deterministically.
pub(crate) fn rank_hits(hits: &mut [RetrievalHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.fragment_id.cmp(&b.fragment_id))
    });
}
