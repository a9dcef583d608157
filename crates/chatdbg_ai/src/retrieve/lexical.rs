use std::collections::HashMap;
use std::sync::Arc;

use chatdbg_core::corpus::Corpus;
use chatdbg_core::error::AppError;
use chatdbg_core::lang::QueryNormalizer;

use super::{rank_hits, RetrievalHit, Retriever};

const K1: f32 = 1.2;
const B: f32 = 0.75;

struct Doc {
    fragment_id: String,
    provenance_id: String,
    len: f32,
    term_freqs: HashMap<String, u32>,
}

/// Okapi BM25 over normalized fragment tokens. The postings are built once at construction.
pub struct LexicalRetriever {
    normalizer: Arc<QueryNormalizer>,
    docs: Vec<Doc>,
    doc_freqs: HashMap<String, u32>,
    avg_len: f32,
}

impl LexicalRetriever {
    pub fn new(corpus: &Corpus, normalizer: Arc<QueryNormalizer>) -> Self {
        let mut docs = Vec::with_capacity(corpus.len());
        let mut doc_freqs: HashMap<String, u32> = HashMap::new();
        let mut total_len = 0usize;

        for fragment in corpus.iter() {
            let tokens = normalizer.tokens(&fragment.content);
            total_len += tokens.len();
            let mut term_freqs: HashMap<String, u32> = HashMap::new();
            for t in tokens.iter() {
                *term_freqs.entry(t.clone()).or_default() += 1;
            }
            for t in term_freqs.keys() {
                *doc_freqs.entry(t.clone()).or_default() += 1;
            }
            docs.push(Doc {
                fragment_id: fragment.fragment_id.clone(),
                provenance_id: fragment.provenance_id.clone(),
                len: tokens.len() as f32,
                term_freqs,
            });
        }

        let avg_len = if docs.is_empty() {
            0.0
        } else {
            total_len as f32 / docs.len() as f32
        };
        Self {
            normalizer,
            docs,
            doc_freqs,
            avg_len,
        }
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.docs.len() as f32;
        let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }
}

impl Retriever for LexicalRetriever {
    fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>, AppError> {
        let mut terms = self.normalizer.tokens(query);
        terms.sort();
        terms.dedup();
        if terms.is_empty() || k == 0 || self.avg_len == 0.0 {
            return Ok(Vec::new());
        }

        let idfs: Vec<(String, f32)> = terms
            .into_iter()
            .filter(|t| self.doc_freqs.contains_key(t))
            .map(|t| {
                let idf = self.idf(&t);
                (t, idf)
            })
            .collect();

        let mut hits = Vec::new();
        for doc in self.docs.iter() {
            let mut score = 0.0f32;
            for (term, idf) in idfs.iter() {
                let Some(&tf) = doc.term_freqs.get(term) else {
                    continue;
                };
                let tf = tf as f32;
                let norm = K1 * (1.0 - B + B * doc.len / self.avg_len);
                score += idf * (tf * (K1 + 1.0)) / (tf + norm);
            }
            if score > 0.0 {
                hits.push(RetrievalHit {
                    fragment_id: doc.fragment_id.clone(),
                    provenance_id: doc.provenance_id.clone(),
                    score,
                });
            }
        }

        rank_hits(&mut hits);
        hits.truncate(k);
        tracing::debug!(hits = hits.len(), "lexical search");
        Ok(hits)
    }
}
