use std::sync::Arc;

use chatdbg_core::corpus::Corpus;
use serde::{Deserialize, Serialize};

/// Provenance-tagged text built from fragments of a single source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextBlock {
    pub text: String,
    pub provenance_id: String,
}

/// Expands retrieved fragment ids into context blocks using same-source neighbors.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    corpus: Arc<Corpus>,
    neighbor_radius: u32,
}

impl ContextAssembler {
    pub fn new(corpus: Arc<Corpus>, neighbor_radius: u32) -> Self {
        Self {
            corpus,
            neighbor_radius,
        }
    }

    /// One block per known id, in request order. Adjacent ids may yield overlapping text.
    pub fn assemble(&self, fragment_ids: &[String]) -> Vec<ContextBlock> {
        let mut blocks = Vec::with_capacity(fragment_ids.len());
        for id in fragment_ids {
            let Some(fragment) = self.corpus.get(id) else {
                tracing::warn!(fragment_id = %id, "retrieved fragment id not in corpus; skipping");
                continue;
            };
            let text = self
                .corpus
                .window(fragment, self.neighbor_radius)
                .iter()
                .map(|f| f.content.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            blocks.push(ContextBlock {
                text,
                provenance_id: fragment.provenance_id.clone(),
            });
        }
        blocks
    }
}

/// Context text shown to the verifier and the answerer. Each block carries a
/// `[[source:<id>]]` marker.
pub fn render_context(blocks: &[ContextBlock]) -> String {
    blocks
        .iter()
        .map(|b| format!("[[source:{}]]\n{}", b.provenance_id, b.text))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Provenance ids of `blocks`, first occurrence order, without repeats.
pub fn block_provenance(blocks: &[ContextBlock]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for b in blocks {
        if !out.contains(&b.provenance_id) {
            out.push(b.provenance_id.clone());
        }
    }
    out
}
