//! `answer_query`: retrieve, verify, reformulate on failure, answer consistently, log.
//!
//! The control flow is an explicit [`Stage`] machine. Only retrieval ever sees a reformulated
//! query; verification and answer generation always use the user's original words.

use std::sync::Arc;

use chatdbg_core::error::{codes, AppError};
use chatdbg_core::interaction_log::{now_rfc3339_utc, InteractionLog, InteractionLogEntry};
use chatdbg_core::lang::{detect_language, Language};
use serde::{Deserialize, Serialize};

use crate::assemble::{block_provenance, render_context, ContextAssembler, ContextBlock};
use crate::consistency::ConsistentAnswerer;
use crate::reformulate::Reformulator;
use crate::retrieve::Retriever;
use crate::style::StylePass;
use crate::verify::{SupportAssessment, SupportLevel, SupportVerifier};

pub mod state;

pub use state::{Event, Stage};

/// Log label when every verification attempt failed to decode.
pub const UNDETERMINED: &str = "Undetermined";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryAnswer {
    pub answer: String,
    pub provenance_ids: Vec<String>,
}

impl QueryAnswer {
    pub fn provenance_csv(&self) -> String {
        self.provenance_ids.join(",")
    }
}

/// Result of one retrieve-assemble-verify round.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe {
    Supported {
        assessment: SupportAssessment,
        blocks: Vec<ContextBlock>,
    },
    Unsupported,
    /// The verifier's output could not be decoded.
    Undecided,
    /// Retrieval found nothing, so the verifier was not called.
    NoHits,
}

/// Collaborators of a pipeline. Production wiring lives in `components`.
pub struct PipelineParts {
    pub retriever: Arc<dyn Retriever>,
    pub assembler: ContextAssembler,
    pub verifier: Arc<dyn SupportVerifier>,
    pub reformulator: Arc<dyn Reformulator>,
    pub answerer: ConsistentAnswerer,
    pub style: StylePass,
    pub log: Arc<InteractionLog>,
    pub k: usize,
}

pub struct Pipeline {
    parts: PipelineParts,
}

#[derive(Default)]
struct Trail {
    variants: Vec<String>,
    tried: Vec<String>,
    successful_query: Option<String>,
    support: Option<(SupportAssessment, Vec<ContextBlock>)>,
    verifications: usize,
    undecided: usize,
}

impl Pipeline {
    pub fn new(parts: PipelineParts) -> Self {
        Self { parts }
    }

    pub fn interaction_log(&self) -> &InteractionLog {
        &self.parts.log
    }

    /// Retrieve with `retrieval_query`, then verify the assembled context against `original_query`.
    pub fn probe(&self, retrieval_query: &str, original_query: &str) -> Result<Probe, AppError> {
        let hits = self.parts.retriever.search(retrieval_query, self.parts.k)?;
        let ids: Vec<String> = hits.into_iter().map(|h| h.fragment_id).collect();
        let blocks = self.parts.assembler.assemble(&ids);
        if blocks.is_empty() {
            return Ok(Probe::NoHits);
        }
        let context = render_context(&blocks);
        match self.parts.verifier.verify(original_query, &context) {
            Ok(a) if a.level().is_supported() => Ok(Probe::Supported {
                assessment: a,
                blocks,
            }),
            Ok(_) => Ok(Probe::Unsupported),
            Err(e) if e.code == codes::VERIFIER_MALFORMED => {
                tracing::warn!(
                    details = ?e.details,
                    "verifier output malformed; treating as undecided"
                );
                Ok(Probe::Undecided)
            }
            Err(e) => Err(e),
        }
    }

    fn probe_event(
        &self,
        trail: &mut Trail,
        retrieval_query: &str,
        original_query: &str,
    ) -> Result<Event, AppError> {
        let probe = self.probe(retrieval_query, original_query)?;
        tracing::debug!(query = retrieval_query, outcome = probe_label(&probe), "probe");
        Ok(match probe {
            Probe::Supported { assessment, blocks } => {
                trail.verifications += 1;
                trail.successful_query = Some(retrieval_query.to_string());
                trail.support = Some((assessment, blocks));
                Event::Supported
            }
            Probe::Unsupported => {
                trail.verifications += 1;
                Event::NotSupported
            }
            Probe::Undecided => {
                trail.verifications += 1;
                trail.undecided += 1;
                Event::NotSupported
            }
            Probe::NoHits => Event::NotSupported,
        })
    }

    fn reformulate(&self, query: &str, language: Language) -> Result<Vec<String>, AppError> {
        match self.parts.reformulator.reformulate(query, language) {
            Ok(v) => Ok(v),
            Err(e) if e.code == codes::REFORMULATION_MALFORMED => {
                tracing::warn!(details = ?e.details, "reformulator output malformed; no variants");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    pub fn answer_query(&self, user_query: &str) -> Result<QueryAnswer, AppError> {
        let query = user_query.trim();
        let language = detect_language(query);
        let mut trail = Trail::default();
        let mut stage = Stage::Start;

        while !stage.is_terminal() {
            let event = match stage {
                Stage::Start => Event::Begin,
                Stage::RetrieveOriginal => self.probe_event(&mut trail, query, query)?,
                Stage::Reformulate => {
                    trail.variants = self.reformulate(query, language)?;
                    Event::VariantsReady
                }
                Stage::RetryingVariant(i) => {
                    let variant = trail.variants[i].clone();
                    trail.tried.push(variant.clone());
                    self.probe_event(&mut trail, &variant, query)?
                }
                Stage::Fallback => Event::FallbackReady,
                Stage::Answered => break,
            };
            let next = stage.next(event, trail.variants.len()).ok_or_else(|| {
                AppError::new("PIPELINE_INVALID_TRANSITION", "Pipeline reached an invalid state")
                    .with_details(format!("stage={stage:?}; event={event:?}"))
            })?;
            tracing::debug!(from = ?stage, to = ?next, "stage");
            stage = next;
        }

        let (context, provenance_ids, level) = match trail.support.as_ref() {
            Some((a, blocks)) => match a.level() {
                SupportLevel::Strong => {
                    let context = a
                        .quotes()
                        .iter()
                        .map(|q| q.text.as_str())
                        .collect::<Vec<_>>()
                        .join("\n");
                    (context, quote_provenance(a, blocks), SupportLevel::Strong.as_str())
                }
                level => (render_context(blocks), block_provenance(blocks), level.as_str()),
            },
            None if trail.verifications > 0 && trail.undecided == trail.verifications => {
                (String::new(), Vec::new(), UNDETERMINED)
            }
            None => (String::new(), Vec::new(), SupportLevel::None.as_str()),
        };

        let pre_translation = self.parts.answerer.answer(query, &context)?;
        let final_answer = self.parts.style.apply(&pre_translation, language)?;

        let entry = InteractionLogEntry {
            timestamp: now_rfc3339_utc()?,
            original_query: query.to_string(),
            detected_language: language.code().to_string(),
            reformulated_queries: trail.tried,
            successful_query: trail.successful_query,
            support_level: level.to_string(),
            provenance_ids: provenance_ids.clone(),
            pre_translation_answer: pre_translation,
            final_answer: final_answer.clone(),
        };
        self.parts.log.append(&entry)?;
        tracing::info!(
            support_level = level,
            sources = provenance_ids.len(),
            variants_tried = entry.reformulated_queries.len(),
            "query answered"
        );

        Ok(QueryAnswer {
            answer: final_answer,
            provenance_ids,
        })
    }
}

/// Quote ids that name a retrieved block, in quote order. Falls back to every block id when the
/// verifier cited nothing that was actually retrieved.
fn quote_provenance(assessment: &SupportAssessment, blocks: &[ContextBlock]) -> Vec<String> {
    let retrieved = block_provenance(blocks);
    let mut ids: Vec<String> = Vec::new();
    for q in assessment.quotes() {
        if q.provenance_id.is_empty() || ids.contains(&q.provenance_id) {
            continue;
        }
        if retrieved.contains(&q.provenance_id) {
            ids.push(q.provenance_id.clone());
        } else {
            tracing::warn!(
                provenance_id = %q.provenance_id,
                "quote cites an unretrieved source; dropped"
            );
        }
    }
    if ids.is_empty() {
        return retrieved;
    }
    ids
}

fn probe_label(p: &Probe) -> &'static str {
    match p {
        Probe::Supported { assessment, .. } => assessment.level().as_str(),
        Probe::Unsupported => "unsupported",
        Probe::Undecided => "undecided",
        Probe::NoHits => "no hits",
    }
}
