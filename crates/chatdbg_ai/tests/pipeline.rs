use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chatdbg_ai::assemble::ContextAssembler;
use chatdbg_ai::consistency::ConsistentAnswerer;
use chatdbg_ai::llm::{Llm, Prompt, PromptKind};
use chatdbg_ai::pipeline::{Pipeline, PipelineParts, Probe};
use chatdbg_ai::reformulate::Reformulator;
use chatdbg_ai::retrieve::{RetrievalHit, Retriever};
use chatdbg_ai::retry::RetryPolicy;
use chatdbg_ai::style::StylePass;
use chatdbg_ai::verify::{Quote, SupportAssessment, SupportLevel, SupportVerifier};
use chatdbg_core::config::PersonaConfig;
use chatdbg_core::corpus::{fragment_id_for, sha256_hex, Corpus, Fragment};
use chatdbg_core::error::{codes, AppError};
use chatdbg_core::interaction_log::InteractionLog;
use chatdbg_core::lang::Language;
use pretty_assertions::assert_eq;

fn fragment(seq: u32, prov: &str, content: &str) -> Fragment {
    let sha = sha256_hex(content.as_bytes());
    Fragment {
        fragment_id: fragment_id_for(prov, seq, &sha),
        source_id: prov.to_string(),
        provenance_id: prov.to_string(),
        sequence_index: seq,
        content: content.to_string(),
        content_sha256: sha,
    }
}

/// Maps retrieval queries to fragments; any other query finds nothing.
struct StubRetriever {
    by_query: HashMap<String, Fragment>,
    searched: Mutex<Vec<String>>,
}

impl Retriever for StubRetriever {
    fn search(&self, query: &str, _k: usize) -> Result<Vec<RetrievalHit>, AppError> {
        self.searched.lock().unwrap().push(query.to_string());
        Ok(self
            .by_query
            .get(query)
            .map(|f| RetrievalHit {
                fragment_id: f.fragment_id.clone(),
                provenance_id: f.provenance_id.clone(),
                score: 1.0,
            })
            .into_iter()
            .collect())
    }
}

type VerifyFn = dyn Fn(&str) -> Result<SupportAssessment, AppError> + Send + Sync;

struct StubVerifier {
    decide: Box<VerifyFn>,
    queries: Mutex<Vec<String>>,
}

impl SupportVerifier for StubVerifier {
    fn verify(&self, query: &str, context: &str) -> Result<SupportAssessment, AppError> {
        self.queries.lock().unwrap().push(query.to_string());
        (self.decide)(context)
    }
}

struct StubReformulator(Result<Vec<String>, AppError>);

impl Reformulator for StubReformulator {
    fn reformulate(&self, _query: &str, _language: Language) -> Result<Vec<String>, AppError> {
        self.0.clone()
    }
}

/// Records every prompt. Answers with "answer", styles with "styled".
#[derive(Default)]
struct RecordingLlm {
    prompts: Mutex<Vec<Prompt>>,
    rate_limited: bool,
}

impl RecordingLlm {
    fn contexts(&self, kind: PromptKind) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.kind == kind)
            .map(|p| p.context.clone())
            .collect()
    }
}

impl Llm for RecordingLlm {
    fn generate(&self, prompt: &Prompt) -> Result<String, AppError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        if self.rate_limited {
            return Err(AppError::rate_limited("status=429"));
        }
        Ok(match prompt.kind {
            PromptKind::Style => "styled".to_string(),
            _ => "answer".to_string(),
        })
    }
}

struct Harness {
    pipeline: Pipeline,
    retriever: Arc<StubRetriever>,
    verifier: Arc<StubVerifier>,
    llm: Arc<RecordingLlm>,
    _dir: tempfile::TempDir,
}

fn harness(
    routes: Vec<(&str, Fragment)>,
    decide: Box<VerifyFn>,
    variants: Result<Vec<String>, AppError>,
    llm: RecordingLlm,
    style_pass: bool,
) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let corpus = Arc::new(Corpus::new(routes.iter().map(|(_, f)| f.clone()).collect()));
    let retriever = Arc::new(StubRetriever {
        by_query: routes.into_iter().map(|(q, f)| (q.to_string(), f)).collect(),
        searched: Mutex::new(Vec::new()),
    });
    let verifier = Arc::new(StubVerifier {
        decide,
        queries: Mutex::new(Vec::new()),
    });
    let llm = Arc::new(llm);
    let retry = RetryPolicy {
        max_attempts: 3,
        backoff: Duration::ZERO,
    };
    let pipeline = Pipeline::new(PipelineParts {
        retriever: retriever.clone(),
        assembler: ContextAssembler::new(corpus, 0),
        verifier: verifier.clone(),
        reformulator: Arc::new(StubReformulator(variants)),
        answerer: ConsistentAnswerer::new(llm.clone(), retry, PersonaConfig::default(), 5, 0.7),
        style: StylePass::new(llm.clone(), retry, PersonaConfig::default(), style_pass),
        log: Arc::new(InteractionLog::open(dir.path().join("logs").join("interactions.jsonl"))),
        k: 10,
    });
    Harness {
        pipeline,
        retriever,
        verifier,
        llm,
        _dir: dir,
    }
}

fn no_support(_: &str) -> Result<SupportAssessment, AppError> {
    Ok(SupportAssessment::none())
}

#[test]
fn strong_support_answers_from_the_quote_alone() {
    let bio = fragment(
        0,
        "BG-1",
        "Headline: Identity. Text: I am David Ben-Gurion, born in Plonsk in 1886.",
    );
    let h = harness(
        vec![("Who are you?", bio)],
        Box::new(|_: &str| {
            Ok(SupportAssessment::new(
                SupportLevel::Strong,
                vec![Quote {
                    text: "I am David Ben-Gurion".to_string(),
                    provenance_id: "BG-1".to_string(),
                }],
            ))
        }),
        Ok(Vec::new()),
        RecordingLlm::default(),
        false,
    );

    let out = h.pipeline.answer_query("Who are you?").expect("answer");
    assert_eq!(out.answer, "answer");
    assert_eq!(out.provenance_csv(), "BG-1");

    let contexts = h.llm.contexts(PromptKind::Answer);
    assert_eq!(contexts.len(), 5);
    assert!(contexts.iter().all(|c| c == "I am David Ben-Gurion"));

    let log = h.pipeline.interaction_log().read_all().expect("log");
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].support_level, "Strong support");
    assert_eq!(log[0].successful_query.as_deref(), Some("Who are you?"));
    assert_eq!(log[0].detected_language, "en");
    assert!(log[0].reformulated_queries.is_empty());
}

fn strong_quotes(cited: &'static [&'static str]) -> Box<VerifyFn> {
    Box::new(move |_: &str| {
        Ok(SupportAssessment::new(
            SupportLevel::Strong,
            cited
                .iter()
                .map(|id| Quote {
                    text: format!("quote from {id}"),
                    provenance_id: id.to_string(),
                })
                .collect(),
        ))
    })
}

#[test]
fn strong_support_drops_citations_that_were_not_retrieved() {
    let h = harness(
        vec![("Who are you?", fragment(0, "BG-1", "I am David Ben-Gurion"))],
        strong_quotes(&["BG-999", "BG-1"]),
        Ok(Vec::new()),
        RecordingLlm::default(),
        false,
    );
    let out = h.pipeline.answer_query("Who are you?").expect("answer");
    assert_eq!(out.provenance_ids, vec!["BG-1".to_string()]);
    let log = h.pipeline.interaction_log().read_all().expect("log");
    assert_eq!(log[0].provenance_ids, vec!["BG-1".to_string()]);
}

#[test]
fn strong_support_citing_only_unknown_sources_falls_back_to_retrieved_blocks() {
    let h = harness(
        vec![("Who are you?", fragment(0, "BG-1", "I am David Ben-Gurion"))],
        strong_quotes(&["BG-999"]),
        Ok(Vec::new()),
        RecordingLlm::default(),
        false,
    );
    let out = h.pipeline.answer_query("Who are you?").expect("answer");
    assert_eq!(out.provenance_csv(), "BG-1");
    let log = h.pipeline.interaction_log().read_all().expect("log");
    assert_eq!(log[0].support_level, "Strong support");
    assert_eq!(log[0].provenance_ids, vec!["BG-1".to_string()]);
}

#[test]
fn no_support_without_variants_falls_back_to_empty_context() {
    let f = fragment(0, "BG-1", "Headline: Weather. Text: It rained.");
    let h = harness(
        vec![("What is your vision?", f)],
        Box::new(no_support),
        Ok(Vec::new()),
        RecordingLlm::default(),
        false,
    );

    let out = h.pipeline.answer_query("What is your vision?").expect("answer");
    assert!(out.provenance_ids.is_empty());
    assert_eq!(out.provenance_csv(), "");
    assert!(h.llm.contexts(PromptKind::Answer).iter().all(|c| c.is_empty()));

    let log = h.pipeline.interaction_log().read_all().expect("log");
    assert_eq!(log[0].support_level, "No support");
    assert_eq!(log[0].successful_query, None);
    assert!(log[0].provenance_ids.is_empty());
}

#[test]
fn first_supported_variant_short_circuits_the_rest() {
    let h = harness(
        vec![
            ("q1", fragment(1, "BG-1", "nothing useful")),
            ("q2", fragment(2, "BG-2", "the Negev will test us")),
            ("q3", fragment(3, "BG-3", "never reached")),
        ],
        Box::new(|context: &str| {
            if context.contains("Negev") {
                Ok(SupportAssessment::new(
                    SupportLevel::Partial,
                    vec![Quote {
                        text: "the Negev will test us".to_string(),
                        provenance_id: "BG-2".to_string(),
                    }],
                ))
            } else {
                Ok(SupportAssessment::none())
            }
        }),
        Ok(vec!["q1".to_string(), "q2".to_string(), "q3".to_string()]),
        RecordingLlm::default(),
        false,
    );

    let out = h.pipeline.answer_query("original question").expect("answer");
    assert_eq!(
        *h.retriever.searched.lock().unwrap(),
        vec!["original question".to_string(), "q1".to_string(), "q2".to_string()]
    );
    // The original query was probed without hits, so only the two variant probes reached the
    // verifier, both with the user's words.
    assert_eq!(
        *h.verifier.queries.lock().unwrap(),
        vec!["original question".to_string(), "original question".to_string()]
    );
    assert_eq!(out.provenance_ids, vec!["BG-2".to_string()]);

    // Partial support grounds the answer in the whole assembled block.
    let contexts = h.llm.contexts(PromptKind::Answer);
    assert!(contexts.iter().all(|c| c == "[[source:BG-2]]\nthe Negev will test us"));

    let log = h.pipeline.interaction_log().read_all().expect("log");
    assert_eq!(log[0].support_level, "Partial support");
    assert_eq!(log[0].successful_query.as_deref(), Some("q2"));
    // q3 was never searched, so it is not recorded as tried.
    assert_eq!(log[0].reformulated_queries, vec!["q1", "q2"]);
}

#[test]
fn malformed_verifier_output_is_logged_as_undetermined() {
    let h = harness(
        vec![("q", fragment(0, "BG-1", "text"))],
        Box::new(|_: &str| Err(AppError::new(codes::VERIFIER_MALFORMED, "bad json"))),
        Ok(Vec::new()),
        RecordingLlm::default(),
        false,
    );
    let out = h.pipeline.answer_query("q").expect("malformed output is not fatal");
    assert!(out.provenance_ids.is_empty());
    let log = h.pipeline.interaction_log().read_all().expect("log");
    assert_eq!(log[0].support_level, "Undetermined");
}

#[test]
fn malformed_reformulation_means_no_variants() {
    let h = harness(
        vec![("q", fragment(0, "BG-1", "text"))],
        Box::new(no_support),
        Err(AppError::new(codes::REFORMULATION_MALFORMED, "bad json")),
        RecordingLlm::default(),
        false,
    );
    let out = h.pipeline.answer_query("q").expect("fallback");
    assert!(out.provenance_ids.is_empty());
    assert_eq!(h.retriever.searched.lock().unwrap().len(), 1);
}

#[test]
fn probe_reports_no_hits_without_calling_the_verifier() {
    let h = harness(
        Vec::new(),
        Box::new(no_support),
        Ok(Vec::new()),
        RecordingLlm::default(),
        false,
    );
    assert_eq!(h.pipeline.probe("anything", "anything").expect("probe"), Probe::NoHits);
    assert!(h.verifier.queries.lock().unwrap().is_empty());
}

#[test]
fn exhausted_rate_limit_fails_without_logging() {
    let h = harness(
        vec![("q", fragment(0, "BG-1", "text"))],
        Box::new(no_support),
        Ok(Vec::new()),
        RecordingLlm {
            rate_limited: true,
            ..RecordingLlm::default()
        },
        false,
    );
    let err = h.pipeline.answer_query("q").expect_err("fatal");
    assert!(err.is_rate_limited());
    assert!(h.pipeline.interaction_log().read_all().expect("log").is_empty());
}

#[test]
fn style_pass_rewrites_the_final_answer_only() {
    let h = harness(
        vec![("מי אתה?", fragment(0, "BG-1", "אני דוד בן גוריון"))],
        Box::new(no_support),
        Ok(Vec::new()),
        RecordingLlm::default(),
        true,
    );
    let out = h.pipeline.answer_query("מי אתה?").expect("answer");
    assert_eq!(out.answer, "styled");
    let log = h.pipeline.interaction_log().read_all().expect("log");
    assert_eq!(log[0].pre_translation_answer, "answer");
    assert_eq!(log[0].final_answer, "styled");
    assert_eq!(log[0].detected_language, "he");
    assert_eq!(log[0].original_query, "מי אתה?");
}
