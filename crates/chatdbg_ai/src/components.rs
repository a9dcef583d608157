use std::sync::Arc;

use chatdbg_core::config::Config;
use chatdbg_core::corpus::{load_corpus, Corpus};
use chatdbg_core::db;
use chatdbg_core::error::{codes, AppError};
use chatdbg_core::interaction_log::InteractionLog;
use chatdbg_core::lang::QueryNormalizer;

use crate::assemble::ContextAssembler;
use crate::consistency::ConsistentAnswerer;
use crate::embeddings::ollama_embed::OllamaEmbedder;
use crate::embeddings::Embedder;
use crate::index::IndexStore;
use crate::llm::ollama_llm::OllamaLlm;
use crate::llm::Llm;
use crate::ollama::OllamaClient;
use crate::pipeline::{Pipeline, PipelineParts};
use crate::reformulate::LlmReformulator;
use crate::retrieve::{HybridRetriever, LexicalRetriever, Retriever, SemanticRetriever};
use crate::retry::RetryPolicy;
use crate::style::StylePass;
use crate::verify::LlmSupportVerifier;

/// Load the corpus from the configured database.
pub fn load_corpus_from(config: &Config) -> Result<Corpus, AppError> {
    let mut conn = db::open_existing(&config.corpus_db_path())?;
    db::migrate(&mut conn)?;
    load_corpus(&conn)
}

pub fn ollama_client(config: &Config) -> Result<OllamaClient, AppError> {
    Ok(OllamaClient::new(&config.ollama.base_url)?
        .with_timeout(std::time::Duration::from_secs(config.ollama.timeout_secs)))
}

/// Build every long-lived collaborator once. Nothing is degraded: any missing resource fails.
pub fn initialize_components(config: &Config) -> Result<Pipeline, AppError> {
    config.validate()?;
    let default_language = config.default_language().ok_or_else(|| {
        AppError::new(codes::CONFIG_INVALID, "language.default is not a known language")
    })?;

    let corpus = load_corpus_from(config).map_err(|e| e.into_resource_load("corpus"))?;
    if corpus.is_empty() {
        return Err(AppError::new(codes::RESOURCE_LOAD_FAILED, "Failed to load corpus")
            .with_details("corpus has no fragments; run ingest first"));
    }
    let corpus = Arc::new(corpus);

    let index = IndexStore::open(config.index_root())
        .load()
        .map_err(|e| e.into_resource_load("vector index"))?;
    if index.model() != config.ollama.embed_model {
        tracing::warn!(
            index_model = index.model(),
            configured = %config.ollama.embed_model,
            "index was built with a different embedding model; querying with the index model"
        );
    }
    let index = Arc::new(index);

    let normalizer = match config.paths.stopwords_path.as_deref() {
        Some(path) => QueryNormalizer::from_stopwords_file(path)
            .map_err(|e| e.into_resource_load("stopwords"))?,
        None => QueryNormalizer::default(),
    };
    let normalizer = Arc::new(normalizer);

    let client = ollama_client(config).map_err(|e| e.into_resource_load("language model"))?;
    client
        .health_check()
        .map_err(|e| e.into_resource_load("language model"))?;

    let embedder: Arc<dyn Embedder> = Arc::new(OllamaEmbedder::new(client.clone()));
    let llm: Arc<dyn Llm> = Arc::new(OllamaLlm::new(client, config.ollama.chat_model.clone()));
    let retry = RetryPolicy::from(&config.retry);

    let semantic: Arc<dyn Retriever> = Arc::new(SemanticRetriever::new(
        corpus.clone(),
        index.clone(),
        embedder,
    ));
    let lexical: Arc<dyn Retriever> = Arc::new(LexicalRetriever::new(&corpus, normalizer));
    let retriever = Arc::new(HybridRetriever::new(
        semantic,
        config.retrieval.semantic_weight as f32,
        lexical,
        config.retrieval.lexical_weight as f32,
        config.retrieval.rrf_c,
    ));

    tracing::info!(
        fragments = corpus.len(),
        dims = index.dims(),
        model = %config.ollama.chat_model,
        "components initialized"
    );

    Ok(Pipeline::new(PipelineParts {
        retriever,
        assembler: ContextAssembler::new(corpus, config.retrieval.neighbor_radius),
        verifier: Arc::new(LlmSupportVerifier::new(llm.clone(), retry)),
        reformulator: Arc::new(LlmReformulator::new(
            llm.clone(),
            retry,
            config.persona.clone(),
            default_language,
        )),
        answerer: ConsistentAnswerer::new(
            llm.clone(),
            retry,
            config.persona.clone(),
            config.answer.samples,
            config.answer.temperature,
        ),
        style: StylePass::new(llm, retry, config.persona.clone(), config.answer.style_pass),
        log: Arc::new(InteractionLog::open(config.interaction_log_path())),
        k: config.retrieval.k,
    }))
}
