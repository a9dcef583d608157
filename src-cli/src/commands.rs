use std::fs;
use std::io::{self, BufRead, Write};

use chatdbg_ai::components::{load_corpus_from, ollama_client};
use chatdbg_ai::embeddings::ollama_embed::OllamaEmbedder;
use chatdbg_ai::index::{IndexBuildInput, IndexStatus, IndexStore};
use chatdbg_ai::{initialize_components, QueryAnswer};
use chatdbg_core::config::Config;
use chatdbg_core::db;
use chatdbg_core::error::AppError;
use chatdbg_core::ingest::archive_csv::{
    import_archive_csv, preview_archive_csv, ArchiveCsvMapping, ArchiveCsvPreview,
    ArchiveImportSummary,
};
use chatdbg_core::interaction_log::{now_rfc3339_utc, InteractionLog, InteractionLogEntry};

use crate::cli::IngestArgs;

pub enum IngestOutcome {
    Preview(ArchiveCsvPreview),
    Imported(ArchiveImportSummary),
}

fn open_and_migrate(config: &Config) -> Result<rusqlite::Connection, AppError> {
    let path = config.corpus_db_path();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::new("DB_PATH_FAILED", "Failed to create data directory")
                .with_details(format!("path={}; err={}", dir.display(), e))
        })?;
    }
    let mut conn = db::open(&path)?;
    db::migrate(&mut conn)?;
    Ok(conn)
}

pub fn ingest(config: &Config, args: &IngestArgs) -> Result<IngestOutcome, AppError> {
    let csv_text = fs::read_to_string(&args.csv).map_err(|e| {
        AppError::new("INGEST_CSV_READ_FAILED", "Failed to read CSV file")
            .with_details(format!("path={}; err={}", args.csv.display(), e))
    })?;
    if args.preview {
        return Ok(IngestOutcome::Preview(preview_archive_csv(&csv_text, 5)?));
    }
    let mapping = ArchiveCsvMapping {
        provenance_id: args.provenance_column.clone(),
        source_id: Some(args.source_column.clone()).filter(|c| !c.trim().is_empty()),
        headline: args.headline_column.clone(),
        text: args.text_columns.clone(),
    };
    let mut conn = open_and_migrate(config)?;
    Ok(IngestOutcome::Imported(import_archive_csv(&mut conn, &csv_text, &mapping)?))
}

pub fn index(config: &Config) -> Result<IndexStatus, AppError> {
    let corpus = load_corpus_from(config)?;
    let client = ollama_client(config)?;
    client.health_check()?;
    let embedder = OllamaEmbedder::new(client);
    IndexStore::open(config.index_root()).build_with_embedder(
        &corpus,
        &embedder,
        IndexBuildInput {
            model: config.ollama.embed_model.clone(),
            updated_at: now_rfc3339_utc()?,
        },
    )
}

pub fn ask(config: &Config, question: &str) -> Result<QueryAnswer, AppError> {
    let pipeline = initialize_components(config)?;
    pipeline.answer_query(question)
}

/// Answers each non-empty stdin line. A failed question is reported and the session continues.
pub fn chat(config: &Config) -> Result<(), AppError> {
    let pipeline = initialize_components(config)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let io_err = |e: io::Error| {
        AppError::new("CLI_IO_FAILED", "Terminal I/O failed").with_details(e.to_string())
    };

    write!(stdout, "> ").and_then(|_| stdout.flush()).map_err(io_err)?;
    for line in stdin.lock().lines() {
        let line = line.map_err(io_err)?;
        let question = line.trim();
        if !question.is_empty() {
            match pipeline.answer_query(question) {
                Ok(a) => writeln!(stdout, "{}\n{}", a.answer, sources_line(&a)).map_err(io_err)?,
                Err(e) => {
                    tracing::error!(code = %e.code, details = ?e.details, "answer failed");
                    writeln!(stdout, "{}", e.user_message()).map_err(io_err)?;
                }
            }
        }
        write!(stdout, "> ").and_then(|_| stdout.flush()).map_err(io_err)?;
    }
    writeln!(stdout).map_err(io_err)
}

pub fn history(config: &Config, limit: usize) -> Result<Vec<InteractionLogEntry>, AppError> {
    let mut entries = InteractionLog::open(config.interaction_log_path()).read_all()?;
    let skip = entries.len().saturating_sub(limit);
    Ok(entries.split_off(skip))
}

pub fn sources_line(answer: &QueryAnswer) -> String {
    if answer.provenance_ids.is_empty() {
        "Sources: none".to_string()
    } else {
        format!("Sources: {}", answer.provenance_csv())
    }
}
