use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::IngestWarning;
use crate::corpus::{replace_fragments, FragmentDraft};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveCsvMapping {
    /// Column holding the citation id (e.g. `book_id`). Required.
    pub provenance_id: String,
    /// Column grouping fragments into source documents. Blank cells fall back to the provenance id.
    pub source_id: Option<String>,
    /// Column holding the item headline. Required.
    pub headline: String,
    /// Columns concatenated (in order, no separator) into the body text.
    pub text: Vec<String>,
}

impl Default for ArchiveCsvMapping {
    fn default() -> Self {
        Self {
            provenance_id: "book_id".to_string(),
            source_id: Some("unit".to_string()),
            headline: "headline".to_string(),
            text: vec!["additional_info".to_string(), "additional_info_2".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveCsvPreview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveImportSummary {
    pub inserted: usize,
    pub skipped: usize,
    pub warnings: Vec<IngestWarning>,
}

fn reader(csv_text: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_text.as_bytes())
}

fn column(headers: &csv::StringRecord, name: &str) -> Result<usize, AppError> {
    headers.iter().position(|h| h.trim() == name).ok_or_else(|| {
        AppError::new("INGEST_CSV_MAPPING_INVALID", "Mapped column not found in CSV header")
            .with_details(format!("column={name}"))
    })
}

fn cell(row: &csv::StringRecord, idx: usize) -> &str {
    row.get(idx).map(|v| v.trim()).unwrap_or("")
}

/// `Headline: <h>. Text: <t>`, or `Headline: <h>` when there is no body text.
pub fn fragment_content(headline: &str, text: &str) -> String {
    if text.is_empty() {
        format!("Headline: {headline}")
    } else {
        format!("Headline: {headline}. Text: {text}")
    }
}

pub fn preview_archive_csv(csv_text: &str, max_rows: usize) -> Result<ArchiveCsvPreview, AppError> {
    let mut rdr = reader(csv_text);
    let headers = rdr
        .headers()
        .map_err(|e| {
            AppError::new("INGEST_CSV_PARSE_FAILED", "Failed to read CSV header")
                .with_details(e.to_string())
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for rec in rdr.records().take(max_rows) {
        let rec = rec.map_err(|e| {
            AppError::new("INGEST_CSV_PARSE_FAILED", "Failed to read CSV row")
                .with_details(e.to_string())
        })?;
        rows.push(rec.iter().map(|v| v.to_string()).collect());
    }
    Ok(ArchiveCsvPreview { headers, rows })
}

/// Parse archive rows into fragment drafts without touching the database.
pub fn parse_archive_csv(
    csv_text: &str,
    mapping: &ArchiveCsvMapping,
) -> Result<(Vec<FragmentDraft>, ArchiveImportSummary), AppError> {
    let mut rdr = reader(csv_text);
    let headers = rdr
        .headers()
        .map_err(|e| {
            AppError::new("INGEST_CSV_PARSE_FAILED", "Failed to read CSV header")
                .with_details(e.to_string())
        })?
        .clone();

    let prov_idx = column(&headers, &mapping.provenance_id)?;
    let headline_idx = column(&headers, &mapping.headline)?;
    let source_idx = match mapping.source_id.as_deref() {
        Some(name) => Some(column(&headers, name)?),
        None => None,
    };
    let text_idx = mapping
        .text
        .iter()
        .map(|name| column(&headers, name))
        .collect::<Result<Vec<_>, _>>()?;

    let mut drafts = Vec::new();
    let mut summary = ArchiveImportSummary {
        inserted: 0,
        skipped: 0,
        warnings: Vec::new(),
    };

    for (i, rec) in rdr.records().enumerate() {
        // Header is line 1.
        let line = i + 2;
        let rec = rec.map_err(|e| {
            AppError::new("INGEST_CSV_PARSE_FAILED", "Failed to read CSV row")
                .with_details(format!("line={line}; err={e}"))
        })?;

        let provenance_id = cell(&rec, prov_idx);
        if provenance_id.is_empty() {
            summary.skipped += 1;
            summary.warnings.push(
                IngestWarning::new("INGEST_ROW_MISSING_PROVENANCE", "Row has no provenance id")
                    .with_details(format!("line={line}")),
            );
            continue;
        }

        let headline = cell(&rec, headline_idx);
        let text: String = text_idx.iter().map(|&idx| cell(&rec, idx)).collect();
        if headline.is_empty() && text.is_empty() {
            summary.skipped += 1;
            summary.warnings.push(
                IngestWarning::new("INGEST_ROW_EMPTY", "Row has no headline or text")
                    .with_details(format!("line={line}; provenance_id={provenance_id}")),
            );
            continue;
        }

        let source_id = source_idx
            .map(|idx| cell(&rec, idx))
            .filter(|s| !s.is_empty())
            .unwrap_or(provenance_id);

        drafts.push(FragmentDraft {
            source_id: source_id.to_string(),
            provenance_id: provenance_id.to_string(),
            content: fragment_content(headline, &text),
        });
    }

    summary.inserted = drafts.len();
    Ok((drafts, summary))
}

/// Replace the corpus with the rows of an archive export.
pub fn import_archive_csv(
    conn: &mut Connection,
    csv_text: &str,
    mapping: &ArchiveCsvMapping,
) -> Result<ArchiveImportSummary, AppError> {
    let (drafts, summary) = parse_archive_csv(csv_text, mapping)?;
    if drafts.is_empty() {
        return Err(AppError::new("INGEST_CSV_EMPTY", "CSV contained no importable rows")
            .with_details(format!("skipped={}", summary.skipped)));
    }
    replace_fragments(conn, &drafts)?;
    tracing::info!(
        inserted = summary.inserted,
        skipped = summary.skipped,
        "imported archive csv"
    );
    Ok(summary)
}
