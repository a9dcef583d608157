//! Document fragments: the read-only corpus the pipeline grounds answers in.
//!
//! Fragments are persisted in SQLite by ingest and loaded once at startup into an immutable
//! [`Corpus`] that is shared across concurrent pipeline invocations.

use std::collections::HashMap;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fragment {
    pub fragment_id: String,
    pub source_id: String,
    /// Stable citation id (e.g. the archive's book id).
    pub provenance_id: String,
    /// Position within the corpus; neighbor lookup walks this.
    pub sequence_index: u32,
    pub content: String,
    pub content_sha256: String,
}

/// Input to [`replace_fragments`]; ids and hashes are derived on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentDraft {
    pub source_id: String,
    pub provenance_id: String,
    pub content: String,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn fragment_id_for(source_id: &str, sequence_index: u32, content_sha256: &str) -> String {
    sha256_hex(format!("v1|{source_id}|{sequence_index}|{content_sha256}").as_bytes())
}

/// Replace the whole fragment table in one transaction. Sequence indexes follow draft order.
pub fn replace_fragments(
    conn: &mut Connection,
    drafts: &[FragmentDraft],
) -> Result<usize, AppError> {
    let tx = conn.transaction().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to start corpus transaction")
            .with_details(e.to_string())
    })?;

    tx.execute("DELETE FROM fragments", []).map_err(|e| {
        AppError::new("CORPUS_WRITE_FAILED", "Failed to clear corpus fragments")
            .with_details(e.to_string())
    })?;

    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO fragments(
                    fragment_id, source_id, provenance_id, sequence_index, content, content_sha256
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .map_err(|e| {
                AppError::new("CORPUS_WRITE_FAILED", "Failed to prepare fragment insert")
                    .with_details(e.to_string())
            })?;

        for (i, d) in drafts.iter().enumerate() {
            let seq = i as u32;
            let content_sha256 = sha256_hex(d.content.as_bytes());
            let fragment_id = fragment_id_for(&d.source_id, seq, &content_sha256);
            stmt.execute(params![
                fragment_id,
                d.source_id,
                d.provenance_id,
                seq,
                d.content,
                content_sha256
            ])
            .map_err(|e| {
                AppError::new("CORPUS_WRITE_FAILED", "Failed to insert fragment")
                    .with_details(format!("sequence_index={seq}; err={e}"))
            })?;
        }
    }

    tx.commit().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to commit corpus transaction")
            .with_details(e.to_string())
    })?;
    Ok(drafts.len())
}

pub fn load_corpus(conn: &Connection) -> Result<Corpus, AppError> {
    let mut stmt = conn
        .prepare(
            "SELECT fragment_id, source_id, provenance_id, sequence_index, content, content_sha256
             FROM fragments ORDER BY sequence_index ASC",
        )
        .map_err(|e| {
            AppError::new("CORPUS_LOAD_FAILED", "Failed to query corpus fragments")
                .with_details(e.to_string())
        })?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Fragment {
                fragment_id: row.get(0)?,
                source_id: row.get(1)?,
                provenance_id: row.get(2)?,
                sequence_index: row.get(3)?,
                content: row.get(4)?,
                content_sha256: row.get(5)?,
            })
        })
        .map_err(|e| {
            AppError::new("CORPUS_LOAD_FAILED", "Failed to read corpus fragments")
                .with_details(e.to_string())
        })?;

    let mut fragments = Vec::new();
    for r in rows {
        fragments.push(r.map_err(|e| {
            AppError::new("CORPUS_LOAD_FAILED", "Failed to decode corpus fragment row")
                .with_details(e.to_string())
        })?);
    }
    Ok(Corpus::new(fragments))
}

/// Immutable, ordered view of all fragments.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    fragments: Vec<Fragment>,
    by_id: HashMap<String, usize>,
}

impl Corpus {
    pub fn new(mut fragments: Vec<Fragment>) -> Self {
        fragments.sort_by_key(|f| f.sequence_index);
        let by_id = fragments
            .iter()
            .enumerate()
            .map(|(i, f)| (f.fragment_id.clone(), i))
            .collect();
        Self { fragments, by_id }
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.iter()
    }

    pub fn get(&self, fragment_id: &str) -> Option<&Fragment> {
        self.by_id.get(fragment_id).map(|&i| &self.fragments[i])
    }

    /// Fragments sharing `center`'s source within `radius` positions, in corpus order.
    /// Radius 0 yields only `center`.
    pub fn window(&self, center: &Fragment, radius: u32) -> Vec<&Fragment> {
        let Some(&pos) = self.by_id.get(&center.fragment_id) else {
            return Vec::new();
        };
        let r = radius as usize;
        let start = pos.saturating_sub(r);
        let end = std::cmp::min(self.fragments.len(), pos + r + 1);
        let lo = center.sequence_index.saturating_sub(radius);
        let hi = center.sequence_index.saturating_add(radius);
        self.fragments[start..end]
            .iter()
            .filter(|f| f.source_id == center.source_id)
            .filter(|f| f.sequence_index >= lo && f.sequence_index <= hi)
            .collect()
    }
}
