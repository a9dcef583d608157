//! Append-only JSON Lines record of every answered query.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{codes, AppError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InteractionLogEntry {
    pub timestamp: String,
    pub original_query: String,
    pub detected_language: String,
    pub reformulated_queries: Vec<String>,
    /// The query whose retrieval produced support; `None` when the fallback answered.
    pub successful_query: Option<String>,
    pub support_level: String,
    pub provenance_ids: Vec<String>,
    pub pre_translation_answer: String,
    pub final_answer: String,
}

pub fn now_rfc3339_utc() -> Result<String, AppError> {
    OffsetDateTime::now_utc().format(&Rfc3339).map_err(|e| {
        AppError::new("LOG_TIME_FAILED", "Failed to format timestamp").with_details(e.to_string())
    })
}

/// Each entry is written as a single `write_all` of one line under an exclusive file lock,
/// so concurrent writers (threads or processes) never interleave partial records.
#[derive(Debug)]
pub struct InteractionLog {
    path: PathBuf,
    guard: Mutex<()>,
}

impl InteractionLog {
    pub fn open(path: PathBuf) -> Self {
        Self {
            path,
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub fn append(&self, entry: &InteractionLogEntry) -> Result<(), AppError> {
        let mut line = serde_json::to_string(entry).map_err(|e| {
            AppError::new(codes::LOG_WRITE_FAILED, "Failed to encode interaction log entry")
                .with_details(e.to_string())
        })?;
        line.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::new(codes::LOG_WRITE_FAILED, "Failed to create interaction log directory")
                    .with_details(format!("path={}; err={}", parent.display(), e))
            })?;
        }

        // A poisoned guard only means another writer panicked; the file itself is still consistent.
        let _held = self.guard.lock().unwrap_or_else(|p| p.into_inner());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                AppError::new(codes::LOG_WRITE_FAILED, "Failed to open interaction log")
                    .with_details(format!("path={}; err={}", self.path.display(), e))
            })?;
        file.lock_exclusive().map_err(|e| {
            AppError::new(codes::LOG_WRITE_FAILED, "Failed to lock interaction log")
                .with_details(format!("path={}; err={}", self.path.display(), e))
        })?;
        let written = file.write_all(line.as_bytes()).and_then(|_| file.flush());
        if let Err(e) = FileExt::unlock(&file) {
            tracing::warn!(path = %self.path.display(), err = %e, "interaction log unlock failed");
        }
        written.map_err(|e| {
            AppError::new(codes::LOG_WRITE_FAILED, "Failed to append interaction log entry")
                .with_details(format!("path={}; err={}", self.path.display(), e))
        })
    }

    /// All entries in append order. A missing file is an empty log.
    pub fn read_all(&self) -> Result<Vec<InteractionLogEntry>, AppError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path).map_err(|e| {
            AppError::new("LOG_READ_FAILED", "Failed to open interaction log")
                .with_details(format!("path={}; err={}", self.path.display(), e))
        })?;
        let mut out = Vec::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                AppError::new("LOG_READ_FAILED", "Failed to read interaction log")
                    .with_details(format!("line={}; err={}", i + 1, e))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            out.push(serde_json::from_str(&line).map_err(|e| {
                AppError::new("LOG_READ_FAILED", "Failed to decode interaction log entry")
                    .with_details(format!("line={}; err={}", i + 1, e))
            })?);
        }
        Ok(out)
    }
}
