pub mod archive_csv;

use serde::{Deserialize, Serialize};

/// Non-fatal problem found while importing a row. Rows with warnings may still be imported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestWarning {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl IngestWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
