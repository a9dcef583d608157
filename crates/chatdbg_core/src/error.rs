use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes the pipeline branches on. Everything else is matched only in tests.
pub mod codes {
    pub const RATE_LIMITED: &str = "AI_RATE_LIMITED";
    pub const PROVIDER_UNREACHABLE: &str = "AI_PROVIDER_UNREACHABLE";
    pub const VERIFIER_MALFORMED: &str = "AI_VERIFIER_MALFORMED";
    pub const ARBITRATION_MALFORMED: &str = "AI_ARBITRATION_MALFORMED";
    pub const REFORMULATION_MALFORMED: &str = "AI_REFORMULATION_MALFORMED";
    pub const RESOURCE_LOAD_FAILED: &str = "RESOURCE_LOAD_FAILED";
    pub const LOG_WRITE_FAILED: &str = "LOG_WRITE_FAILED";
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
}

/// Single structured error shape used across every layer and printed by the shell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn rate_limited(details: impl Into<String>) -> Self {
        Self::new(codes::RATE_LIMITED, "Model provider is rate limiting requests")
            .with_details(details)
            .with_retryable(true)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.code == codes::RATE_LIMITED
    }

    /// Wrap a startup failure so callers of `initialize_components` see one code.
    pub fn into_resource_load(self, what: &str) -> Self {
        let inner = match self.details.as_deref() {
            Some(d) => format!("{what}: [{}] {}; {d}", self.code, self.message),
            None => format!("{what}: [{}] {}", self.code, self.message),
        };
        AppError::new(codes::RESOURCE_LOAD_FAILED, format!("Failed to load {what}"))
            .with_details(inner)
    }

    /// One line suitable for showing to an end user. Details stay in diagnostics.
    pub fn user_message(&self) -> String {
        if self.is_rate_limited() {
            return "The model is busy right now. Please try again in a moment.".to_string();
        }
        format!("Something went wrong while answering: {}", self.message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}
