use std::sync::Arc;

use chatdbg_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};

use crate::guardrails::decode_structured;
use crate::llm::Llm;
use crate::prompts;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SupportLevel {
    Strong,
    Partial,
    None,
}

impl SupportLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportLevel::Strong => "Strong support",
            SupportLevel::Partial => "Partial support",
            SupportLevel::None => "No support",
        }
    }

    /// Exactly one of the three labels, ignoring case and surrounding whitespace.
    pub fn parse(label: &str) -> Option<Self> {
        let l = label.trim().to_lowercase();
        match l.as_str() {
            "strong support" => Some(SupportLevel::Strong),
            "partial support" => Some(SupportLevel::Partial),
            "no support" => Some(SupportLevel::None),
            _ => None,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, SupportLevel::None)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quote {
    pub text: String,
    pub provenance_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SupportAssessment {
    level: SupportLevel,
    quotes: Vec<Quote>,
}

impl SupportAssessment {
    /// `None` never carries quotes, and `Strong` without quotes has nothing narrower to ground on,
    /// so it is recorded as `Partial`.
    pub fn new(level: SupportLevel, quotes: Vec<Quote>) -> Self {
        let quotes: Vec<Quote> = quotes
            .into_iter()
            .filter(|q| !q.text.trim().is_empty())
            .collect();
        match level {
            SupportLevel::None => Self {
                level,
                quotes: Vec::new(),
            },
            SupportLevel::Strong if quotes.is_empty() => Self {
                level: SupportLevel::Partial,
                quotes,
            },
            _ => Self { level, quotes },
        }
    }

    pub fn none() -> Self {
        Self::new(SupportLevel::None, Vec::new())
    }

    pub fn level(&self) -> SupportLevel {
        self.level
    }

    pub fn quotes(&self) -> &[Quote] {
        &self.quotes
    }
}

/// Classifies whether `context` supports answering `query`.
///
/// Output that cannot be decoded, or whose level is outside the three labels, is an
/// `AI_VERIFIER_MALFORMED` error: no decision was reached. That is different from
/// `SupportLevel::None`.
pub trait SupportVerifier: Send + Sync {
    fn verify(&self, query: &str, context: &str) -> Result<SupportAssessment, AppError>;
}

#[derive(Debug, Deserialize)]
struct RawQuote {
    text: String,
    #[serde(default)]
    provenance_id: String,
}

#[derive(Debug, Deserialize)]
struct RawAssessment {
    support_level: String,
    #[serde(default)]
    quotes: Vec<RawQuote>,
}

pub fn parse_assessment(raw: &str) -> Result<SupportAssessment, AppError> {
    let decoded: RawAssessment =
        decode_structured(raw, codes::VERIFIER_MALFORMED, "support assessment")?;
    let level = SupportLevel::parse(&decoded.support_level).ok_or_else(|| {
        AppError::new(codes::VERIFIER_MALFORMED, "Support level outside the known labels")
            .with_details(format!("support_level={}", decoded.support_level))
    })?;
    let quotes = decoded
        .quotes
        .into_iter()
        .map(|q| Quote {
            text: q.text.trim().to_string(),
            provenance_id: q.provenance_id.trim().to_string(),
        })
        .collect();
    Ok(SupportAssessment::new(level, quotes))
}

pub struct LlmSupportVerifier {
    llm: Arc<dyn Llm>,
    retry: RetryPolicy,
}

impl LlmSupportVerifier {
    pub fn new(llm: Arc<dyn Llm>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }
}

impl SupportVerifier for LlmSupportVerifier {
    fn verify(&self, query: &str, context: &str) -> Result<SupportAssessment, AppError> {
        let prompt = prompts::verify_prompt(query, context);
        let raw = self.retry.run("verify", || self.llm.generate(&prompt))?;
        parse_assessment(&raw)
    }
}
