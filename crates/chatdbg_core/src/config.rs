//! Configuration for the chatbot.
//!
//! Values resolve in layers (later overrides earlier):
//! 1. Hard-coded defaults
//! 2. Config file (`chatdbg.toml`)
//! 3. Environment variables (`CHATDBG_*`)
//!
//! ```toml
//! [paths]
//! data_dir = "./data"
//!
//! [retrieval]
//! k = 10
//! semantic_weight = 0.6
//! lexical_weight = 0.4
//!
//! [answer]
//! samples = 5
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{codes, AppError};
use crate::lang::Language;

pub const DEFAULT_CONFIG_FILE: &str = "chatdbg.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub persona: PersonaConfig,
    pub paths: PathsConfig,
    pub ollama: OllamaConfig,
    pub retrieval: RetrievalConfig,
    pub answer: AnswerConfig,
    pub retry: RetryConfig,
    pub language: LanguageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PersonaConfig {
    pub name: String,
    pub native_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub stopwords_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub chat_model: String,
    pub embed_model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub k: usize,
    pub semantic_weight: f64,
    pub lexical_weight: f64,
    pub rrf_c: u32,
    pub neighbor_radius: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnswerConfig {
    pub samples: usize,
    pub temperature: f32,
    pub style_pass: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LanguageConfig {
    pub default: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            persona: PersonaConfig::default(),
            paths: PathsConfig::default(),
            ollama: OllamaConfig::default(),
            retrieval: RetrievalConfig::default(),
            answer: AnswerConfig::default(),
            retry: RetryConfig::default(),
            language: LanguageConfig::default(),
        }
    }
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "David Ben-Gurion".to_string(),
            native_name: "דוד בן גוריון".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            stopwords_path: None,
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            chat_model: "llama3.1:8b".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 10,
            semantic_weight: 0.6,
            lexical_weight: 0.4,
            rrf_c: 60,
            neighbor_radius: 0,
        }
    }
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            samples: 5,
            temperature: 0.7,
            style_pass: true,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_secs: 5,
        }
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            default: "he".to_string(),
        }
    }
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::new(codes::CONFIG_INVALID, message)
}

impl Config {
    /// Load from `path`. A missing file yields defaults; a malformed one is an error.
    /// Environment overrides are applied and the result validated either way.
    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str::<Self>(&content).map_err(|e| {
                invalid("Failed to parse config file")
                    .with_details(format!("path={}; err={}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found; using defaults");
                Self::default()
            }
            Err(e) => {
                return Err(invalid("Failed to read config file")
                    .with_details(format!("path={}; err={}", path.display(), e)))
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `CHATDBG_*` overrides. `lookup` is injected so tests need not touch the process env.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("CHATDBG_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CHATDBG_OLLAMA_URL") {
            self.ollama.base_url = v;
        }
        if let Some(v) = lookup("CHATDBG_CHAT_MODEL") {
            self.ollama.chat_model = v;
        }
        if let Some(v) = lookup("CHATDBG_EMBED_MODEL") {
            self.ollama.embed_model = v;
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let r = &self.retrieval;
        for (name, w) in [
            ("semantic_weight", r.semantic_weight),
            ("lexical_weight", r.lexical_weight),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(invalid("Retrieval weights must be finite and non-negative")
                    .with_details(format!("{name}={w}")));
            }
        }
        if r.semantic_weight + r.lexical_weight <= 0.0 {
            return Err(invalid("At least one retrieval weight must be positive"));
        }
        if r.k == 0 {
            return Err(invalid("retrieval.k must be at least 1"));
        }
        if self.answer.samples == 0 {
            return Err(invalid("answer.samples must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts must be at least 1"));
        }
        if !self.ollama.base_url.starts_with("http://127.0.0.1") {
            return Err(invalid("ollama.base_url must point at 127.0.0.1")
                .with_details(format!("base_url={}", self.ollama.base_url)));
        }
        if self.default_language().is_none() {
            return Err(invalid("language.default must be a known language code")
                .with_details(format!("default={}", self.language.default)));
        }
        Ok(())
    }

    pub fn default_language(&self) -> Option<Language> {
        Language::from_code(&self.language.default).filter(|l| *l != Language::Unknown)
    }

    pub fn corpus_db_path(&self) -> PathBuf {
        self.paths.data_dir.join("corpus.sqlite")
    }

    pub fn index_root(&self) -> PathBuf {
        self.paths.data_dir.clone()
    }

    pub fn interaction_log_path(&self) -> PathBuf {
        self.paths.data_dir.join("logs").join("interactions.jsonl")
    }
}
