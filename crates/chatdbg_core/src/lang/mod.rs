//! Query language detection and text normalization used for lexical matching.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    He,
    En,
    Unknown,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::He => "he",
            Language::En => "en",
            Language::Unknown => "unknown",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "he" => Some(Language::He),
            "en" => Some(Language::En),
            "unknown" => Some(Language::Unknown),
            _ => None,
        }
    }

    /// Human readable name used inside prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::He => "Hebrew",
            Language::En => "English",
            Language::Unknown => "the language of the question",
        }
    }
}

fn is_hebrew(c: char) -> bool {
    ('\u{0590}'..='\u{05FF}').contains(&c) || ('\u{FB1D}'..='\u{FB4F}').contains(&c)
}

/// Classify by script: whichever of Hebrew or Latin letters dominates wins.
pub fn detect_language(text: &str) -> Language {
    let mut hebrew = 0usize;
    let mut latin = 0usize;
    for c in text.chars() {
        if is_hebrew(c) {
            hebrew += 1;
        } else if c.is_ascii_alphabetic() {
            latin += 1;
        }
    }
    if hebrew == 0 && latin == 0 {
        Language::Unknown
    } else if hebrew >= latin {
        Language::He
    } else {
        Language::En
    }
}

const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "did", "do",
    "does", "for", "from", "had", "has", "have", "how", "i", "if", "in", "into", "is", "it", "its",
    "me", "my", "of", "on", "or", "so", "than", "that", "the", "their", "them", "then", "there",
    "these", "they", "this", "to", "was", "we", "were", "what", "when", "where", "which", "who",
    "whom", "why", "will", "with", "would", "you", "your",
];

/// Lowercases, strips punctuation and drops stopwords. Hebrew stopwords come from an
/// optional word list; English uses a built-in list.
#[derive(Debug, Clone, Default)]
pub struct QueryNormalizer {
    hebrew_stopwords: HashSet<String>,
}

impl QueryNormalizer {
    pub fn new(hebrew_stopwords: impl IntoIterator<Item = String>) -> Self {
        Self {
            hebrew_stopwords: hebrew_stopwords
                .into_iter()
                .map(|w| w.trim().to_string())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    /// Load a stopword file with one word per line.
    pub fn from_stopwords_file(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new("LANG_STOPWORDS_LOAD_FAILED", "Failed to read stopwords file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        Ok(Self::new(raw.lines().map(|l| l.to_string())))
    }

    /// Tokens used for lexical scoring. Both stopword lists apply whatever the dominant
    /// script, since archive text mixes a Latin field prefix with Hebrew bodies.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !(c.is_alphanumeric() || is_hebrew(c)))
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .filter(|t| !self.is_stopword(t))
            .collect()
    }

    fn is_stopword(&self, token: &str) -> bool {
        ENGLISH_STOPWORDS.contains(&token) || self.hebrew_stopwords.contains(token)
    }

    pub fn normalize(&self, text: &str) -> String {
        self.tokens(text).join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_script() {
        assert_eq!(detect_language("מה החזון שלך?"), Language::He);
        assert_eq!(detect_language("Who are you?"), Language::En);
        assert_eq!(detect_language("1948 ?!"), Language::Unknown);
        assert_eq!(detect_language(""), Language::Unknown);
    }

    #[test]
    fn english_normalization_drops_stopwords_and_punctuation() {
        let n = QueryNormalizer::default();
        assert_eq!(n.normalize("What is YOUR vision for the Negev?"), "vision negev");
    }

    #[test]
    fn hebrew_normalization_uses_word_list() {
        let n = QueryNormalizer::new(vec!["של".to_string(), "על".to_string()]);
        assert_eq!(n.normalize("מה דעתך על הנגב"), "מה דעתך הנגב");
    }

    #[test]
    fn short_hebrew_fragment_with_latin_prefix_drops_hebrew_stopwords() {
        let n = QueryNormalizer::new(vec!["על".to_string()]);
        let text = "Headline: נגב. Text: על הנגב";
        assert_eq!(detect_language(text), Language::En);
        assert_eq!(n.normalize(text), "headline נגב text הנגב");
    }

    #[test]
    fn language_codes_round_trip_through_config_strings() {
        assert_eq!(Language::from_code("HE"), Some(Language::He));
        assert_eq!(Language::from_code("fr"), None);
    }
}
