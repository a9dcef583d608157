use std::sync::Arc;

use chatdbg_core::config::PersonaConfig;
use chatdbg_core::error::{codes, AppError};
use chatdbg_core::lang::Language;
use serde::Deserialize;

use crate::guardrails::decode_structured;
use crate::llm::Llm;
use crate::prompts;
use crate::retry::RetryPolicy;

/// Alternative phrasings of a query used only to retarget retrieval. First entry is tried first.
pub trait Reformulator: Send + Sync {
    fn reformulate(&self, query: &str, language: Language) -> Result<Vec<String>, AppError>;
}

/// Decoded rewrite of one query.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Rewrite {
    pub addresses_persona: bool,
    pub refined: String,
    #[serde(default)]
    pub explicit_subject: Option<String>,
    #[serde(default)]
    pub explicit_subject_refined: Option<String>,
}

fn push_distinct(out: &mut Vec<String>, candidate: &str) {
    let c = candidate.trim();
    if !c.is_empty() && !out.iter().any(|v| v == c) {
        out.push(c.to_string());
    }
}

/// Variant order: second-person queries try refined, explicit-subject refined, the original and
/// the unrefined explicit-subject form; other queries try refined then original.
pub fn build_variants(original: &str, rewrite: &Rewrite) -> Vec<String> {
    let mut out = Vec::new();
    push_distinct(&mut out, &rewrite.refined);
    if rewrite.addresses_persona {
        if let Some(s) = rewrite.explicit_subject_refined.as_deref() {
            push_distinct(&mut out, s);
        }
        push_distinct(&mut out, original);
        if let Some(s) = rewrite.explicit_subject.as_deref() {
            push_distinct(&mut out, s);
        }
    } else {
        push_distinct(&mut out, original);
    }
    out
}

/// Interleave each variant with its translation, then drop exact repeats.
pub fn pair_with_translations(
    variants: Vec<String>,
    translations: Vec<Option<String>>,
) -> Vec<String> {
    let mut out = Vec::with_capacity(variants.len() * 2);
    for (v, t) in variants.iter().zip(translations.into_iter().chain(std::iter::repeat(None))) {
        push_distinct(&mut out, v);
        if let Some(t) = t {
            push_distinct(&mut out, &t);
        }
    }
    out
}

pub struct LlmReformulator {
    llm: Arc<dyn Llm>,
    retry: RetryPolicy,
    persona: PersonaConfig,
    default_language: Language,
}

impl LlmReformulator {
    pub fn new(
        llm: Arc<dyn Llm>,
        retry: RetryPolicy,
        persona: PersonaConfig,
        default_language: Language,
    ) -> Self {
        Self {
            llm,
            retry,
            persona,
            default_language,
        }
    }

    fn translate(&self, text: &str) -> Result<Option<String>, AppError> {
        let prompt = prompts::translate_prompt(text, self.default_language);
        let out = self.retry.run("translate", || self.llm.generate(&prompt))?;
        let out = out.trim();
        Ok((!out.is_empty()).then(|| out.to_string()))
    }
}

impl Reformulator for LlmReformulator {
    fn reformulate(&self, query: &str, language: Language) -> Result<Vec<String>, AppError> {
        let prompt = prompts::reformulate_prompt(&self.persona, query);
        let raw = self.retry.run("reformulate", || self.llm.generate(&prompt))?;
        let rewrite: Rewrite =
            decode_structured(&raw, codes::REFORMULATION_MALFORMED, "query rewrite")?;
        let variants = build_variants(query, &rewrite);

        // Unknown script is left untranslated; there is nothing reliable to translate from.
        if language == Language::Unknown || language == self.default_language {
            return Ok(variants);
        }
        let mut translations = Vec::with_capacity(variants.len());
        for v in variants.iter() {
            translations.push(self.translate(v)?);
        }
        Ok(pair_with_translations(variants, translations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[test]
    fn second_person_query_yields_four_distinct_variants() {
        let rw = Rewrite {
            addresses_persona: true,
            refined: s("What was your vision for the Negev?"),
            explicit_subject: Some(s("what is Ben-Gurion vision for negev")),
            explicit_subject_refined: Some(s("What was Ben-Gurion's vision for the Negev?")),
        };
        assert_eq!(
            build_variants("what is your vision for negev", &rw),
            vec![
                s("What was your vision for the Negev?"),
                s("What was Ben-Gurion's vision for the Negev?"),
                s("what is your vision for negev"),
                s("what is Ben-Gurion vision for negev"),
            ]
        );
    }

    #[test]
    fn already_fluent_query_is_not_repeated() {
        let rw = Rewrite {
            addresses_persona: false,
            refined: s("When was the state declared?"),
            explicit_subject: None,
            explicit_subject_refined: None,
        };
        assert_eq!(
            build_variants("When was the state declared?", &rw),
            vec![s("When was the state declared?")]
        );
    }

    #[test]
    fn translations_follow_their_variant() {
        let out = pair_with_translations(
            vec![s("a"), s("b"), s("c")],
            vec![Some(s("A")), Some(s("a")), None],
        );
        assert_eq!(out, vec![s("a"), s("A"), s("b"), s("c")]);
    }
}
