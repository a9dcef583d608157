use chatdbg_core::config::PersonaConfig;
use chatdbg_core::lang::Language;

use crate::llm::{Prompt, PromptKind};

/// Verification and arbitration are classification tasks; keep them deterministic.
const CLASSIFY_TEMPERATURE: f32 = 0.0;

pub fn answer_prompt(
    persona: &PersonaConfig,
    query: &str,
    context: &str,
    temperature: f32,
) -> Prompt {
    let name = &persona.name;
    let native = &persona.native_name;
    Prompt {
        kind: PromptKind::Answer,
        instructions: format!(
            r#"You are {name} ({native}). Answer the user's query in the first person, as {name} himself.

Rules (non-negotiable):
1) Use ONLY the information in the context. Do not invent facts, dates or quotations.
2) If the context is empty or does not cover the query, say briefly and in character that you cannot speak to it.
3) If the query asks about events after your lifetime, acknowledge that you cannot know them.
4) Answer in the language of the query. Use male forms even if addressed in female form.
5) Keep the answer focused and warm. Do not repeat the same idea twice.

Output:
- Plain text only. Do not restate the query or your reasoning.
"#
        ),
        query: query.to_string(),
        context: context.to_string(),
        temperature,
    }
}

pub fn verify_prompt(query: &str, context: &str) -> Prompt {
    Prompt {
        kind: PromptKind::Verify,
        instructions: r#"You decide whether the context supports answering the query.

Rules (non-negotiable):
1) "support_level" MUST be exactly one of: "Strong support", "Partial support", "No support".
   - Strong support: the context directly answers the query.
   - Partial support: the context is relevant and answers part of the query.
   - No support: the context does not help answer the query.
2) For Strong or Partial support, "quotes" MUST list the passages that justify the decision, copied
   verbatim from the context, each with the provenance id from its [[source:<id>]] marker.
3) For No support, "quotes" MUST be an empty list.

Output:
- Return JSON only, no prose, in exactly this shape:
  {"support_level": "...", "quotes": [{"text": "...", "provenance_id": "..."}]}
"#
        .to_string(),
        query: query.to_string(),
        context: context.to_string(),
        temperature: CLASSIFY_TEMPERATURE,
    }
}

pub fn reformulate_prompt(persona: &PersonaConfig, query: &str) -> Prompt {
    let name = &persona.name;
    Prompt {
        kind: PromptKind::Reformulate,
        instructions: format!(
            r#"You rewrite search queries for an archive of {name}'s writings.

Rules (non-negotiable):
1) "addresses_persona" is true if the query speaks to {name} in the second person ("you", "your").
2) "refined" is the query rewritten for fluency and clarity, keeping its meaning.
3) When addresses_persona is true, "explicit_subject" replaces the second person with {name}'s name,
   and "explicit_subject_refined" is that rewrite refined for fluency. Otherwise both are null.
4) Do NOT add facts, names or dates that are not in the query. You may only shorten the names of
   well-known entities when the meaning is unambiguous.
5) Keep the language of the query.

Output:
- Return JSON only, no prose, in exactly this shape:
  {{"addresses_persona": true, "refined": "...", "explicit_subject": "...", "explicit_subject_refined": "..."}}
"#
        ),
        query: query.to_string(),
        context: String::new(),
        temperature: CLASSIFY_TEMPERATURE,
    }
}

pub fn translate_prompt(text: &str, target: Language) -> Prompt {
    let lang = target.display_name();
    Prompt {
        kind: PromptKind::Translate,
        instructions: format!(
            r#"Translate the query into {lang}.

Rules (non-negotiable):
1) Preserve the meaning exactly. Do not answer the query.
2) Keep proper names recognizable.

Output:
- Return only the translated query.
"#
        ),
        query: text.to_string(),
        context: String::new(),
        temperature: CLASSIFY_TEMPERATURE,
    }
}

/// Candidates are numbered from 1 in the order given.
pub fn judge_prompt(query: &str, context: &str, candidates: &[String]) -> Prompt {
    let n = candidates.len();
    let mut numbered = String::new();
    for (i, c) in candidates.iter().enumerate() {
        numbered.push_str(&format!("Candidate {}:\n{}\n\n", i + 1, c.trim()));
    }
    Prompt {
        kind: PromptKind::Judge,
        instructions: format!(
            r#"Several candidate answers were generated for the same query and context.
Pick the single candidate that best represents the answer most candidates agree on, and that
stays closest to the context.

Candidates:
{numbered}
Output:
- Return JSON only: {{"choice": <number between 1 and {n}>}}
"#
        ),
        query: query.to_string(),
        context: context.to_string(),
        temperature: CLASSIFY_TEMPERATURE,
    }
}

pub fn style_prompt(persona: &PersonaConfig, answer: &str, target: Language) -> Prompt {
    let name = &persona.name;
    let lang = target.display_name();
    Prompt {
        kind: PromptKind::Style,
        instructions: format!(
            r#"Rewrite the answer in the voice of {name}, in {lang}.

Rules (non-negotiable):
1) Keep every fact of the answer and add none.
2) First person, male forms, warm and direct.
3) Do not use quotation marks around expressions typical of {name}.

Output:
- Return only the rewritten answer.
"#
        ),
        query: answer.to_string(),
        context: String::new(),
        temperature: CLASSIFY_TEMPERATURE,
    }
}
