use std::sync::Arc;
use std::thread;

use chatdbg_core::config::PersonaConfig;
use chatdbg_core::error::{codes, AppError};
use serde::Deserialize;

use crate::guardrails::decode_structured;
use crate::llm::Llm;
use crate::prompts;
use crate::retry::RetryPolicy;

/// Self-consistent answering: `samples` concurrent generations, then arbitration if they differ.
pub struct ConsistentAnswerer {
    llm: Arc<dyn Llm>,
    retry: RetryPolicy,
    persona: PersonaConfig,
    samples: usize,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct Judgement {
    choice: usize,
}

/// Zero-based index of the chosen candidate. Accepts a bare number or `{"choice": n}`.
pub fn parse_judgement(raw: &str, candidates: usize) -> Result<usize, AppError> {
    let trimmed = raw.trim();
    let choice = match trimmed.parse::<usize>() {
        Ok(n) => n,
        Err(_) => {
            decode_structured::<Judgement>(trimmed, codes::ARBITRATION_MALFORMED, "judgement")?
                .choice
        }
    };
    if choice == 0 || choice > candidates {
        return Err(AppError::new(codes::ARBITRATION_MALFORMED, "Judgement out of range")
            .with_details(format!("choice={choice}; candidates={candidates}")));
    }
    Ok(choice - 1)
}

impl ConsistentAnswerer {
    pub fn new(
        llm: Arc<dyn Llm>,
        retry: RetryPolicy,
        persona: PersonaConfig,
        samples: usize,
        temperature: f32,
    ) -> Self {
        Self {
            llm,
            retry,
            persona,
            samples: samples.max(1),
            temperature,
        }
    }

    /// Generate every candidate concurrently and wait for all of them. Any failure fails the batch.
    fn candidates(&self, query: &str, context: &str) -> Result<Vec<String>, AppError> {
        let prompt = prompts::answer_prompt(&self.persona, query, context, self.temperature);
        let prompt = &prompt;
        let llm = self.llm.as_ref();
        let retry = self.retry;
        let results: Vec<Result<String, AppError>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..self.samples)
                .map(|_| scope.spawn(move || retry.run("answer", || llm.generate(prompt))))
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join().unwrap_or_else(|_| {
                        Err(AppError::new("AI_GENERATION_FAILED", "Answer worker panicked"))
                    })
                })
                .collect()
        });
        results.into_iter().collect()
    }

    pub fn answer(&self, query: &str, context: &str) -> Result<String, AppError> {
        let candidates = self.candidates(query, context)?;
        self.arbitrate(query, context, candidates)
    }

    /// Pick one of `candidates` (in generation order). Unanimous sets skip the judge; unusable
    /// judge output falls back to the first candidate.
    pub fn arbitrate(
        &self,
        query: &str,
        context: &str,
        mut candidates: Vec<String>,
    ) -> Result<String, AppError> {
        if candidates.is_empty() {
            return Err(AppError::new(
                "AI_GENERATION_FAILED",
                "No candidate answers to choose from",
            ));
        }
        if candidates.iter().all(|c| *c == candidates[0]) {
            tracing::debug!(samples = candidates.len(), "candidates unanimous");
            return Ok(candidates.swap_remove(0));
        }

        let prompt = prompts::judge_prompt(query, context, &candidates);
        let raw = self.retry.run("judge", || self.llm.generate(&prompt))?;
        let chosen = match parse_judgement(&raw, candidates.len()) {
            Ok(i) => {
                tracing::debug!(choice = i + 1, "arbitration picked candidate");
                i
            }
            Err(e) => {
                tracing::warn!(
                    code = %e.code,
                    details = ?e.details,
                    "arbitration output unusable; using first candidate"
                );
                0
            }
        };
        Ok(candidates.swap_remove(chosen))
    }
}
