use std::sync::Arc;

use chatdbg_core::config::PersonaConfig;
use chatdbg_core::error::AppError;
use chatdbg_core::lang::Language;

use crate::llm::Llm;
use crate::prompts;
use crate::retry::RetryPolicy;

/// Final rewrite into the persona's voice and the language the user asked in.
pub struct StylePass {
    llm: Arc<dyn Llm>,
    retry: RetryPolicy,
    persona: PersonaConfig,
    enabled: bool,
}

impl StylePass {
    pub fn new(
        llm: Arc<dyn Llm>,
        retry: RetryPolicy,
        persona: PersonaConfig,
        enabled: bool,
    ) -> Self {
        Self {
            llm,
            retry,
            persona,
            enabled,
        }
    }

    pub fn apply(&self, answer: &str, language: Language) -> Result<String, AppError> {
        if !self.enabled {
            return Ok(answer.to_string());
        }
        let prompt = prompts::style_prompt(&self.persona, answer, language);
        let styled = self.retry.run("style", || self.llm.generate(&prompt))?;
        let styled = styled.trim();
        if styled.is_empty() {
            tracing::warn!("style pass returned nothing; keeping the pre-translation answer");
            return Ok(answer.to_string());
        }
        Ok(styled.to_string())
    }
}
