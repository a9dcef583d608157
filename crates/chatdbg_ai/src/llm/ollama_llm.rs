use chatdbg_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::{Llm, Prompt};
use crate::ollama::{map_call_error, OllamaClient};

#[derive(Debug, Clone)]
pub struct OllamaLlm {
    client: OllamaClient,
    model: String,
}

impl OllamaLlm {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl Llm for OllamaLlm {
    fn generate(&self, prompt: &Prompt) -> Result<String, AppError> {
        let url = format!("{}/api/generate", self.client.base_url());
        let body = prompt.render_body();
        let req = GenerateRequest {
            model: &self.model,
            system: &prompt.instructions,
            prompt: &body,
            stream: false,
            options: GenerateOptions {
                temperature: prompt.temperature,
            },
        };

        tracing::debug!(kind = prompt.kind.as_str(), model = %self.model, "generate");
        let resp = ureq::post(&url)
            .timeout(self.client.timeout())
            .send_json(serde_json::to_value(req).map_err(|e| {
                AppError::new("AI_GENERATION_FAILED", "Failed to encode generate request")
                    .with_details(e.to_string())
            })?);

        match resp {
            Ok(r) => {
                let v: GenerateResponse = r.into_json().map_err(|e| {
                    AppError::new("AI_GENERATION_FAILED", "Failed to decode generate response")
                        .with_details(e.to_string())
                })?;
                Ok(v.response)
            }
            Err(e) => Err(map_call_error(e, "AI_GENERATION_FAILED", "generate")),
        }
    }
}
