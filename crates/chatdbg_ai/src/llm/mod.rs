use chatdbg_core::error::AppError;

pub mod ollama_llm;

/// What a prompt is for. Providers ignore it; it lets stubs and diagnostics tell calls apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Answer,
    Verify,
    Reformulate,
    Translate,
    Judge,
    Style,
}

impl PromptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptKind::Answer => "answer",
            PromptKind::Verify => "verify",
            PromptKind::Reformulate => "reformulate",
            PromptKind::Translate => "translate",
            PromptKind::Judge => "judge",
            PromptKind::Style => "style",
        }
    }
}

/// A structured generation request: role instructions plus the query and its context.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub instructions: String,
    pub query: String,
    pub context: String,
    pub temperature: f32,
}

impl Prompt {
    /// The user-turn text sent alongside the instructions.
    pub fn render_body(&self) -> String {
        format!(
            "context: {}\n\nquery: {}\n\nanswer:",
            self.context, self.query
        )
    }
}

/// Text generation. Fails with `AI_RATE_LIMITED` when the provider throttles.
pub trait Llm: Send + Sync {
    fn generate(&self, prompt: &Prompt) -> Result<String, AppError>;
}
