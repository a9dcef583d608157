pub mod assemble;
pub mod components;
pub mod consistency;
pub mod embeddings;
pub mod guardrails;
pub mod index;
pub mod llm;
pub mod ollama;
pub mod pipeline;
pub mod prompts;
pub mod reformulate;
pub mod retrieve;
pub mod retry;
pub mod style;
pub mod verify;

pub use components::initialize_components;
pub use pipeline::{Pipeline, QueryAnswer};
