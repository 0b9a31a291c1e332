pub mod ollama;
pub mod types;

pub use ollama::OllamaClient;
pub use types::{ChatMessage, ChatRole, LlmClient};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Ollama connection failed: {0}")]
    Connection(String),

    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Ollama returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}
