use serde::{Deserialize, Serialize};

use super::IndexError;

/// Whether a text is embedded as a search query or as corpus content.
/// Asymmetric embedding models score query-vs-document pairs better when
/// each side is tagged with its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedMode {
    Query,
    Document,
}

/// Embedding model abstraction
pub trait EmbeddingModel: Send + Sync {
    fn embed(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>, IndexError>;
    fn dimension(&self) -> usize;
}

/// Allow `Box<dyn EmbeddingModel>` to be used as `&impl EmbeddingModel`.
impl EmbeddingModel for Box<dyn EmbeddingModel> {
    fn embed(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>, IndexError> {
        (**self).embed(text, mode)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }
}

/// Ollama-backed embedder using /api/embeddings.
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    dimension: usize,
    client: reqwest::blocking::Client,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, dimension: usize, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimension,
            client,
        }
    }

    /// nomic-style task prefixes; harmless for models that ignore them.
    fn tagged(&self, text: &str, mode: EmbedMode) -> String {
        match mode {
            EmbedMode::Query => format!("search_query: {text}"),
            EmbedMode::Document => format!("search_document: {text}"),
        }
    }
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl EmbeddingModel for OllamaEmbedder {
    fn embed(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>, IndexError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let prompt = self.tagged(text, mode);
        let body = OllamaEmbeddingRequest {
            model: &self.model,
            prompt: &prompt,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| IndexError::Embedding(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(IndexError::Embedding(format!("HTTP {status}: {body}")));
        }

        let parsed: OllamaEmbeddingResponse = response
            .json()
            .map_err(|e| IndexError::Embedding(e.to_string()))?;

        if parsed.embedding.is_empty() {
            return Err(IndexError::Embedding("empty embedding returned".into()));
        }
        Ok(parsed.embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_and_document_prefixes_differ() {
        let embedder = OllamaEmbedder::new("http://localhost:11434", "nomic-embed-text", 768, 30);
        assert_eq!(
            embedder.tagged("who can approve", EmbedMode::Query),
            "search_query: who can approve"
        );
        assert_eq!(
            embedder.tagged("Grants approval rights", EmbedMode::Document),
            "search_document: Grants approval rights"
        );
    }
}
