use std::sync::Mutex;

use super::types::{SemanticMatch, VectorIndex};
use crate::pipeline::index::embedder::{EmbedMode, EmbeddingModel};
use crate::pipeline::index::vectordb::cosine_similarity;
use crate::pipeline::index::IndexError;

/// Embed the query and fetch the top-N most similar entitlement
/// descriptions.
///
/// This channel never fails the request: an embedding error, an index
/// error, or zero matches all come back as an empty list (logged, not
/// raised) and fusion degrades to its placeholder.
pub fn semantic_search(
    query_text: &str,
    embedder: &dyn EmbeddingModel,
    index: &dyn VectorIndex,
    top_n: usize,
) -> Vec<SemanticMatch> {
    let embedding = match embedder.embed(query_text, EmbedMode::Query) {
        Ok(embedding) => embedding,
        Err(e) => {
            tracing::warn!(error = %e, "Query embedding failed; skipping semantic retrieval");
            return Vec::new();
        }
    };

    match index.search(&embedding, top_n) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!(error = %e, "Vector search failed; skipping semantic retrieval");
            Vec::new()
        }
    }
}

/// Bullet lines for the fused context: "- Code <code>: <description>".
pub fn format_matches(matches: &[SemanticMatch]) -> String {
    matches
        .iter()
        .map(|m| format!("- Code {}: {}", m.code, m.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// In-memory vector index — used by tests and small deployments.
pub struct InMemoryVectorIndex {
    entries: Mutex<Vec<StoredEntry>>,
}

struct StoredEntry {
    code: String,
    description: String,
    embedding: Vec<f32>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl Default for InMemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorIndex for InMemoryVectorIndex {
    fn search(&self, embedding: &[f32], top_n: usize) -> Result<Vec<SemanticMatch>, IndexError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| IndexError::VectorDb("lock poisoned".into()))?;

        let mut scored: Vec<(f32, &StoredEntry)> = entries
            .iter()
            .map(|entry| (cosine_similarity(embedding, &entry.embedding), entry))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(top_n)
            .enumerate()
            .map(|(rank, (score, entry))| SemanticMatch {
                code: entry.code.clone(),
                description: entry.description.clone(),
                score,
                rank: rank + 1,
            })
            .collect())
    }

    fn index_entitlement(
        &self,
        code: &str,
        description: &str,
        embedding: &[f32],
    ) -> Result<(), IndexError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| IndexError::VectorDb("lock poisoned".into()))?;
        entries.retain(|e| e.code != code);
        entries.push(StoredEntry {
            code: code.to_string(),
            description: description.to_string(),
            embedding: embedding.to_vec(),
        });
        Ok(())
    }

    fn count(&self) -> Result<usize, IndexError> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| IndexError::VectorDb("lock poisoned".into()))?
            .len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEmbedder(Vec<f32>);

    impl EmbeddingModel for FixedEmbedder {
        fn embed(&self, _text: &str, _mode: EmbedMode) -> Result<Vec<f32>, IndexError> {
            Ok(self.0.clone())
        }
        fn dimension(&self) -> usize {
            self.0.len()
        }
    }

    struct BrokenEmbedder;

    impl EmbeddingModel for BrokenEmbedder {
        fn embed(&self, _text: &str, _mode: EmbedMode) -> Result<Vec<f32>, IndexError> {
            Err(IndexError::Embedding("model not loaded".into()))
        }
        fn dimension(&self) -> usize {
            0
        }
    }

    fn seeded_index() -> InMemoryVectorIndex {
        let index = InMemoryVectorIndex::new();
        index
            .index_entitlement("APP001_READ", "view data", &[1.0, 0.0, 0.0])
            .unwrap();
        index
            .index_entitlement("APP002_APPROVE", "approve workflows", &[0.0, 1.0, 0.0])
            .unwrap();
        index
    }

    #[test]
    fn search_returns_ranked_matches() {
        let index = seeded_index();
        let matches = semantic_search("view", &FixedEmbedder(vec![1.0, 0.0, 0.0]), &index, 2);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].code, "APP001_READ");
        assert_eq!(matches[0].rank, 1);
    }

    #[test]
    fn embedding_failure_returns_empty_not_error() {
        let index = seeded_index();
        let matches = semantic_search("view", &BrokenEmbedder, &index, 5);
        assert!(matches.is_empty());
    }

    #[test]
    fn empty_index_returns_empty() {
        let index = InMemoryVectorIndex::new();
        let matches = semantic_search("view", &FixedEmbedder(vec![1.0]), &index, 5);
        assert!(matches.is_empty());
    }

    #[test]
    fn bullet_formatting() {
        let matches = vec![SemanticMatch {
            code: "APP001_READ".into(),
            description: "view data".into(),
            score: 0.9,
            rank: 1,
        }];
        assert_eq!(format_matches(&matches), "- Code APP001_READ: view data");
    }
}
