use serde::{Deserialize, Serialize};

use super::super::index::IndexError;

/// Classified user intent. Greeting carries an optional extracted name
/// used only to personalize the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Greeting { name: Option<String> },
    Informational,
}

/// Outcome of one structured-query attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryStatus {
    NotAttempted,
    Success,
    Empty,
    Error,
}

/// Typed boundary between query generation/execution and fusion.
/// Created once per informational request; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAttempt {
    pub question: String,
    pub generated_sql: String,
    pub result_text: String,
    pub status: QueryStatus,
}

impl QueryAttempt {
    pub fn not_attempted(question: &str, reason: &str) -> Self {
        Self {
            question: question.to_string(),
            generated_sql: "not stated".to_string(),
            result_text: reason.to_string(),
            status: QueryStatus::NotAttempted,
        }
    }

    pub fn error(question: &str, generated_sql: &str, detail: &str) -> Self {
        Self {
            question: question.to_string(),
            generated_sql: generated_sql.to_string(),
            result_text: truncate(detail, 200),
            status: QueryStatus::Error,
        }
    }
}

/// Truncate on a char boundary, appending an ellipsis marker.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}...")
}

/// One semantic-search hit from the entitlement-description corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticMatch {
    pub code: String,
    pub description: String,
    pub score: f32,
    pub rank: usize,
}

/// The bounded context block handed to answer synthesis.
#[derive(Debug, Clone)]
pub struct FusedContext {
    pub original_query: String,
    pub structured_section: String,
    pub semantic_section: String,
}

/// Vector index collaborator: read-mostly nearest-neighbor search over
/// the entitlement corpus, plus the maintenance write used when the
/// index is (re)built.
pub trait VectorIndex: Send + Sync {
    fn search(&self, embedding: &[f32], top_n: usize) -> Result<Vec<SemanticMatch>, IndexError>;

    fn index_entitlement(
        &self,
        code: &str,
        description: &str,
        embedding: &[f32],
    ) -> Result<(), IndexError>;

    fn count(&self) -> Result<usize, IndexError>;
}
