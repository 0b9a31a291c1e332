use super::retrieval::format_matches;
use super::types::{truncate, FusedContext, QueryAttempt, QueryStatus, SemanticMatch};

pub const STRUCTURED_EMPTY_PLACEHOLDER: &str =
    "The database query ran but returned no matching records.";
pub const STRUCTURED_ERROR_PLACEHOLDER: &str =
    "The database query could not be completed.";
pub const STRUCTURED_NOT_ATTEMPTED_PLACEHOLDER: &str =
    "No database query was executed for this question.";
pub const SEMANTIC_EMPTY_PLACEHOLDER: &str =
    "No relevant entitlement descriptions were found via semantic search.";

/// Upper bound on each section so a runaway result can't blow up the
/// synthesis prompt.
const MAX_SECTION_CHARS: usize = 4000;

/// Merge the structured attempt and the semantic matches into one
/// bounded context block. Raw result text passes through only on
/// Success; every other status is normalized to a fixed placeholder so
/// the synthesizer never has to guess what an error string means.
pub fn fuse_context(
    original_query: &str,
    attempt: &QueryAttempt,
    matches: &[SemanticMatch],
) -> FusedContext {
    let structured_section = match attempt.status {
        QueryStatus::Success => truncate(&attempt.result_text, MAX_SECTION_CHARS),
        QueryStatus::Empty => STRUCTURED_EMPTY_PLACEHOLDER.to_string(),
        QueryStatus::Error => STRUCTURED_ERROR_PLACEHOLDER.to_string(),
        QueryStatus::NotAttempted => STRUCTURED_NOT_ATTEMPTED_PLACEHOLDER.to_string(),
    };

    let semantic_section = if matches.is_empty() {
        SEMANTIC_EMPTY_PLACEHOLDER.to_string()
    } else {
        truncate(&format_matches(matches), MAX_SECTION_CHARS)
    };

    FusedContext {
        original_query: original_query.to_string(),
        structured_section,
        semantic_section,
    }
}

impl FusedContext {
    /// Render the block handed to answer synthesis.
    pub fn render(&self, generated_sql: &str) -> String {
        format!(
            "User query: {query}\n\n\
             Information from the entitlement database (generated SQL: {sql}):\n\
             {structured}\n\n\
             Related entitlement descriptions from semantic search:\n\
             {semantic}",
            query = self.original_query,
            sql = generated_sql,
            structured = self.structured_section,
            semantic = self.semantic_section,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(status: QueryStatus, result_text: &str) -> QueryAttempt {
        QueryAttempt {
            question: "q".into(),
            generated_sql: "SELECT 1".into(),
            result_text: result_text.into(),
            status,
        }
    }

    #[test]
    fn success_passes_result_through() {
        let fused = fuse_context(
            "What does APP001_READ grant?",
            &attempt(QueryStatus::Success, r#"[["APP001_READ","view data"]]"#),
            &[],
        );
        assert!(fused.structured_section.contains("view data"));
        assert_eq!(fused.semantic_section, SEMANTIC_EMPTY_PLACEHOLDER);
    }

    #[test]
    fn empty_and_error_and_skipped_are_normalized() {
        for (status, placeholder) in [
            (QueryStatus::Empty, STRUCTURED_EMPTY_PLACEHOLDER),
            (QueryStatus::Error, STRUCTURED_ERROR_PLACEHOLDER),
            (QueryStatus::NotAttempted, STRUCTURED_NOT_ATTEMPTED_PLACEHOLDER),
        ] {
            let fused = fuse_context("q", &attempt(status, "raw detail that must not leak"), &[]);
            assert_eq!(fused.structured_section, placeholder);
        }
    }

    #[test]
    fn semantic_matches_become_bullets() {
        let matches = vec![SemanticMatch {
            code: "APP001_READ".into(),
            description: "view data".into(),
            score: 0.9,
            rank: 1,
        }];
        let fused = fuse_context("q", &attempt(QueryStatus::Empty, ""), &matches);
        assert!(fused.semantic_section.contains("- Code APP001_READ: view data"));
    }

    #[test]
    fn oversized_result_is_bounded() {
        let huge = "x".repeat(20_000);
        let fused = fuse_context("q", &attempt(QueryStatus::Success, &huge), &[]);
        assert!(fused.structured_section.chars().count() <= 4003);
    }

    #[test]
    fn render_includes_query_and_both_sections() {
        let fused = fuse_context(
            "What does APP001_READ grant?",
            &attempt(QueryStatus::Success, "data"),
            &[],
        );
        let rendered = fused.render("SELECT 1");
        assert!(rendered.contains("What does APP001_READ grant?"));
        assert!(rendered.contains("SELECT 1"));
        assert!(rendered.contains("data"));
        assert!(rendered.contains(SEMANTIC_EMPTY_PLACEHOLDER));
    }
}
