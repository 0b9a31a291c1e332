use regex::Regex;
use std::sync::OnceLock;

use super::interpret::{classify_result, ResultKind};
use super::types::{QueryAttempt, QueryStatus};
use crate::llm::{ChatMessage, LlmClient};
use crate::models::ConversationTurn;
use crate::store::StructuredStore;

const SQL_SYSTEM_PROMPT: &str = "You translate questions about access entitlements into a single \
SQLite SELECT statement. Return ONLY the raw SQL query with no formatting, no markdown, no code \
blocks, and no extra text. If the question cannot be answered with a query over the listed \
tables, reply exactly: no query needed.";

/// Drives one LLM round to generate a SQL query, executes it against the
/// structured store, and classifies the outcome into a typed
/// `QueryAttempt`. Nothing raises past `run`.
pub struct StructuredQueryAgent<'a, L: LlmClient, S: StructuredStore> {
    llm: &'a L,
    store: &'a S,
    row_cap: usize,
}

impl<'a, L: LlmClient, S: StructuredStore> StructuredQueryAgent<'a, L, S> {
    pub fn new(llm: &'a L, store: &'a S, row_cap: usize) -> Self {
        Self {
            llm,
            store,
            row_cap,
        }
    }

    pub fn run(&self, question: &str, entity_hint: Option<&str>) -> QueryAttempt {
        let prompt = self.build_generation_prompt(question, entity_hint);
        let messages = [ChatMessage::system(SQL_SYSTEM_PROMPT), ChatMessage::user(prompt)];

        let raw = match self.llm.chat(&messages) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "SQL generation call failed");
                return QueryAttempt::error(question, "not stated", &e.to_string());
            }
        };

        let sql = clean_sql_query(&raw);

        if is_refusal(&sql) {
            tracing::debug!(reply = %sql, "Model declined to generate SQL");
            return QueryAttempt::not_attempted(question, &sql);
        }

        match self.store.execute_query(&sql) {
            Ok(result_text) => {
                let status = match classify_result(&result_text) {
                    ResultKind::Data => QueryStatus::Success,
                    ResultKind::Empty => QueryStatus::Empty,
                    ResultKind::Error => QueryStatus::Error,
                };
                QueryAttempt {
                    question: question.to_string(),
                    generated_sql: sql,
                    result_text,
                    status,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, sql = %sql, "SQL execution failed");
                QueryAttempt::error(question, &sql, &e.to_string())
            }
        }
    }

    fn build_generation_prompt(&self, question: &str, entity_hint: Option<&str>) -> String {
        let schema = self.store.describe_schema();
        let tables = self.store.allowed_tables().join(", ");

        let mut prompt = format!(
            "Based on the table schema below, write a SQL query that answers the user's \
             question.\n\
             Limit the number of results to {top_k} if you are selecting many rows or if the \
             question implies a list.\n\
             Only ask for the specific columns needed to answer the question.\n\
             Pay attention to the question to extract entities like role names, project names, \
             or application names.\n\
             Only use these tables: {tables}. Do not invent table or column names.\n\
             Never select columns that identify individual people; answer in terms of \
             entitlements, roles, applications, and projects.\n\n\
             Schema:\n{schema}\n",
            top_k = self.row_cap,
        );

        if let Some(hint) = entity_hint {
            prompt.push_str(&format!(
                "\nThe conversation recently mentioned: {hint}. Resolve references like \
                 \"it\" or \"that app\" against this.\n"
            ));
        }

        prompt.push_str(&format!("\nQuestion: {question}\n\nSQL Query:"));
        prompt
    }
}

/// Strip markdown code fences and surrounding whitespace from a
/// generated query before it is executed directly.
pub fn clean_sql_query(raw: &str) -> String {
    static OPEN_FENCE: OnceLock<Regex> = OnceLock::new();
    static CLOSE_FENCE: OnceLock<Regex> = OnceLock::new();

    let open = OPEN_FENCE.get_or_init(|| Regex::new(r"^```\s*(?i:sql)?\s*").unwrap());
    let close = CLOSE_FENCE.get_or_init(|| Regex::new(r"```\s*$").unwrap());

    let trimmed = raw.trim();
    let without_open = open.replace(trimmed, "");
    let without_close = close.replace(&without_open, "");
    without_close.trim().to_string()
}

/// Did the model decline (or fail) to produce a usable SELECT?
pub fn is_refusal(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.is_empty()
        || lower.contains("no query needed")
        || lower.contains("no sql query is needed")
        || lower.contains("i don't need to query")
        || !lower.contains("select")
        || text.len() < 10
}

/// Parse a free-text agent transcript using the two-marker convention
/// ("Query: ..." / "Result: ..."). Tolerates a missing Query marker, a
/// missing Result marker, and empty segments; with no markers at all the
/// whole text becomes the result and the query is "not stated".
pub fn parse_agent_transcript(text: &str) -> (String, String) {
    let query_pos = find_marker(text, "query:");
    let result_pos = find_marker(text, "result:");

    match (query_pos, result_pos) {
        (Some(q), Some(r)) if q <= r => {
            let query = text[q + "query:".len()..r].trim().to_string();
            let result = text[r + "result:".len()..].trim().to_string();
            (or_not_stated(query), result)
        }
        (Some(q), None) => {
            let query = text[q + "query:".len()..].trim().to_string();
            (or_not_stated(query), String::new())
        }
        (None, Some(r)) => {
            let result = text[r + "result:".len()..].trim().to_string();
            ("not stated".to_string(), result)
        }
        _ => ("not stated".to_string(), text.trim().to_string()),
    }
}

fn find_marker(text: &str, marker: &str) -> Option<usize> {
    // ASCII lowercasing preserves byte offsets into the original text.
    text.to_ascii_lowercase().find(marker)
}

fn or_not_stated(query: String) -> String {
    if query.is_empty() {
        "not stated".to_string()
    } else {
        query
    }
}

/// Scan prior turns, newest first, for a capitalized phrase ending in a
/// domain suffix word ("Payments Portal", "HR System"). Used to resolve
/// follow-up references like "who needs access to it?".
pub fn recent_entity_hint(turns: &[ConversationTurn]) -> Option<String> {
    static ENTITY_RE: OnceLock<Regex> = OnceLock::new();
    let re = ENTITY_RE.get_or_init(|| {
        Regex::new(
            r"([A-Z][A-Za-z0-9]*(?:\s+[A-Z][A-Za-z0-9]*)*\s+(?:Portal|System|Platform|Suite|Console|Dashboard|Tool|Service))",
        )
        .unwrap()
    });

    for turn in turns.iter().rev() {
        for text in [&turn.input, &turn.output] {
            if let Some(last) = re.find_iter(text).last() {
                return Some(last.as_str().to_string());
            }
        }
    }
    None
}
