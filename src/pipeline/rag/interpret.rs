use serde_json::Value;

/// Quality of a structured-query result string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Data,
    Empty,
    Error,
}

/// Phrases that mean "the query ran but matched nothing".
const NO_RESULT_PHRASES: &[&str] = &[
    "no results found",
    "no matching records",
    "no records found",
    "no rows returned",
    "query returned no results",
];

/// Phrases that mean "the query itself failed". Substring matching here
/// is knowingly brittle: a data value containing one of these phrases
/// would be misclassified. Preserved as-is; see the interpreter tests.
const ERROR_PHRASES: &[&str] = &[
    "error executing",
    "failed to execute",
    "execution failed",
    "syntax error",
    "operationalerror",
];

/// Classify a result string as Data / Empty / Error.
///
/// Rules apply in order: no-result phrases, then empty literals, then
/// empty parsed JSON, then error phrases, otherwise Data.
pub fn classify_result(text: &str) -> ResultKind {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();

    if NO_RESULT_PHRASES.iter().any(|p| lower.contains(p)) {
        return ResultKind::Empty;
    }

    if trimmed == "[]" || trimmed == "{}" || lower == "none" || trimmed.is_empty() {
        return ResultKind::Empty;
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let is_empty = match &value {
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if is_empty {
            return ResultKind::Empty;
        }
    }

    if ERROR_PHRASES.iter().any(|p| lower.contains(p)) {
        return ResultKind::Error;
    }

    ResultKind::Data
}
