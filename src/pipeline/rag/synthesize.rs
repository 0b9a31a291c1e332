use super::prompt::{
    build_answer_messages, build_greeting_messages, fallback_greeting, FALLBACK_APOLOGY,
};
use super::types::FusedContext;
use crate::llm::LlmClient;
use crate::models::ConversationTurn;

/// Invoke the generation model once for a full informational answer.
///
/// This call must never raise past this boundary: any failure — quota,
/// timeout, model error, blank completion — becomes the fixed apology
/// string, and the caller always gets a non-empty reply.
pub fn synthesize_answer<L: LlmClient>(
    llm: &L,
    history: &[ConversationTurn],
    fused: &FusedContext,
    generated_sql: &str,
    question: &str,
) -> String {
    let messages = build_answer_messages(history, fused, generated_sql, question);

    match llm.chat(&messages) {
        Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
        Ok(_) => {
            tracing::warn!("Generation returned an empty completion; using apology fallback");
            FALLBACK_APOLOGY.to_string()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Answer generation failed; using apology fallback");
            FALLBACK_APOLOGY.to_string()
        }
    }
}

/// Lightweight greeting reply — persona prompt only, canned fallback.
pub fn synthesize_greeting<L: LlmClient>(llm: &L, raw_text: &str, name: Option<&str>) -> String {
    let messages = build_greeting_messages(raw_text, name);

    match llm.chat(&messages) {
        Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
        Ok(_) => fallback_greeting(name),
        Err(e) => {
            tracing::debug!(error = %e, "Greeting generation failed; using canned greeting");
            fallback_greeting(name)
        }
    }
}
