use super::types::FusedContext;
use crate::llm::ChatMessage;
use crate::models::ConversationTurn;

pub const ANSWER_SYSTEM_PROMPT: &str = "You are a specialized Entitlement Assistant. Answer the \
user's questions about application entitlements based solely on the information in the Context \
section. The context contains a database query result and semantic-search matches; review both. \
If the database section reports an error, no data, or that no query was executed, say so \
plainly. If the semantic section reports no matches, acknowledge that. Synthesize one answer \
from whatever information is present, and state clearly when the combined context is not enough \
to answer. Never invent information outside the context. Never restate personal identifiers \
such as employee names or email addresses, even if they appear in the context; answer in terms \
of entitlements, roles, applications, and projects, never about specific people. When a \
specific entitlement code appears (e.g. APP001_READ), mention it. Keep a helpful, professional \
tone.";

pub const GREETING_SYSTEM_PROMPT: &str = "You are a friendly Entitlement Assistant. The user is \
greeting you or making small talk. Reply warmly in one or two sentences, introduce what you can \
help with (questions about access entitlements, roles, applications, and projects), and invite \
a question. Do not invent any entitlement information.";

/// Fixed reply when answer generation fails for any reason.
pub const FALLBACK_APOLOGY: &str = "I'm sorry — I ran into a problem while putting together an \
answer. Please try again in a moment.";

/// Build the full informational message sequence: system policy, the
/// prior turns in order, then the fused context + question.
pub fn build_answer_messages(
    history: &[ConversationTurn],
    fused: &FusedContext,
    generated_sql: &str,
    question: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(ChatMessage::system(ANSWER_SYSTEM_PROMPT));

    for turn in history {
        messages.push(ChatMessage::user(turn.input.clone()));
        messages.push(ChatMessage::assistant(turn.output.clone()));
    }

    messages.push(ChatMessage::user(format!(
        "Context:\n{context}\n\nUser's question: {question}\n\nAssistant's answer:",
        context = fused.render(generated_sql),
    )));

    messages
}

/// Greeting-lite sequence: persona prompt only, no retrieval context.
pub fn build_greeting_messages(raw_text: &str, name: Option<&str>) -> Vec<ChatMessage> {
    let user_content = match name {
        Some(name) => format!("{raw_text}\n\n(The user introduced themselves as {name}.)"),
        None => raw_text.to_string(),
    };

    vec![
        ChatMessage::system(GREETING_SYSTEM_PROMPT),
        ChatMessage::user(user_content),
    ]
}

/// Canned greeting used when even the lightweight greeting call fails.
pub fn fallback_greeting(name: Option<&str>) -> String {
    match name {
        Some(name) => format!(
            "Hello {name}! I can help with questions about access entitlements, roles, \
             applications, and projects. What would you like to know?"
        ),
        None => "Hello! I can help with questions about access entitlements, roles, \
                 applications, and projects. What would you like to know?"
            .to_string(),
    }
}
