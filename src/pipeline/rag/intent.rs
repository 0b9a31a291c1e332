use regex::Regex;
use std::sync::OnceLock;

use super::types::Intent;

/// Tokens that mark small talk.
const GREETING_WORDS: &[&str] = &[
    "hi", "hello", "hey", "greetings", "howdy", "morning", "afternoon", "evening", "thanks",
    "thank",
];

/// Tokens that mark a real entitlement question. Any hit forces the
/// informational branch regardless of greeting words.
const DOMAIN_WORDS: &[&str] = &[
    "entitlement",
    "entitlements",
    "access",
    "permission",
    "permissions",
    "grant",
    "grants",
    "role",
    "roles",
    "application",
    "applications",
    "app",
    "project",
    "projects",
    "employee",
    "employees",
    "code",
    "codes",
    "holds",
    "holding",
    "holdings",
];

/// Above this many tokens the input is treated as a real question even
/// if it opens with a greeting.
const MAX_GREETING_TOKENS: usize = 8;

/// Classify a raw query as small talk or an informational question.
///
/// Greeting iff a greeting token is present, no domain token is present,
/// and the input is short. Pure and idempotent — identical input always
/// yields the identical classification.
pub fn classify_intent(text: &str) -> Intent {
    let tokens = normalize(text);

    let has_greeting = tokens.iter().any(|t| GREETING_WORDS.contains(&t.as_str()));
    let has_domain = tokens.iter().any(|t| DOMAIN_WORDS.contains(&t.as_str()));

    if has_greeting && !has_domain && tokens.len() < MAX_GREETING_TOKENS {
        Intent::Greeting {
            name: extract_user_name(text),
        }
    } else {
        Intent::Informational
    }
}

/// Lowercased tokens with punctuation stripped.
fn normalize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

/// Extract a self-introduced name ("I am / I'm / my name is <word>").
/// Used only to personalize greeting replies.
pub fn extract_user_name(text: &str) -> Option<String> {
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    let re = NAME_RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:i am|i'm|my name is)\s+([A-Za-z][A-Za-z'-]*)").unwrap()
    });

    re.captures(text).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_greetings_are_greetings() {
        for text in ["Hello", "hi there!", "Hey, good morning", "Thanks!"] {
            assert_eq!(
                classify_intent(text),
                Intent::Greeting { name: None },
                "{text}"
            );
        }
    }

    #[test]
    fn domain_keyword_forces_informational() {
        assert_eq!(
            classify_intent("Hi, what entitlements does the QA role need?"),
            Intent::Informational
        );
        assert_eq!(classify_intent("hello access"), Intent::Informational);
    }

    #[test]
    fn long_input_is_informational_even_with_greeting() {
        let text = "Hey there I was wondering if you could possibly tell me something useful today";
        assert_eq!(classify_intent(text), Intent::Informational);
    }

    #[test]
    fn questions_without_greeting_words_are_informational() {
        assert_eq!(
            classify_intent("What does APP001_READ grant?"),
            Intent::Informational
        );
    }

    #[test]
    fn classification_is_idempotent() {
        let text = "Hello, I'm Priya";
        assert_eq!(classify_intent(text), classify_intent(text));
    }

    #[test]
    fn name_extraction_variants() {
        assert_eq!(
            classify_intent("Hi, my name is Priya"),
            Intent::Greeting {
                name: Some("Priya".into())
            }
        );
        assert_eq!(extract_user_name("hello I'm Marcus"), Some("Marcus".into()));
        assert_eq!(extract_user_name("I am O'Brien"), Some("O'Brien".into()));
        assert_eq!(extract_user_name("good morning"), None);
    }

    #[test]
    fn punctuation_is_stripped_before_matching() {
        assert_eq!(
            classify_intent("Hello!!!"),
            Intent::Greeting { name: None }
        );
    }
}
