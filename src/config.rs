use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Grantly";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    "grantly=info,tower_http=warn".to_string()
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {name}")]
    MissingVar { name: &'static str },

    #[error("Invalid value for {name}: {value}")]
    InvalidVar { name: &'static str, value: String },
}

/// Process configuration, resolved once at startup. A missing model name
/// or unparseable value is fatal here — the pipeline never starts
/// half-configured and then fails mid-request.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the Ollama instance serving both generation and embeddings.
    pub ollama_base_url: String,
    /// Chat model used for SQL generation and answer synthesis.
    pub generation_model: String,
    /// Embedding model used for the semantic index.
    pub embedding_model: String,
    /// Path of the SQLite knowledge base (structured store + vector index).
    pub database_path: PathBuf,
    /// Top-N semantic matches requested per query.
    pub semantic_top_n: usize,
    /// Advisory row cap embedded in the SQL-generation prompt.
    pub sql_row_cap: usize,
    /// Idle minutes before a conversation session is evicted.
    pub session_ttl_minutes: i64,
    /// Seconds before an LLM call is abandoned and treated as a failure.
    pub llm_timeout_secs: u64,
    /// Listen address for the HTTP surface.
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            ollama_base_url: var_or("GRANTLY_OLLAMA_URL", "http://localhost:11434"),
            generation_model: required_var("GRANTLY_GENERATION_MODEL")?,
            embedding_model: required_var("GRANTLY_EMBEDDING_MODEL")?,
            database_path: PathBuf::from(var_or("GRANTLY_DB_PATH", "grantly.db")),
            semantic_top_n: parsed_var("GRANTLY_SEMANTIC_TOP_N", 5)?,
            sql_row_cap: parsed_var("GRANTLY_SQL_ROW_CAP", 5)?,
            session_ttl_minutes: parsed_var("GRANTLY_SESSION_TTL_MINUTES", 60)?,
            llm_timeout_secs: parsed_var("GRANTLY_LLM_TIMEOUT_SECS", 120)?,
            bind_addr: var_or("GRANTLY_BIND_ADDR", "127.0.0.1:8080"),
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar { name }),
    }
}

fn parsed_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidVar { name, value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; keep them in one test so they
    // cannot race each other under the parallel test runner.
    #[test]
    fn from_env_requires_model_names() {
        std::env::remove_var("GRANTLY_GENERATION_MODEL");
        std::env::remove_var("GRANTLY_EMBEDDING_MODEL");

        let err = AppConfig::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingVar {
                name: "GRANTLY_GENERATION_MODEL"
            }
        ));

        std::env::set_var("GRANTLY_GENERATION_MODEL", "llama3.1:8b");
        std::env::set_var("GRANTLY_EMBEDDING_MODEL", "nomic-embed-text");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.generation_model, "llama3.1:8b");
        assert_eq!(config.semantic_top_n, 5);
        assert_eq!(config.bind_addr, "127.0.0.1:8080");

        std::env::set_var("GRANTLY_SEMANTIC_TOP_N", "not-a-number");
        let err = AppConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar { .. }));
        std::env::remove_var("GRANTLY_SEMANTIC_TOP_N");

        std::env::remove_var("GRANTLY_GENERATION_MODEL");
        std::env::remove_var("GRANTLY_EMBEDDING_MODEL");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
