pub mod config;
pub mod db;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod store;

use tracing_subscriber::EnvFilter;

/// Initialize tracing from RUST_LOG, falling back to the app default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}
