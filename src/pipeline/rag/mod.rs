pub mod fusion;
pub mod intent;
pub mod interpret;
pub mod memory;
pub mod orchestrator;
pub mod prompt;
pub mod retrieval;
pub mod sql_agent;
pub mod synthesize;
pub mod types;
