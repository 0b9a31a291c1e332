pub mod embedder;
pub mod vectordb;

pub use embedder::{EmbedMode, EmbeddingModel, OllamaEmbedder};
pub use vectordb::{build_entitlement_index, SqliteVectorIndex};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector search failed: {0}")]
    VectorDb(String),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}
