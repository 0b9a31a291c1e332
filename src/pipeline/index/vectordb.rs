use std::sync::Mutex;

use rusqlite::{params, Connection};

use super::embedder::{EmbedMode, EmbeddingModel};
use super::IndexError;
use crate::db::repository;
use crate::pipeline::rag::types::{SemanticMatch, VectorIndex};

/// SQLite-backed vector index over entitlement descriptions.
///
/// Embeddings live in the `entitlement_vectors` table as little-endian
/// f32 BLOBs. The corpus is small (one row per entitlement), so search
/// loads all rows and ranks by cosine similarity in process.
pub struct SqliteVectorIndex {
    conn: Mutex<Connection>,
}

impl SqliteVectorIndex {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl VectorIndex for SqliteVectorIndex {
    fn search(&self, embedding: &[f32], top_n: usize) -> Result<Vec<SemanticMatch>, IndexError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| IndexError::VectorDb("lock poisoned".into()))?;

        let mut stmt = conn
            .prepare("SELECT code, description, embedding FROM entitlement_vectors")
            .map_err(|e| IndexError::VectorDb(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })
            .map_err(|e| IndexError::VectorDb(e.to_string()))?;

        let mut scored: Vec<(f32, String, String)> = Vec::new();
        for row in rows {
            let (code, description, blob) = row.map_err(|e| IndexError::VectorDb(e.to_string()))?;
            let stored = decode_embedding(&blob);
            let score = cosine_similarity(embedding, &stored);
            scored.push((score, code, description));
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(top_n)
            .enumerate()
            .map(|(rank, (score, code, description))| SemanticMatch {
                code,
                description,
                score,
                rank: rank + 1,
            })
            .collect())
    }

    fn index_entitlement(
        &self,
        code: &str,
        description: &str,
        embedding: &[f32],
    ) -> Result<(), IndexError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| IndexError::VectorDb("lock poisoned".into()))?;

        conn.execute(
            "INSERT OR REPLACE INTO entitlement_vectors (code, description, embedding, dimension)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                code,
                description,
                encode_embedding(embedding),
                embedding.len() as i64
            ],
        )
        .map_err(|e| IndexError::VectorDb(e.to_string()))?;
        Ok(())
    }

    fn count(&self) -> Result<usize, IndexError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| IndexError::VectorDb("lock poisoned".into()))?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM entitlement_vectors", [], |row| {
                row.get(0)
            })
            .map_err(|e| IndexError::VectorDb(e.to_string()))?;
        Ok(count as usize)
    }
}

/// Embed every entitlement description and upsert it into the index.
/// Maintenance operation, run at startup when the index is empty or
/// after the knowledge base is reloaded. Returns the number indexed.
pub fn build_entitlement_index(
    conn: &Connection,
    embedder: &dyn EmbeddingModel,
    index: &dyn VectorIndex,
) -> Result<usize, IndexError> {
    let entitlements = repository::list_entitlements(conn)?;
    let mut indexed = 0;

    for ent in &entitlements {
        let embedding = embedder.embed(&ent.description, EmbedMode::Document)?;
        index.index_entitlement(&ent.code, &ent.description, &embedding)?;
        indexed += 1;
    }

    tracing::info!(indexed, "Entitlement vector index built");
    Ok(indexed)
}

pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

pub fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn embedding_round_trip() {
        let embedding = vec![0.25_f32, -1.5, 3.75];
        let decoded = decode_embedding(&encode_embedding(&embedding));
        assert_eq!(decoded, embedding);
    }

    #[test]
    fn cosine_similarity_identical_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.01);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 0.01);
    }

    #[test]
    fn search_ranks_by_similarity() {
        let conn = open_memory_database().unwrap();
        let index = SqliteVectorIndex::new(conn);

        index
            .index_entitlement("APP001_READ", "view data", &[1.0, 0.0, 0.0])
            .unwrap();
        index
            .index_entitlement("APP002_ADMIN", "administer things", &[0.0, 1.0, 0.0])
            .unwrap();
        index
            .index_entitlement("APP003_WRITE", "modify data", &[0.9, 0.1, 0.0])
            .unwrap();

        let matches = index.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].code, "APP001_READ");
        assert_eq!(matches[0].rank, 1);
        assert_eq!(matches[1].code, "APP003_WRITE");
        assert_eq!(matches[1].rank, 2);
    }

    #[test]
    fn reindex_replaces_existing_row() {
        let conn = open_memory_database().unwrap();
        let index = SqliteVectorIndex::new(conn);

        index
            .index_entitlement("APP001_READ", "old", &[1.0, 0.0])
            .unwrap();
        index
            .index_entitlement("APP001_READ", "new", &[0.0, 1.0])
            .unwrap();

        assert_eq!(index.count().unwrap(), 1);
        let matches = index.search(&[0.0, 1.0], 1).unwrap();
        assert_eq!(matches[0].description, "new");
    }

    #[test]
    fn build_index_embeds_all_entitlements() {
        use crate::models::Entitlement;

        struct FixedEmbedder;
        impl EmbeddingModel for FixedEmbedder {
            fn embed(&self, text: &str, _mode: EmbedMode) -> Result<Vec<f32>, IndexError> {
                Ok(vec![text.len() as f32, 1.0])
            }
            fn dimension(&self) -> usize {
                2
            }
        }

        let conn = open_memory_database().unwrap();
        for (id, code) in [(1, "APP001_READ"), (2, "APP001_WRITE")] {
            repository::insert_entitlement(
                &conn,
                &Entitlement {
                    id,
                    code: code.into(),
                    description: format!("description for {code}"),
                },
            )
            .unwrap();
        }

        let index_conn = open_memory_database().unwrap();
        let index = SqliteVectorIndex::new(index_conn);
        let indexed = build_entitlement_index(&conn, &FixedEmbedder, &index).unwrap();

        assert_eq!(indexed, 2);
        assert_eq!(index.count().unwrap(), 2);
    }
}
