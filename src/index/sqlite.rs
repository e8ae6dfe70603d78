//! SQLite-backed primary vector index.
//!
//! One table holds every entry of the current document set; embeddings are
//! little-endian f32 BLOBs. Search is an exact scan computing cosine
//! similarity in Rust over all stored vectors. A build replaces any previous
//! contents of the table.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use smartdoc_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use smartdoc_core::models::{Chunk, DocumentMetadata, ScoredChunk};
use smartdoc_core::store::{finalize_hits, validate_batch, VectorStore};

use crate::config::IndexConfig;
use crate::db;

const SCHEMA: &str = r#"
DROP TABLE IF EXISTS chunk_vectors;
CREATE TABLE chunk_vectors (
    position      INTEGER PRIMARY KEY,
    id            TEXT NOT NULL,
    content       TEXT NOT NULL,
    metadata_json TEXT NOT NULL,
    chunk_index   INTEGER NOT NULL,
    hash          TEXT NOT NULL,
    dims          INTEGER NOT NULL,
    embedding     BLOB NOT NULL
);
"#;

pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    /// Connect and (re)create the table.
    pub async fn open(config: &IndexConfig) -> Result<Self> {
        let pool = db::connect(config).await?;
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .context("Failed to create chunk_vectors table")?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorStore for SqliteIndex {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn insert_batch(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        validate_batch(chunks, vectors)?;

        let mut tx = self.pool.begin().await?;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let metadata_json = serde_json::to_string(&chunk.metadata)?;
            sqlx::query(
                "INSERT INTO chunk_vectors (id, content, metadata_json, chunk_index, hash, dims, embedding)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.content)
            .bind(&metadata_json)
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.hash)
            .bind(vector.len() as i64)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert chunk {}", chunk.id))?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn search(
        &self,
        query_vec: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredChunk>> {
        let rows = sqlx::query(
            "SELECT id, content, metadata_json, chunk_index, hash, embedding
             FROM chunk_vectors ORDER BY position",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let metadata_json: String = row.get("metadata_json");
            let metadata: DocumentMetadata = serde_json::from_str(&metadata_json)
                .context("Corrupt chunk metadata in index")?;
            let chunk_index: i64 = row.get("chunk_index");
            let chunk = Chunk {
                id: row.get("id"),
                content: row.get("content"),
                metadata,
                chunk_index: chunk_index as usize,
                hash: row.get("hash"),
            };
            let score = cosine_similarity(query_vec, &blob_to_vec(&blob));
            hits.push(ScoredChunk::new(chunk, score));
        }

        Ok(finalize_hits(hits, limit, score_threshold))
    }

    async fn len(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartdoc_core::models::DocumentKind;
    use tempfile::TempDir;

    fn chunk(id: &str, page: u32) -> Chunk {
        Chunk {
            id: id.to_string(),
            content: format!("content of {}", id),
            metadata: DocumentMetadata::new("report.pdf", DocumentKind::Pdf).with_page(page),
            chunk_index: 0,
            hash: format!("hash-{}", id),
        }
    }

    #[tokio::test]
    async fn test_in_memory_roundtrip_preserves_chunks() {
        let index = SqliteIndex::open(&IndexConfig::default()).await.unwrap();
        index
            .insert_batch(
                &[chunk("a", 1), chunk("b", 2)],
                &[vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .await
            .unwrap();
        assert_eq!(index.len().await.unwrap(), 2);

        let hits = index.search(&[0.0, 1.0], 5, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk, chunk("b", 2));
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].score, 0.0);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let index = SqliteIndex::open(&IndexConfig::default()).await.unwrap();
        index
            .insert_batch(
                &[chunk("first", 1), chunk("second", 1), chunk("third", 1)],
                &[vec![1.0, 1.0], vec![2.0, 2.0], vec![3.0, 3.0]],
            )
            .await
            .unwrap();
        let hits = index.search(&[1.0, 1.0], 3, None).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_file_index_is_rebuilt_on_open() {
        let tmp = TempDir::new().unwrap();
        let config = IndexConfig {
            path: Some(tmp.path().join("nested/index.sqlite")),
            ..IndexConfig::default()
        };

        let first = SqliteIndex::open(&config).await.unwrap();
        first
            .insert_batch(&[chunk("old", 1)], &[vec![1.0]])
            .await
            .unwrap();
        first.close().await;

        let second = SqliteIndex::open(&config).await.unwrap();
        assert!(second.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_unwritable_path_fails_to_open() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("blocker"), b"file").unwrap();
        let config = IndexConfig {
            path: Some(tmp.path().join("blocker/index.sqlite")),
            ..IndexConfig::default()
        };
        assert!(SqliteIndex::open(&config).await.is_err());
    }
}
