//! Vector index selection.
//!
//! [`VectorIndex`] is either the SQLite-backed [`SqliteIndex`] or the
//! in-memory [`MemoryStore`]. The backend is chosen once, when the index is
//! built for a document set; a SQLite failure at build time falls back to
//! memory, and nothing switches backends afterwards.

pub mod sqlite;

use anyhow::Result;
use tracing::{error, info, warn};

use smartdoc_core::models::{Chunk, ScoredChunk};
use smartdoc_core::store::memory::MemoryStore;
use smartdoc_core::store::VectorStore;

pub use sqlite::SqliteIndex;

use crate::config::IndexConfig;
use crate::error::Error;

pub enum VectorIndex {
    Sqlite(SqliteIndex),
    Memory(MemoryStore),
}

impl VectorIndex {
    /// Build an index over `chunks`, which `vectors` embed one-to-one.
    ///
    /// `backend = "memory"` skips SQLite. Otherwise SQLite is tried first
    /// and any failure is logged and recovered with the in-memory store. The
    /// returned error only reports inputs the fallback rejects too (a
    /// chunk/vector mismatch).
    pub async fn build(config: &IndexConfig, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<Self> {
        if config.backend != "memory" {
            match Self::build_sqlite(config, chunks, vectors).await {
                Ok(index) => {
                    info!(backend = "sqlite", entries = chunks.len(), "vector index built");
                    return Ok(index);
                }
                Err(e) if config.backend == "sqlite" => {
                    error!(error = %e, "configured sqlite index failed, using in-memory index")
                }
                Err(e) => warn!(error = %e, "sqlite index unavailable, using in-memory index"),
            }
        }

        let store = MemoryStore::new();
        store.insert_batch(chunks, vectors).await?;
        info!(backend = "memory", entries = chunks.len(), "vector index built");
        Ok(VectorIndex::Memory(store))
    }

    async fn build_sqlite(
        config: &IndexConfig,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<Self, Error> {
        let failure = |e: anyhow::Error| Error::IndexBuildFailure {
            backend: "sqlite",
            cause: format!("{:#}", e),
        };
        let index = SqliteIndex::open(config).await.map_err(failure)?;
        if let Err(e) = index.insert_batch(chunks, vectors).await {
            index.close().await;
            return Err(failure(e));
        }
        Ok(VectorIndex::Sqlite(index))
    }

    fn store(&self) -> &dyn VectorStore {
        match self {
            VectorIndex::Sqlite(index) => index as &dyn VectorStore,
            VectorIndex::Memory(store) => store as &dyn VectorStore,
        }
    }

    pub fn backend(&self) -> &'static str {
        self.store().backend()
    }

    /// Up to `k` entries, best first, after applying `score_threshold`.
    pub async fn search(
        &self,
        query_vec: &[f32],
        k: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredChunk>> {
        self.store().search(query_vec, k, score_threshold).await
    }

    pub async fn len(&self) -> Result<usize> {
        self.store().len().await
    }

    /// Release backend resources. The index must not be used afterwards.
    pub async fn close(&self) {
        if let VectorIndex::Sqlite(index) = self {
            index.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartdoc_core::models::{DocumentKind, DocumentMetadata};
    use tempfile::TempDir;

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk {
                id: format!("c{}", i),
                content: format!("chunk {}", i),
                metadata: DocumentMetadata::new("m.txt", DocumentKind::Manual),
                chunk_index: i,
                hash: String::new(),
            })
            .collect()
    }

    fn vectors(n: usize) -> Vec<Vec<f32>> {
        (0..n).map(|i| vec![1.0, i as f32]).collect()
    }

    #[tokio::test]
    async fn test_auto_prefers_sqlite() {
        let index = VectorIndex::build(&IndexConfig::default(), &chunks(3), &vectors(3))
            .await
            .unwrap();
        assert_eq!(index.backend(), "sqlite");
        assert_eq!(index.len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_memory_backend_skips_sqlite() {
        let config = IndexConfig {
            backend: "memory".to_string(),
            ..IndexConfig::default()
        };
        let index = VectorIndex::build(&config, &chunks(2), &vectors(2)).await.unwrap();
        assert_eq!(index.backend(), "memory");
    }

    #[tokio::test]
    async fn test_sqlite_failure_falls_back_to_memory() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("blocker"), b"file").unwrap();
        for backend in ["auto", "sqlite"] {
            let config = IndexConfig {
                backend: backend.to_string(),
                path: Some(tmp.path().join("blocker/index.sqlite")),
                ..IndexConfig::default()
            };
            let index = VectorIndex::build(&config, &chunks(4), &vectors(4)).await.unwrap();
            assert_eq!(index.backend(), "memory");
            let hits = index.search(&[1.0, 0.0], 2, None).await.unwrap();
            assert_eq!(hits.len(), 2);
        }
    }

    #[tokio::test]
    async fn test_threshold_applies_on_both_backends() {
        for backend in ["sqlite", "memory"] {
            let config = IndexConfig {
                backend: backend.to_string(),
                ..IndexConfig::default()
            };
            let index = VectorIndex::build(&config, &chunks(3), &vectors(3)).await.unwrap();
            // cosines against [1, 0]: 1.0, ~0.707, ~0.447
            let hits = index.search(&[1.0, 0.0], 10, Some(0.5)).await.unwrap();
            assert_eq!(hits.len(), 2, "backend {}", backend);
        }
    }
}
