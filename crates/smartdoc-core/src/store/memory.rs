//! In-memory [`VectorStore`] used as the fallback index.
//!
//! Entries live in a `Vec` behind `std::sync::RwLock`. Search is a linear
//! scan computing cosine similarity against every stored vector, so it needs
//! no storage engine and cannot fail for environmental reasons.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, ScoredChunk};

use super::{finalize_hits, validate_batch, VectorStore};

struct StoredVector {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Linear-scan cosine-similarity store.
pub struct MemoryStore {
    entries: RwLock<Vec<StoredVector>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert_batch(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        validate_batch(chunks, vectors)?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        entries.extend(
            chunks
                .iter()
                .zip(vectors.iter())
                .map(|(chunk, vector)| StoredVector {
                    chunk: chunk.clone(),
                    vector: vector.clone(),
                }),
        );
        Ok(())
    }

    async fn search(
        &self,
        query_vec: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredChunk>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        let hits: Vec<ScoredChunk> = entries
            .iter()
            .map(|sv| ScoredChunk::new(sv.chunk.clone(), cosine_similarity(query_vec, &sv.vector)))
            .collect();
        Ok(finalize_hits(hits, limit, score_threshold))
    }

    async fn len(&self) -> Result<usize> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentKind, DocumentMetadata};

    fn chunk(content: &str) -> Chunk {
        Chunk {
            id: content.to_string(),
            content: content.to_string(),
            metadata: DocumentMetadata::new("m.txt", DocumentKind::Manual),
            chunk_index: 0,
            hash: String::new(),
        }
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_batch(
                &[chunk("east"), chunk("north"), chunk("northeast"), chunk("zero")],
                &[
                    vec![1.0, 0.0],
                    vec![0.0, 1.0],
                    vec![0.7, 0.7],
                    vec![0.0, 0.0],
                ],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let store = seeded_store().await;
        let hits = store.search(&[1.0, 0.1], 10, None).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["east", "northeast", "north", "zero"]);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let store = seeded_store().await;
        let hits = store.search(&[0.0, 1.0], 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.id, "north");
    }

    #[tokio::test]
    async fn test_zero_vector_scores_zero() {
        let store = seeded_store().await;
        let hits = store.search(&[1.0, 0.0], 10, None).await.unwrap();
        let zero = hits.iter().find(|h| h.chunk.id == "zero").unwrap();
        assert_eq!(zero.score, 0.0);
    }

    #[tokio::test]
    async fn test_threshold_filters() {
        let store = seeded_store().await;
        let hits = store.search(&[1.0, 0.0], 10, Some(0.5)).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["east", "northeast"]);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty().await.unwrap());
        assert!(store.search(&[1.0], 5, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_mismatched_batch() {
        let store = MemoryStore::new();
        let err = store.insert_batch(&[chunk("a")], &[]).await;
        assert!(err.is_err());
        assert_eq!(store.len().await.unwrap(), 0);
    }
}
