//! Vector storage abstraction.
//!
//! The [`VectorStore`] trait is the seam between the retrieval pipeline and
//! a concrete backend: the SQLite-backed primary index in the app crate, or
//! the in-memory [`memory::MemoryStore`] used as the fallback.
//!
//! Every backend holds `(embedding, chunk)` entries written in one bulk
//! [`insert_batch`](VectorStore::insert_batch) and answers nearest-neighbour
//! queries ranked by cosine similarity. Post-search filtering and ordering is
//! shared through [`finalize_hits`] so that all backends apply the score
//! threshold and tie-breaking identically.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, ScoredChunk};

/// Abstract vector store.
///
/// All operations are async (via `async-trait`) so database-backed stores
/// can run on the tokio runtime. In-memory implementations return
/// immediately-ready futures.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend label for logs and reports (e.g. `"sqlite"`).
    fn backend(&self) -> &'static str;

    /// Store one embedding per chunk. `chunks` and `vectors` are parallel.
    async fn insert_batch(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// Return up to `limit` entries, most similar first.
    ///
    /// Entries scoring below `score_threshold` (when set) are dropped.
    async fn search(
        &self,
        query_vec: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredChunk>>;

    /// Number of stored entries.
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

/// Apply the threshold, sort by descending score, and truncate to `limit`.
///
/// The sort is stable: equal scores keep insertion order.
pub fn finalize_hits(
    mut hits: Vec<ScoredChunk>,
    limit: usize,
    score_threshold: Option<f32>,
) -> Vec<ScoredChunk> {
    if let Some(threshold) = score_threshold {
        hits.retain(|h| h.score >= threshold);
    }
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(limit);
    hits
}

/// Check that `chunks` and `vectors` line up and share one dimensionality.
pub fn validate_batch(chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<Option<usize>> {
    if chunks.len() != vectors.len() {
        anyhow::bail!(
            "chunk/vector count mismatch: {} chunks, {} vectors",
            chunks.len(),
            vectors.len()
        );
    }
    let dims = vectors.first().map(|v| v.len());
    if let Some(d) = dims {
        if let Some(bad) = vectors.iter().position(|v| v.len() != d) {
            anyhow::bail!(
                "vector {} has {} dimensions, expected {}",
                bad,
                vectors[bad].len(),
                d
            );
        }
    }
    Ok(dims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentKind, DocumentMetadata};

    fn scored(content: &str, score: f32) -> ScoredChunk {
        ScoredChunk::new(
            Chunk {
                id: content.to_string(),
                content: content.to_string(),
                metadata: DocumentMetadata::new("t.txt", DocumentKind::Text),
                chunk_index: 0,
                hash: String::new(),
            },
            score,
        )
    }

    #[test]
    fn test_finalize_sorts_and_truncates() {
        let hits = vec![scored("a", 0.1), scored("b", 0.9), scored("c", 0.5)];
        let out = finalize_hits(hits, 2, None);
        let ids: Vec<_> = out.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_finalize_applies_threshold() {
        let hits = vec![scored("a", 0.1), scored("b", 0.9), scored("c", 0.5)];
        let out = finalize_hits(hits, 10, Some(0.5));
        let ids: Vec<_> = out.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_finalize_ties_keep_insertion_order() {
        let hits = vec![scored("first", 0.5), scored("second", 0.5)];
        let out = finalize_hits(hits, 10, None);
        assert_eq!(out[0].chunk.id, "first");
    }

    #[test]
    fn test_finalize_tolerates_nan_scores() {
        let hits = vec![
            scored("a", 0.2),
            scored("nan", f32::NAN),
            scored("b", 0.7),
            scored("c", 0.4),
        ];
        let out = finalize_hits(hits, 10, None);
        assert_eq!(out.len(), 4);
        let finite: Vec<_> = out
            .iter()
            .filter(|h| !h.score.is_nan())
            .map(|h| h.chunk.id.as_str())
            .collect();
        assert_eq!(finite, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_validate_batch_rejects_mismatch() {
        let chunks = vec![scored("a", 0.0).chunk];
        assert!(validate_batch(&chunks, &[]).is_err());
        assert!(validate_batch(&chunks, &[vec![1.0, 2.0]]).is_ok());
        let two = vec![scored("a", 0.0).chunk, scored("b", 0.0).chunk];
        assert!(validate_batch(&two, &[vec![1.0, 2.0], vec![1.0]]).is_err());
    }
}
