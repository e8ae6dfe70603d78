//! The retrieval pipeline for one document set.
//!
//! A [`RetrievalPipeline`] owns the embedder, the vector index built with
//! it, and the reranker. Queries flow embed → search (`fetch_k`) → rerank
//! (`top_n`).
//!
//! Degradation is one-way. If the embedding model fails while embedding the
//! chunks, the whole set is embedded with the hash embedder instead. If it
//! fails later on a query, the retained chunks are re-embedded with the
//! hash embedder and the index is rebuilt before the query is answered, so
//! queries are always embedded by the producer that built the index.

use anyhow::Context;
use tracing::{debug, info, warn};

use smartdoc_core::embedding::EmbeddingProvider;
use smartdoc_core::models::{Chunk, ScoredChunk};

use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::rerank::Reranker;

pub struct RetrievalPipeline {
    config: Config,
    chunks: Vec<Chunk>,
    embedder: Embedder,
    index: VectorIndex,
    reranker: Reranker,
}

impl RetrievalPipeline {
    /// Embed `chunks`, build the index, and load the reranker.
    pub async fn build(config: &Config, chunks: Vec<Chunk>) -> Result<Self> {
        let embedder = Embedder::from_config(&config.embedding).await;
        Self::build_with(config, chunks, embedder).await
    }

    /// Like [`build`](Self::build), with an embedder chosen by the caller.
    pub async fn build_with(
        config: &Config,
        chunks: Vec<Chunk>,
        mut embedder: Embedder,
    ) -> Result<Self> {
        let vectors = match embed_chunks(&embedder, &chunks, config.embedding.batch_size).await {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!(
                    model = %embedder.model_name(),
                    error = %e,
                    "embedding failed, re-embedding document set with hash embeddings"
                );
                embedder = Embedder::hash(config.embedding.dims);
                embed_chunks(&embedder, &chunks, config.embedding.batch_size)
                    .await
                    .map_err(|e| Error::RetrievalFailure(format!("{:#}", e)))?
            }
        };

        let index = build_index(config, &chunks, &vectors).await?;

        let reranker = Reranker::from_config(&config.rerank).await;

        info!(
            chunks = chunks.len(),
            embedder = %embedder.model_name(),
            backend = index.backend(),
            reranker = reranker.kind(),
            "retrieval pipeline ready"
        );

        Ok(Self {
            config: config.clone(),
            chunks,
            embedder,
            index,
            reranker,
        })
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.model_name()
    }

    pub fn index_backend(&self) -> &'static str {
        self.index.backend()
    }

    pub fn reranker_kind(&self) -> &'static str {
        self.reranker.kind()
    }

    /// Most relevant chunks for `query`, at most `retrieval.top_n`.
    pub async fn retrieve(&mut self, query: &str) -> Result<Vec<ScoredChunk>> {
        let query_vec = match self.embedder.embed_query(query).await {
            Ok(v) => v,
            Err(e) if !self.embedder.is_fallback() => {
                warn!(error = %e, "query embedding failed, degrading to hash embeddings");
                self.degrade_to_hash()
                    .await
                    .map_err(|e| Error::RetrievalFailure(format!("{:#}", e)))?;
                self.embedder
                    .embed_query(query)
                    .await
                    .map_err(|e| Error::RetrievalFailure(format!("{:#}", e)))?
            }
            Err(e) => return Err(Error::RetrievalFailure(format!("{:#}", e))),
        };

        let fetch_k = self.config.retrieval.fetch_k(&self.config.index);
        let candidates = self
            .index
            .search(&query_vec, fetch_k, self.config.index.score_threshold)
            .await
            .map_err(|e| Error::RetrievalFailure(format!("{:#}", e)))?;
        debug!(candidates = candidates.len(), fetch_k, "vector search done");

        Ok(self
            .reranker
            .rerank(query, candidates, self.config.retrieval.top_n)
            .await)
    }

    /// Swap in the hash embedder and rebuild the index with it.
    async fn degrade_to_hash(&mut self) -> anyhow::Result<()> {
        let embedder = Embedder::hash(self.config.embedding.dims);
        let vectors = embed_chunks(&embedder, &self.chunks, self.config.embedding.batch_size).await?;
        let index = VectorIndex::build(&self.config.index, &self.chunks, &vectors)
            .await
            .context("Failed to rebuild index with hash embeddings")?;

        let old = std::mem::replace(&mut self.index, index);
        old.close().await;
        self.embedder = embedder;
        info!(backend = self.index.backend(), "index rebuilt with hash embeddings");
        Ok(())
    }

    /// Release the index. Called when the session replaces this pipeline.
    pub async fn close(self) {
        self.index.close().await;
    }
}

/// Build the index, with SQLite failures already recovered inside
/// [`VectorIndex::build`]. An error here means the in-memory fallback failed
/// too.
async fn build_index(config: &Config, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<VectorIndex> {
    VectorIndex::build(&config.index, chunks, vectors)
        .await
        .map_err(|e| Error::RetrievalFailure(format!("{:#}", e)))
}

async fn embed_chunks(
    embedder: &Embedder,
    chunks: &[Chunk],
    batch_size: usize,
) -> anyhow::Result<Vec<Vec<f32>>> {
    let mut vectors = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let embedded = embedder.embed_batch(&texts).await?;
        vectors.extend(embedded);
    }
    Ok(vectors)
}
