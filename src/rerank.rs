//! Candidate reranking.
//!
//! The cross-encoder scores every `(query, chunk)` pair and reorders the
//! candidates by relevance. Pass-through keeps the index order and only
//! truncates. Which one a session uses is decided when it loads; a failed
//! rerank call afterwards passes that call's candidates through unchanged.

use tracing::{info, warn};

use smartdoc_core::models::ScoredChunk;

use crate::config::RerankConfig;

#[cfg(feature = "local-models")]
pub use cross_encoder::CrossEncoder;

pub enum Reranker {
    #[cfg(feature = "local-models")]
    CrossEncoder(CrossEncoder),
    PassThrough,
}

impl Reranker {
    /// Load the configured reranker, falling back to pass-through when it
    /// is disabled, fails to load, or exceeds `init_timeout_secs`.
    pub async fn from_config(config: &RerankConfig) -> Self {
        if !config.enabled {
            return Reranker::PassThrough;
        }
        match Self::load(config).await {
            Ok(reranker) => {
                info!(model = %config.model, "reranker ready");
                reranker
            }
            Err(e) => {
                warn!(error = %e, "reranker unavailable, passing candidates through");
                Reranker::PassThrough
            }
        }
    }

    #[cfg(feature = "local-models")]
    async fn load(config: &RerankConfig) -> crate::error::Result<Self> {
        let config = config.clone();
        let timeout = config.init_timeout_secs;
        crate::embedding::load_with_timeout("reranker", timeout, move || {
            CrossEncoder::load(&config)
        })
        .await
        .map(Reranker::CrossEncoder)
    }

    #[cfg(not(feature = "local-models"))]
    async fn load(_config: &RerankConfig) -> crate::error::Result<Self> {
        Err(crate::error::Error::ProviderInitFailure {
            component: "reranker",
            cause: "built without the local-models feature".to_string(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            #[cfg(feature = "local-models")]
            Reranker::CrossEncoder(_) => "cross-encoder",
            Reranker::PassThrough => "pass-through",
        }
    }

    /// At most `min(top_n, candidates.len())` chunks, most relevant first.
    #[cfg_attr(not(feature = "local-models"), allow(unused_variables))]
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredChunk>,
        top_n: usize,
    ) -> Vec<ScoredChunk> {
        match self {
            #[cfg(feature = "local-models")]
            Reranker::CrossEncoder(model) => {
                if candidates.is_empty() {
                    return candidates;
                }
                match model.score(query, &candidates).await {
                    Ok(scores) => reorder(candidates, scores, top_n),
                    Err(e) => {
                        warn!(error = %e, "rerank failed, keeping index order");
                        pass_through(candidates, top_n)
                    }
                }
            }
            Reranker::PassThrough => pass_through(candidates, top_n),
        }
    }
}

fn pass_through(mut candidates: Vec<ScoredChunk>, top_n: usize) -> Vec<ScoredChunk> {
    candidates.truncate(top_n);
    candidates
}

/// Replace each candidate's score with its relevance score and sort.
///
/// `scores` pairs a candidate position with its score. Candidates the model
/// did not score keep their order after the scored ones.
#[cfg_attr(not(feature = "local-models"), allow(dead_code))]
fn reorder(candidates: Vec<ScoredChunk>, scores: Vec<(usize, f32)>, top_n: usize) -> Vec<ScoredChunk> {
    let mut slots: Vec<Option<ScoredChunk>> = candidates.into_iter().map(Some).collect();
    let mut ranked: Vec<ScoredChunk> = Vec::with_capacity(slots.len());
    let mut scores = scores;
    scores.sort_by(|a, b| b.1.total_cmp(&a.1));
    for (idx, score) in scores {
        if let Some(mut hit) = slots.get_mut(idx).and_then(Option::take) {
            hit.score = score;
            ranked.push(hit);
        }
    }
    ranked.extend(slots.into_iter().flatten());
    ranked.truncate(top_n);
    ranked
}

#[cfg(feature = "local-models")]
mod cross_encoder {
    use std::sync::{Arc, Mutex};

    use anyhow::{bail, Result};

    use smartdoc_core::models::ScoredChunk;

    use crate::config::RerankConfig;

    fn config_to_rerank_model(name: &str) -> Result<fastembed::RerankerModel> {
        match name {
            "bge-reranker-base" => Ok(fastembed::RerankerModel::BGERerankerBase),
            "bge-reranker-v2-m3" => Ok(fastembed::RerankerModel::BGERerankerV2M3),
            "jina-reranker-v1-turbo-en" => Ok(fastembed::RerankerModel::JINARerankerV1TurboEn),
            other => bail!(
                "Unknown reranker model: '{}'. Supported: bge-reranker-base, bge-reranker-v2-m3, \
                 jina-reranker-v1-turbo-en",
                other
            ),
        }
    }

    /// fastembed cross-encoder. Like the embedder, it needs `&mut` to run
    /// and is shared behind a mutex.
    pub struct CrossEncoder {
        model: Arc<Mutex<fastembed::TextRerank>>,
        batch_size: usize,
    }

    impl CrossEncoder {
        pub fn load(config: &RerankConfig) -> Result<Self> {
            let model = fastembed::TextRerank::try_new(
                fastembed::RerankInitOptions::new(config_to_rerank_model(&config.model)?)
                    .with_show_download_progress(false),
            )
            .map_err(|e| anyhow::anyhow!("Failed to initialize reranker: {}", e))?;
            Ok(Self {
                model: Arc::new(Mutex::new(model)),
                batch_size: config.batch_size,
            })
        }

        /// Relevance score per candidate position.
        pub async fn score(&self, query: &str, candidates: &[ScoredChunk]) -> Result<Vec<(usize, f32)>> {
            let model = Arc::clone(&self.model);
            let query = query.to_string();
            let documents: Vec<String> = candidates.iter().map(|c| c.chunk.content.clone()).collect();
            let batch_size = self.batch_size;

            tokio::task::spawn_blocking(move || {
                let mut model = model
                    .lock()
                    .map_err(|_| anyhow::anyhow!("reranker lock poisoned"))?;
                let docs: Vec<&str> = documents.iter().map(String::as_str).collect();
                let results = model
                    .rerank(query.as_str(), docs, false, Some(batch_size))
                    .map_err(|e| anyhow::anyhow!("Rerank failed: {}", e))?;
                Ok(results.into_iter().map(|r| (r.index, r.score)).collect())
            })
            .await?
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use smartdoc_core::models::{Chunk, DocumentKind, DocumentMetadata};

    fn candidates(n: usize) -> Vec<ScoredChunk> {
        (0..n)
            .map(|i| {
                ScoredChunk::new(
                    Chunk {
                        id: format!("c{}", i),
                        content: format!("candidate {}", i),
                        metadata: DocumentMetadata::new("m.txt", DocumentKind::Manual),
                        chunk_index: i,
                        hash: String::new(),
                    },
                    1.0 - i as f32 * 0.1,
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_pass_through_equals_prefix() {
        let input = candidates(6);
        let out = Reranker::PassThrough.rerank("q", input.clone(), 3).await;
        assert_eq!(out, input[..3].to_vec());
    }

    #[tokio::test]
    async fn test_pass_through_with_fewer_candidates() {
        let out = Reranker::PassThrough.rerank("q", candidates(2), 5).await;
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn test_disabled_reranker_is_pass_through() {
        let config = RerankConfig {
            enabled: false,
            ..RerankConfig::default()
        };
        let reranker = Reranker::from_config(&config).await;
        assert_eq!(reranker.kind(), "pass-through");
    }

    #[test]
    fn test_reorder_sorts_by_relevance_and_truncates() {
        let out = reorder(candidates(4), vec![(0, -2.0), (1, 0.5), (2, 3.0), (3, 1.0)], 3);
        let ids: Vec<_> = out.iter().map(|c| c.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c3", "c1"]);
        assert_eq!(out[0].score, 3.0);
    }

    #[test]
    fn test_reorder_keeps_unscored_candidates_last() {
        let out = reorder(candidates(3), vec![(2, 0.9)], 3);
        let ids: Vec<_> = out.iter().map(|c| c.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c0", "c1"]);
    }

    #[test]
    fn test_reorder_with_nan_score_keeps_every_candidate() {
        let out = reorder(candidates(3), vec![(0, 0.1), (1, f32::NAN), (2, 0.8)], 3);
        assert_eq!(out.len(), 3);
        let ids: Vec<_> = out
            .iter()
            .filter(|c| !c.score.is_nan())
            .map(|c| c.chunk.id.as_str())
            .collect();
        assert_eq!(ids, vec!["c2", "c0"]);
    }

    #[cfg(feature = "local-models")]
    #[tokio::test]
    async fn test_unknown_model_falls_back_to_pass_through() {
        let config = RerankConfig {
            enabled: true,
            model: "no-such-model".to_string(),
            ..RerankConfig::default()
        };
        let reranker = Reranker::from_config(&config).await;
        assert_eq!(reranker.kind(), "pass-through");

        let out = reranker.rerank("q", candidates(4), 2).await;
        let ids: Vec<_> = out.iter().map(|c| c.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["c0", "c1"]);
    }
}
