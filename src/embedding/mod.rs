//! Embedding providers.
//!
//! [`Embedder`] is a tagged choice between the fastembed model
//! ([`LocalEmbedder`], feature `local-models`) and the deterministic
//! [`HashEmbedder`] fallback. The choice is made once per document set by
//! [`Embedder::from_config`]; whichever variant embedded the chunks also
//! embeds the queries against them.
//!
//! The hash embedder cannot fail. A model failure is reported as an error
//! and the session decides how to degrade.

#[cfg(feature = "local-models")]
mod local;

#[cfg(feature = "local-models")]
pub use local::LocalEmbedder;

use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

pub use smartdoc_core::embedding::{cosine_similarity, EmbeddingProvider, HashEmbedder};

use crate::config::EmbeddingConfig;
use crate::error::Error;

pub enum Embedder {
    #[cfg(feature = "local-models")]
    Local(LocalEmbedder),
    Hash(HashEmbedder),
    /// A primary embedder that stops working. Queries always fail; batches
    /// fail when `fail_batch` is set and are hash-embedded otherwise.
    #[cfg(test)]
    Failing { hash: HashEmbedder, fail_batch: bool },
}

impl Embedder {
    /// Select the embedder for a new document set.
    ///
    /// With `provider = "local"` the model is loaded on a blocking thread,
    /// bounded by `init_timeout_secs`. Any failure (including a timeout or a
    /// build without `local-models`) is logged and the hash embedder is used
    /// instead.
    pub async fn from_config(config: &EmbeddingConfig) -> Self {
        if !config.prefers_model() {
            return Embedder::hash(config.dims);
        }
        match Self::load_local(config).await {
            Ok(embedder) => {
                info!(model = %embedder.model_name(), dims = embedder.dims(), "embedding model ready");
                embedder
            }
            Err(e) => {
                warn!(error = %e, "embedding model unavailable, using hash embeddings");
                Embedder::hash(config.dims)
            }
        }
    }

    #[cfg(feature = "local-models")]
    async fn load_local(config: &EmbeddingConfig) -> Result<Self, Error> {
        let config = config.clone();
        let timeout = config.init_timeout_secs;
        load_with_timeout("embedding model", timeout, move || LocalEmbedder::load(&config))
            .await
            .map(Embedder::Local)
    }

    #[cfg(not(feature = "local-models"))]
    async fn load_local(_config: &EmbeddingConfig) -> Result<Self, Error> {
        Err(Error::ProviderInitFailure {
            component: "embedding model",
            cause: "built without the local-models feature".to_string(),
        })
    }

    pub fn hash(dims: usize) -> Self {
        Embedder::Hash(HashEmbedder::new(dims))
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Embedder::Hash(_))
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self {
            #[cfg(feature = "local-models")]
            Embedder::Local(model) => model.embed_batch(texts).await,
            Embedder::Hash(hash) => Ok(hash.embed_batch(texts)),
            #[cfg(test)]
            Embedder::Failing { hash, fail_batch } => {
                if *fail_batch {
                    anyhow::bail!("model session crashed")
                }
                Ok(hash.embed_batch(texts))
            }
        }
    }

    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        match self {
            #[cfg(feature = "local-models")]
            Embedder::Local(model) => {
                let mut vectors = model.embed_batch(&[text.to_string()]).await?;
                vectors
                    .pop()
                    .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
            }
            Embedder::Hash(hash) => Ok(hash.embed(text)),
            #[cfg(test)]
            Embedder::Failing { .. } => anyhow::bail!("model session crashed"),
        }
    }
}

impl EmbeddingProvider for Embedder {
    fn model_name(&self) -> &str {
        match self {
            #[cfg(feature = "local-models")]
            Embedder::Local(model) => model.model_name(),
            Embedder::Hash(hash) => hash.model_name(),
            #[cfg(test)]
            Embedder::Failing { .. } => "failing-model",
        }
    }
    fn dims(&self) -> usize {
        match self {
            #[cfg(feature = "local-models")]
            Embedder::Local(model) => model.dims(),
            Embedder::Hash(hash) => hash.dims(),
            #[cfg(test)]
            Embedder::Failing { hash, .. } => hash.dims(),
        }
    }
}

/// Run a blocking model load on the blocking pool, giving up after
/// `timeout_secs`. A timed-out load keeps running in the background but its
/// result is discarded.
pub(crate) async fn load_with_timeout<T, F>(
    component: &'static str,
    timeout_secs: u64,
    load: F,
) -> Result<T, Error>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(load);
    match tokio::time::timeout(Duration::from_secs(timeout_secs), handle).await {
        Ok(Ok(Ok(loaded))) => Ok(loaded),
        Ok(Ok(Err(e))) => Err(Error::ProviderInitFailure {
            component,
            cause: format!("{:#}", e),
        }),
        Ok(Err(join_err)) => Err(Error::ProviderInitFailure {
            component,
            cause: join_err.to_string(),
        }),
        Err(_) => Err(Error::ProviderInitFailure {
            component,
            cause: format!("initialisation timed out after {}s", timeout_secs),
        }),
    }
}
