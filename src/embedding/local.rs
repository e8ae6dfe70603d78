//! fastembed-backed sentence embedder.
//!
//! Weights are downloaded from Hugging Face on first use and cached; after
//! that inference runs offline on CPU. `TextEmbedding::embed` needs `&mut`,
//! so the model sits behind a mutex and every call runs on a blocking thread.

use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};

use smartdoc_core::embedding::EmbeddingProvider;

use crate::config::EmbeddingConfig;

fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported: all-minilm-l6-v2, all-minilm-l12-v2, \
             bge-small-en-v1.5, bge-base-en-v1.5, multilingual-e5-small",
            other
        ),
    }
}

pub struct LocalEmbedder {
    model: Arc<Mutex<fastembed::TextEmbedding>>,
    model_name: String,
    dims: usize,
    batch_size: usize,
}

impl LocalEmbedder {
    /// Load the model. Blocking: downloads weights on a cold cache.
    ///
    /// The output width is probed with a one-line embedding and must match
    /// `embedding.dims`, so the fallback embedder is always interchangeable.
    pub fn load(config: &EmbeddingConfig) -> Result<Self> {
        let fastembed_model = config_to_fastembed_model(&config.model)?;
        let mut model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed_model).with_show_download_progress(false),
        )
        .map_err(|e| anyhow::anyhow!("Failed to initialize local embedding model: {}", e))?;

        let probe = model
            .embed(vec!["dimension probe"], None)
            .map_err(|e| anyhow::anyhow!("Local embedding probe failed: {}", e))?;
        let dims = probe.first().map(|v| v.len()).unwrap_or(0);
        if dims != config.dims {
            bail!(
                "model {} produces {}-dimensional vectors but embedding.dims = {}",
                config.model,
                dims,
                config.dims
            );
        }

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            model_name: config.model.clone(),
            dims,
            batch_size: config.batch_size,
        })
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        let batch_size = self.batch_size;
        let expected = texts.len();

        let embeddings = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| anyhow::anyhow!("embedding model lock poisoned"))?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow::anyhow!("Local embedding failed: {}", e))
        })
        .await??;

        if embeddings.len() != expected {
            bail!(
                "Local embedding returned {} vectors for {} texts",
                embeddings.len(),
                expected
            );
        }
        Ok(embeddings)
    }
}

impl EmbeddingProvider for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }
}
