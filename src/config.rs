//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all, see [`load_config_or_default`]) yields a working configuration that
//! tries the local models first and falls back as needed.
//!
//! ```toml
//! [chunking]
//! chunk_size = 1000
//! overlap = 100
//!
//! [embedding]
//! provider = "local"          # "local" (fastembed) or "hash"
//! model = "all-minilm-l6-v2"
//! dims = 384
//!
//! [index]
//! backend = "auto"            # "auto", "sqlite" or "memory"
//! fetch_factor = 2
//! # score_threshold = 0.5
//!
//! [retrieval]
//! search_k = 10
//! top_n = 3
//!
//! [rerank]
//! enabled = true
//! model = "bge-reranker-base"
//!
//! [generation]
//! url = "https://api.groq.com/openai/v1/chat/completions"
//! model = "llama3-8b-8192"
//! api_key_env = "GROQ_API_KEY"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use smartdoc_core::chunk::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use smartdoc_core::embedding::DEFAULT_DIMS;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_init_timeout_secs")]
    pub init_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            init_timeout_secs: default_init_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_embedding_model() -> String {
    "all-minilm-l6-v2".to_string()
}
fn default_dims() -> usize {
    DEFAULT_DIMS
}
fn default_batch_size() -> usize {
    64
}
fn default_init_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    /// SQLite file for the primary index. A private in-memory database
    /// is used when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_fetch_factor")]
    pub fetch_factor: usize,
    #[serde(default)]
    pub score_threshold: Option<f32>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
            fetch_factor: default_fetch_factor(),
            score_threshold: None,
        }
    }
}

fn default_backend() -> String {
    "auto".to_string()
}
fn default_fetch_factor() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of results the vector search is asked for (before over-fetch).
    #[serde(default = "default_search_k")]
    pub search_k: usize,
    /// Number of chunks returned to the caller after reranking.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_k: default_search_k(),
            top_n: default_top_n(),
        }
    }
}

fn default_search_k() -> usize {
    10
}
fn default_top_n() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct RerankConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_rerank_model")]
    pub model: String,
    #[serde(default = "default_init_timeout_secs")]
    pub init_timeout_secs: u64,
    #[serde(default = "default_rerank_batch_size")]
    pub batch_size: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_rerank_model(),
            init_timeout_secs: default_init_timeout_secs(),
            batch_size: default_rerank_batch_size(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_rerank_model() -> String {
    "bge-reranker-base".to_string()
}
fn default_rerank_batch_size() -> usize {
    16
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_url")]
    pub url: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: default_generation_url(),
            model: default_generation_model(),
            api_key_env: default_api_key_env(),
            temperature: 0.0,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_generation_url() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}
fn default_generation_model() -> String {
    "llama3-8b-8192".to_string()
}
fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    60
}

impl EmbeddingConfig {
    pub fn prefers_model(&self) -> bool {
        self.provider == "local"
    }
}

impl RetrievalConfig {
    /// Candidates requested from the index: `fetch_factor × search_k`.
    pub fn fetch_k(&self, index: &IndexConfig) -> usize {
        self.search_k.saturating_mul(index.fetch_factor.max(1))
    }
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Load `path` if it exists, otherwise return validated defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        bail!("chunking.overlap must be smaller than chunking.chunk_size");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "local" | "hash" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local or hash.",
            other
        ),
    }
    if config.embedding.dims == 0 {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    // Validate index
    match config.index.backend.as_str() {
        "auto" | "sqlite" | "memory" => {}
        other => bail!(
            "Unknown index backend: '{}'. Must be auto, sqlite, or memory.",
            other
        ),
    }
    if config.index.fetch_factor == 0 {
        bail!("index.fetch_factor must be >= 1");
    }
    if let Some(t) = config.index.score_threshold {
        if !(-1.0..=1.0).contains(&t) {
            bail!("index.score_threshold must be in [-1.0, 1.0]");
        }
    }

    // Validate retrieval
    if config.retrieval.top_n == 0 {
        bail!("retrieval.top_n must be >= 1");
    }
    if config.retrieval.search_k < config.retrieval.top_n {
        bail!("retrieval.search_k must be >= retrieval.top_n");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.chunking.chunk_size, 1000);
        assert_eq!(cfg.chunking.overlap, 100);
        assert_eq!(cfg.embedding.dims, 384);
        assert_eq!(cfg.embedding.provider, "local");
        assert_eq!(cfg.index.backend, "auto");
        assert_eq!(cfg.retrieval.fetch_k(&cfg.index), 20);
        assert!(cfg.rerank.enabled);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let cfg = parse_config(
            r#"
            [embedding]
            provider = "hash"

            [index]
            score_threshold = 0.25
            "#,
        )
        .unwrap();
        assert_eq!(cfg.embedding.provider, "hash");
        assert!(!cfg.embedding.prefers_model());
        assert_eq!(cfg.embedding.dims, 384);
        assert_eq!(cfg.index.score_threshold, Some(0.25));
        assert_eq!(cfg.index.fetch_factor, 2);
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        let err = parse_config("[chunking]\nchunk_size = 100\noverlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_rejects_unknown_names() {
        assert!(parse_config("[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse_config("[index]\nbackend = \"chroma\"\n").is_err());
    }

    #[test]
    fn test_rejects_top_n_above_search_k() {
        assert!(parse_config("[retrieval]\nsearch_k = 2\ntop_n = 3\n").is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let cfg = load_config_or_default(Path::new("/nonexistent/smartdoc.toml")).unwrap();
        assert_eq!(cfg.retrieval.top_n, 3);
    }
}
