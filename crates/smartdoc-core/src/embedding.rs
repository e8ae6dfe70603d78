//! Embedding provider trait, the deterministic hash embedder, and vector
//! utilities.
//!
//! Model-backed providers live in the `smartdoc` app crate; this module holds
//! the pieces that need no model weights:
//!
//! - [`EmbeddingProvider`]: metadata every embedder exposes.
//! - [`HashEmbedder`]: content-hash fallback embedder. It has no semantic
//!   meaning but is fast, offline and deterministic, so the pipeline never
//!   hard-fails on embedding.
//! - [`cosine_similarity`], [`vec_to_blob`], [`blob_to_vec`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

/// Default embedding dimensionality (matches `all-MiniLM-L6-v2`).
pub const DEFAULT_DIMS: usize = 384;

/// Seed for the vector assigned to empty or whitespace-only text.
const EMPTY_TEXT_SEED: u64 = 42;

/// Trait for embedding providers.
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
}

/// Deterministic embedder keyed by the SHA-256 of the text.
///
/// Identical input always produces identical output. Two texts differing by
/// a single character produce unrelated vectors.
///
/// # Example
///
/// ```rust
/// use smartdoc_core::embedding::HashEmbedder;
///
/// let embedder = HashEmbedder::new(384);
/// let a = embedder.embed("The sky is blue.");
/// assert_eq!(a.len(), 384);
/// assert_eq!(a, embedder.embed("The sky is blue."));
/// ```
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
    empty_vector: Vec<f32>,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            empty_vector: seeded_unit_vector(dims, EMPTY_TEXT_SEED),
        }
    }

    /// Embed one text. Blank text maps to a fixed pseudo-random unit vector.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        if text.trim().is_empty() {
            return self.empty_vector.clone();
        }
        hash_embedding(text, self.dims)
    }

    pub fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "sha256-hash"
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

/// Hash `text` into a `dims`-length vector with components in `[0, 1]`.
///
/// The digest bytes are the first values; past the digest length the
/// sequence is extended periodically with
/// `value[i] = (value[i mod hash_len] + i) mod 256`.
pub fn hash_embedding(text: &str, dims: usize) -> Vec<f32> {
    let digest = Sha256::digest(text.as_bytes());
    let hash_len = digest.len();

    (0..dims)
        .map(|i| {
            let value = if i < hash_len {
                digest[i] as usize
            } else {
                (digest[i % hash_len] as usize + i) % 256
            };
            value as f32 / 255.0
        })
        .collect()
}

/// Unit vector with components drawn uniformly from `[-1, 1]` under `seed`.
fn seeded_unit_vector(dims: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut v: Vec<f32> = (0..dims).map(|_| rng.gen_range(-1.0f32..=1.0)).collect();
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use smartdoc_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`. Returns `0.0` when either vector has
/// zero magnitude, when the vectors are empty, or when their lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0)
}
