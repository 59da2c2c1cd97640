//! Embedding engine trait and implementations.
//!
//! The `EmbedderBackend` trait abstracts over embedding generation.
//! Implementations:
//! - `HashingEmbedder`: lexical feature hashing, always available
//! - `OnnxEmbedder`: all-MiniLM-L6-v2 through ONNX Runtime (`onnx` feature)
//! - `UnavailableEmbedder`: stands in when the requested backend cannot exist
//!   in this build; every call fails with `ModelUnavailable`
//!
//! All methods are synchronous CPU work. Async callers should run them on
//! the blocking pool.

use ndarray::Array1;

use folio_core::{Error, Result};

/// Result of an embedding operation.
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// Float32 embedding vector.
    pub embedding: Array1<f32>,
    /// Whether this was served from cache.
    pub cached: bool,
}

/// Trait for embedding backends.
pub trait EmbedderBackend: Send + Sync {
    /// Generate an embedding for a text string.
    fn embed(&self, text: &str) -> Result<EmbeddingResult>;

    /// Generate embeddings for a batch of texts, one per input in order.
    /// Fails as a whole if any text fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbeddingResult>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Identifier persisted alongside the index so a stale index built by a
    /// different model is not loaded.
    fn model_name(&self) -> &str;

    /// Check if the embedder can currently produce embeddings.
    fn is_available(&self) -> bool;
}

/// Placeholder embedder for a backend compiled out of this build.
pub struct UnavailableEmbedder {
    dim: usize,
    reason: String,
}

impl UnavailableEmbedder {
    pub fn new(dim: usize, reason: impl Into<String>) -> Self {
        Self {
            dim,
            reason: reason.into(),
        }
    }
}

impl EmbedderBackend for UnavailableEmbedder {
    fn embed(&self, _text: &str) -> Result<EmbeddingResult> {
        Err(Error::ModelUnavailable(self.reason.clone()))
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }
}
