//! Folio Infer: embedding backends and query cache.
//!
//! Provides the `EmbedderBackend` trait for generating embeddings.
//! `HashingEmbedder` is always compiled and needs no model files. When the
//! `onnx` feature is enabled, `OnnxEmbedder` loads all-MiniLM-L6-v2 for
//! 384-dim embeddings on first use.

pub mod cache;
pub mod embedder;
pub mod hashing;
pub mod onnx_embedder;

pub use cache::{CachedEmbedder, QueryCache};
pub use embedder::{EmbedderBackend, EmbeddingResult, UnavailableEmbedder};
pub use hashing::HashingEmbedder;

#[cfg(feature = "onnx")]
pub use onnx_embedder::OnnxEmbedder;

use std::path::Path;
use std::sync::Arc;

use folio_core::{EmbeddingBackendKind, Result};

/// Create the embedder selected by configuration, wrapped in a query cache.
///
/// Requesting `onnx` in a build without the feature is not an error here:
/// the returned embedder fails every call with `ModelUnavailable`, which
/// keeps the server up while index builds report the problem.
pub fn create_embedder(
    kind: EmbeddingBackendKind,
    model_dir: &Path,
    dim: usize,
) -> Result<Arc<dyn EmbedderBackend>> {
    match kind {
        EmbeddingBackendKind::Hashing => {
            tracing::info!("Using hashing embedder (dim={})", dim);
            Ok(Arc::new(CachedEmbedder::new(HashingEmbedder::new(dim)?)))
        }
        EmbeddingBackendKind::Onnx => {
            #[cfg(feature = "onnx")]
            {
                tracing::info!("Using ONNX embedder from {}", model_dir.display());
                Ok(Arc::new(CachedEmbedder::new(OnnxEmbedder::new(model_dir))))
            }

            #[cfg(not(feature = "onnx"))]
            {
                tracing::warn!(
                    "ONNX embedder requested ({}) but the onnx feature is disabled",
                    model_dir.display()
                );
                Ok(Arc::new(UnavailableEmbedder::new(
                    dim,
                    "folio was built without the onnx feature",
                )))
            }
        }
    }
}
