//! ONNX-based embedding engine using all-MiniLM-L6-v2.
//!
//! Loads a SentenceTransformers ONNX model and tokenizer to generate
//! 384-dimensional float32 embeddings. Requires the `onnx` feature.
//! The model is loaded on the first embed call and kept for the lifetime of
//! the process; a failed load is retried on the next call.

#[cfg(feature = "onnx")]
mod inner {
    use std::path::{Path, PathBuf};

    use ndarray::Array1;
    use once_cell::sync::OnceCell;
    use ort::session::Session;
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use tokenizers::Tokenizer;
    use tracing::{info, warn};

    use crate::embedder::{EmbedderBackend, EmbeddingResult};
    use folio_core::{Error, Result};

    /// Maximum sequence length for the model.
    const MAX_SEQ_LEN: usize = 512;

    /// Embedding dimension of all-MiniLM-L6-v2.
    const DEFAULT_DIM: usize = 384;

    const MODEL_NAME: &str = "all-MiniLM-L6-v2";

    struct LoadedModel {
        session: Mutex<Session>,
        tokenizer: Tokenizer,
    }

    impl LoadedModel {
        /// Expects `model_dir/model.onnx` and `model_dir/tokenizer.json`.
        fn load(model_dir: &Path) -> Result<Self> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            if !model_path.exists() {
                return Err(Error::ModelUnavailable(format!(
                    "model not found: {}",
                    model_path.display()
                )));
            }
            if !tokenizer_path.exists() {
                return Err(Error::ModelUnavailable(format!(
                    "tokenizer not found: {}",
                    tokenizer_path.display()
                )));
            }

            // With load-dynamic, ORT_DYLIB_PATH must point to libonnxruntime.
            ort::init().commit();

            let session = Session::builder()
                .map_err(|e| Error::ModelUnavailable(format!("session builder: {}", e)))?
                .with_intra_threads(2)
                .map_err(|e| Error::ModelUnavailable(format!("thread config: {}", e)))?
                .commit_from_file(&model_path)
                .map_err(|e| Error::ModelUnavailable(format!("loading ONNX model: {}", e)))?;

            let tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| Error::ModelUnavailable(format!("loading tokenizer: {}", e)))?;

            info!(
                "ONNX embedder loaded: dim={}, model={}",
                DEFAULT_DIM,
                model_path.display()
            );

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
            })
        }

        fn infer(&self, text: &str) -> Result<Array1<f32>> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| Error::Inference(format!("tokenization failed: {}", e)))?;

            let seq_len = encoding.get_ids().len().min(MAX_SEQ_LEN);
            let input_ids = &encoding.get_ids()[..seq_len];
            let attention_mask = &encoding.get_attention_mask()[..seq_len];

            let ids_data: Vec<i64> = input_ids.iter().map(|&id| id as i64).collect();
            let mask_data: Vec<i64> = attention_mask.iter().map(|&m| m as i64).collect();
            let type_ids_data: Vec<i64> = vec![0i64; seq_len];

            let tensor = |data: Vec<i64>| {
                Tensor::from_array(([1usize, seq_len], data))
                    .map_err(|e| Error::Inference(format!("building input tensor: {}", e)))
            };
            let ids_tensor = tensor(ids_data)?;
            let mask_tensor = tensor(mask_data)?;
            let type_ids_tensor = tensor(type_ids_data)?;

            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor, type_ids_tensor])
                .map_err(|e| Error::Inference(format!("ONNX inference failed: {}", e)))?;

            // Either token embeddings [1, seq_len, dim] that need mean pooling
            // or an already pooled sentence embedding [1, dim].
            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| Error::Inference(format!("extracting output: {}", e)))?;
            let dims: Vec<i64> = shape.iter().copied().collect();

            match dims.len() {
                3 => {
                    let dim = dims[2] as usize;
                    let mask_sum: f32 = attention_mask.iter().map(|&m| m as f32).sum();
                    if mask_sum < 1e-9 {
                        return Err(Error::Inference("empty attention mask".into()));
                    }
                    let mut pooled = Array1::<f32>::zeros(dim);
                    for (i, &m) in attention_mask.iter().enumerate() {
                        if m > 0 {
                            let offset = i * dim;
                            for d in 0..dim {
                                pooled[d] += data[offset + d];
                            }
                        }
                    }
                    Ok(pooled / mask_sum)
                }
                2 => {
                    let dim = dims[1] as usize;
                    Ok(Array1::from_vec(data[..dim].to_vec()))
                }
                _ => Err(Error::Inference(format!(
                    "unexpected output shape: {:?}",
                    dims
                ))),
            }
        }
    }

    /// ONNX embedding engine, loaded lazily from `model_dir`.
    pub struct OnnxEmbedder {
        model_dir: PathBuf,
        model: OnceCell<LoadedModel>,
    }

    impl OnnxEmbedder {
        pub fn new(model_dir: impl Into<PathBuf>) -> Self {
            Self {
                model_dir: model_dir.into(),
                model: OnceCell::new(),
            }
        }

        fn model(&self) -> Result<&LoadedModel> {
            self.model.get_or_try_init(|| {
                LoadedModel::load(&self.model_dir).map_err(|e| {
                    warn!("ONNX embedder unavailable: {}", e);
                    e
                })
            })
        }
    }

    impl EmbedderBackend for OnnxEmbedder {
        fn embed(&self, text: &str) -> Result<EmbeddingResult> {
            let embedding = self.model()?.infer(text)?;
            Ok(EmbeddingResult {
                embedding,
                cached: false,
            })
        }

        fn dimension(&self) -> usize {
            DEFAULT_DIM
        }

        fn model_name(&self) -> &str {
            MODEL_NAME
        }

        fn is_available(&self) -> bool {
            self.model.get().is_some()
                || (self.model_dir.join("model.onnx").exists()
                    && self.model_dir.join("tokenizer.json").exists())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_missing_model_is_unavailable() {
            let tmp = tempfile::tempdir().unwrap();
            let embedder = OnnxEmbedder::new(tmp.path());
            assert!(!embedder.is_available());
            assert!(matches!(
                embedder.embed("hello"),
                Err(Error::ModelUnavailable(_))
            ));
        }
    }
}

#[cfg(feature = "onnx")]
pub use inner::OnnxEmbedder;
