//! Lexical feature-hashing embedder.
//!
//! Each text contributes three feature families, hashed with SHA-256 into
//! `dim` shared buckets:
//!
//! - lower-cased word tokens (weight 1.0), which carry most of the overlap
//!   signal between a question and a chunk;
//! - case-preserving tokens, punctuation included;
//! - ordered token bigrams with start and end markers.
//!
//! The last two are weighted lower. They make word order, casing and
//! punctuation part of the vector, so only an identical token sequence
//! reaches similarity 1.0. Bucket weights are L2-normalized. Weights are
//! unsigned, so collisions can only raise similarity and scores stay
//! within [0, 1].

use ndarray::Array1;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::embedder::{EmbedderBackend, EmbeddingResult};
use folio_core::{Error, Result};

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+|[^\w\s]").unwrap());

const WORD_WEIGHT: f32 = 1.0;
const SURFACE_WEIGHT: f32 = 0.3;
const BIGRAM_WEIGHT: f32 = 0.3;

const START: &str = "^";
const END: &str = "$";

pub struct HashingEmbedder {
    dim: usize,
    name: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidConfig(
                "embedding dimension must be positive".into(),
            ));
        }
        Ok(Self {
            dim,
            name: format!("hashing-ngram-{}", dim),
        })
    }

    fn bucket(&self, feature: &str) -> usize {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(bytes) % self.dim as u64) as usize
    }

    fn add(&self, embedding: &mut Array1<f32>, feature: &str, weight: f32) {
        embedding[self.bucket(feature)] += weight;
    }
}

fn is_word(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_alphanumeric() || c == '_')
}

impl EmbedderBackend for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<EmbeddingResult> {
        let mut embedding = Array1::<f32>::zeros(self.dim);
        let tokens: Vec<&str> = TOKEN_RE.find_iter(text).map(|m| m.as_str()).collect();

        for token in &tokens {
            if is_word(token) {
                self.add(&mut embedding, &format!("u:{}", token.to_lowercase()), WORD_WEIGHT);
            }
            self.add(&mut embedding, &format!("c:{}", token), SURFACE_WEIGHT);
        }

        if !tokens.is_empty() {
            let sequence: Vec<&str> = std::iter::once(START)
                .chain(tokens.iter().copied())
                .chain(std::iter::once(END))
                .collect();
            for pair in sequence.windows(2) {
                self.add(&mut embedding, &format!("b:{} {}", pair[0], pair[1]), BIGRAM_WEIGHT);
            }
        }

        let norm = embedding.dot(&embedding).sqrt();
        if norm > 0.0 {
            embedding /= norm;
        }

        Ok(EmbeddingResult {
            embedding,
            cached: false,
        })
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        true
    }
}
