//! Configuration and data directory management.
//!
//! Everything is resolved once from the process environment at startup and
//! is immutable afterwards. `from_lookup` takes the variable source as a
//! closure so tests can feed a map instead of mutating the real environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_MIN_SCORE: f32 = 0.3;
/// all-MiniLM-L6-v2 output size; also the bucket count of the hashing embedder.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Paths to all Folio data files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Persisted index directory (`data/index/`).
    pub index_dir: PathBuf,
    /// Source document (`data/personal_info.md` unless overridden).
    pub personal_info: PathBuf,
    /// ONNX model files (`data/models/` unless overridden).
    pub model_dir: PathBuf,
}

impl DataPaths {
    /// Build paths under `root` without touching the filesystem.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            index_dir: root.join("index"),
            personal_info: root.join("personal_info.md"),
            model_dir: root.join("models"),
            root,
        }
    }

    /// Create all required directories.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.index_dir)?;
        Ok(())
    }
}

/// Which embedding backend builds the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackendKind {
    /// Lexical feature hashing, no model files needed.
    Hashing,
    /// Sentence-transformer through ONNX Runtime.
    Onnx,
}

impl FromStr for EmbeddingBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hashing" => Ok(Self::Hashing),
            "onnx" => Ok(Self::Onnx),
            other => Err(Error::InvalidConfig(format!(
                "unknown EMBEDDING_BACKEND '{}' (expected hashing or onnx)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for EmbeddingBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hashing => write!(f, "hashing"),
            Self::Onnx => write!(f, "onnx"),
        }
    }
}

/// Chunking and retrieval knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RagSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub min_score: f32,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            min_score: DEFAULT_MIN_SCORE,
        }
    }
}

/// Top-level Folio configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolioConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins. Empty means permissive.
    pub cors_origins: Vec<String>,
    pub data_paths: DataPaths,
    pub embedding_backend: EmbeddingBackendKind,
    pub embedding_dim: usize,
    pub rag: RagSettings,
    /// Whether `/chat` runs the request guardrails.
    pub security_enabled: bool,
}

impl FolioConfig {
    /// Create configuration from the process environment and defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let root = get("FOLIO_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));
        let mut data_paths = DataPaths::under(&root);
        if let Some(path) = get("PERSONAL_INFO_PATH") {
            data_paths.personal_info = PathBuf::from(path);
        }
        if let Some(dir) = get("FOLIO_MODEL_DIR") {
            data_paths.model_dir = PathBuf::from(dir);
        }

        let embedding_backend = match get("EMBEDDING_BACKEND") {
            Some(v) => v.parse()?,
            None => EmbeddingBackendKind::Hashing,
        };

        let cors_origins = get("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let rag = RagSettings {
            chunk_size: parse_or("CHUNK_SIZE", get("CHUNK_SIZE"), DEFAULT_CHUNK_SIZE)?,
            chunk_overlap: parse_or("CHUNK_OVERLAP", get("CHUNK_OVERLAP"), DEFAULT_CHUNK_OVERLAP)?,
            top_k: parse_or("RAG_TOP_K", get("RAG_TOP_K"), DEFAULT_TOP_K)?,
            min_score: parse_or("RAG_MIN_SCORE", get("RAG_MIN_SCORE"), DEFAULT_MIN_SCORE)?,
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or("PORT", get("PORT"), DEFAULT_PORT)?,
            cors_origins,
            data_paths,
            embedding_backend,
            embedding_dim: parse_or("EMBEDDING_DIM", get("EMBEDDING_DIM"), DEFAULT_EMBEDDING_DIM)?,
            rag,
            security_enabled: parse_bool("SECURITY_ENABLED", get("SECURITY_ENABLED"), true)?,
        })
    }

    /// Socket address string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        Some(v) => v
            .parse()
            .map_err(|_| Error::InvalidConfig(format!("{} has invalid value '{}'", key, v))),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, raw: Option<String>, default: bool) -> Result<bool> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(Error::InvalidConfig(format!(
            "{} has invalid value '{}'",
            key, other
        ))),
    }
}
