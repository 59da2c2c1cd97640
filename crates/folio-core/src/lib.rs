//! Folio Core: error taxonomy and process-wide configuration.

pub mod config;
pub mod error;

pub use config::{DataPaths, EmbeddingBackendKind, FolioConfig, RagSettings};
pub use error::{Error, Result};
