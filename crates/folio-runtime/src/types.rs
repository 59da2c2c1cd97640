//! Runtime result types.

use serde::Serialize;

use folio_chat::LLMProvider;

/// Where the live index came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexSource {
    /// Chunked and embedded from the document.
    Built,
    /// Read back from the SQLite file.
    Loaded,
}

/// Outcome of installing a new index generation.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub chunks: usize,
    pub dimension: usize,
    pub model_name: String,
    pub source: IndexSource,
    /// Whether the generation is on disk. A freshly built index that failed
    /// to save is still installed.
    pub persisted: bool,
}

/// Answer to one chat request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub response: String,
    /// Retrieved context given to the provider, empty when nothing matched.
    pub context_used: String,
    pub provider: LLMProvider,
    pub fell_back: bool,
}
