//! Folio Ingest: source document loading, chunking and text normalization.

pub mod chunking;
pub mod document;
pub mod text;

pub use chunking::{Chunk, Chunker};
pub use document::{Document, Section, PLACEHOLDER_DOCUMENT};
pub use text::clean_text;
