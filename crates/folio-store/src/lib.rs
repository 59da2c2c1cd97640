//! Folio Store: cosine vector index, swap-on-rebuild handle, SQLite persistence.

pub mod embedding;
pub mod index;
pub mod schema;
pub mod sqlite;

pub use index::{IndexHandle, IndexSummary, SearchHit, VectorIndex};
pub use sqlite::IndexStore;
