//! Runtime: wires the document, embedder, index and LLM client together.
//!
//! `IndexManager` owns index construction (load, rebuild, persist),
//! `Retriever` turns a query into a context string and `ChatOrchestrator`
//! runs retrieval then generation for one chat request.

pub mod indexer;
pub mod orchestrator;
pub mod retriever;
pub mod types;

pub use indexer::{build_index, IndexManager};
pub use orchestrator::ChatOrchestrator;
pub use retriever::Retriever;
pub use types::*;
