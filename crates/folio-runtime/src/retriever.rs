//! Query → context string.

use std::sync::Arc;

use tracing::{debug, warn};

use folio_core::RagSettings;
use folio_infer::EmbedderBackend;
use folio_ingest::clean_text;
use folio_store::{IndexHandle, SearchHit};

/// Delimiter between retrieved chunks in the context string.
pub const CONTEXT_DELIMITER: &str = "\n\n";

/// Scores within f32 rounding of the threshold clear it, so an identical
/// chunk still passes a threshold of 1.0.
const SCORE_TOLERANCE: f32 = 1e-6;

/// Embeds a query and selects the chunks that clear the score threshold.
///
/// Cheap to clone. All methods do CPU work and belong on the blocking pool
/// when called from async code.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbedderBackend>,
    index: Arc<IndexHandle>,
    top_k: usize,
    min_score: f32,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbedderBackend>, index: Arc<IndexHandle>, rag: &RagSettings) -> Self {
        Self {
            embedder,
            index,
            top_k: rag.top_k,
            min_score: rag.min_score,
        }
    }

    pub fn with_limits(mut self, top_k: usize, min_score: f32) -> Self {
        self.top_k = top_k;
        self.min_score = min_score;
        self
    }

    /// Hits with `score >= min_score`, best first. Embedding failures are
    /// logged and produce no hits.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let cleaned = clean_text(query);
        let embedding = match self.embedder.embed(&cleaned) {
            Ok(result) => result.embedding,
            Err(e) => {
                warn!("Query embedding failed, continuing without context: {}", e);
                return Vec::new();
            }
        };

        let hits: Vec<SearchHit> = self
            .index
            .search(&embedding, self.top_k)
            .into_iter()
            .filter(|hit| hit.score + SCORE_TOLERANCE >= self.min_score)
            .collect();

        debug!(
            "Retrieved {} chunk(s) for query (k={}, min_score={})",
            hits.len(),
            self.top_k,
            self.min_score
        );
        hits
    }

    /// Texts of the surviving hits joined in score order. Empty when none.
    pub fn context_for(&self, query: &str) -> String {
        self.search(query)
            .iter()
            .map(|hit| hit.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_DELIMITER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::build_index;
    use folio_infer::{HashingEmbedder, UnavailableEmbedder};
    use folio_ingest::{Chunker, Document};

    const PROFILE: &str = "Satvik is an AI engineer. He works at DRDO.";

    fn ready_handle(embedder: &dyn EmbedderBackend, text: &str, chunk_size: usize) -> Arc<IndexHandle> {
        let chunker = Chunker::new(chunk_size, 0).unwrap();
        let index = build_index(&Document::new(text), &chunker, embedder).unwrap();
        let handle = Arc::new(IndexHandle::new());
        handle.install(Arc::new(index));
        handle
    }

    #[test]
    fn test_context_contains_relevant_chunk() {
        let embedder: Arc<dyn EmbedderBackend> = Arc::new(HashingEmbedder::new(384).unwrap());
        let handle = ready_handle(embedder.as_ref(), PROFILE, 500);
        let retriever =
            Retriever::new(embedder, handle, &RagSettings::default()).with_limits(1, 0.1);

        let context = retriever.context_for("Where does Satvik work?");
        assert_eq!(context, PROFILE);
    }

    const MULTI_CHUNK_PROFILE: &str = "Satvik is an AI engineer. He works at DRDO. \
                                       He writes Rust and Python every day. He lives in Bengaluru.";

    #[test]
    fn test_threshold_filters_everything() {
        let embedder: Arc<dyn EmbedderBackend> = Arc::new(HashingEmbedder::new(384).unwrap());
        let handle = ready_handle(embedder.as_ref(), PROFILE, 500);
        let retriever =
            Retriever::new(embedder, handle, &RagSettings::default()).with_limits(3, 0.99);
        assert_eq!(retriever.context_for("Where does Satvik work?"), "");
    }

    #[test]
    fn test_max_threshold_rejects_near_duplicates() {
        let embedder: Arc<dyn EmbedderBackend> = Arc::new(HashingEmbedder::new(384).unwrap());
        let handle = ready_handle(embedder.as_ref(), MULTI_CHUNK_PROFILE, 44);
        assert_eq!(handle.current().unwrap().len(), 3);
        let retriever =
            Retriever::new(embedder, handle, &RagSettings::default()).with_limits(3, 1.0);

        for query in [
            "He works at DRDO. Satvik is an AI engineer.",
            "DRDO AT WORKS HE ENGINEER AI AN IS SATVIK",
            "satvik is an ai engineer he works at drdo",
            "satvik is an ai engineer. he works at drdo. ",
            "Satvik is an AI engineer.",
            "He writes Rust and Python",
            "Satvik is an AI engineer. He works at DRDO. He writes Rust",
        ] {
            assert_eq!(retriever.context_for(query), "", "query {:?}", query);
        }
    }

    #[test]
    fn test_max_threshold_keeps_identical_chunk() {
        let embedder: Arc<dyn EmbedderBackend> = Arc::new(HashingEmbedder::new(384).unwrap());
        let handle = ready_handle(embedder.as_ref(), MULTI_CHUNK_PROFILE, 44);
        let retriever =
            Retriever::new(embedder, handle, &RagSettings::default()).with_limits(3, 1.0);

        let chunk = "Satvik is an AI engineer. He works at DRDO. ";
        assert_eq!(retriever.context_for(chunk), chunk);
    }

    #[test]
    fn test_context_joins_hits_in_score_order() {
        let embedder: Arc<dyn EmbedderBackend> = Arc::new(HashingEmbedder::new(384).unwrap());
        // Each 10-char window becomes its own chunk.
        let handle = ready_handle(embedder.as_ref(), "drdo drdo alpha beta", 10);
        let retriever =
            Retriever::new(embedder, handle.clone(), &RagSettings::default()).with_limits(2, 0.0);

        let hits = retriever.search("drdo");
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
        let expected = format!("{}{}{}", hits[0].chunk.text, CONTEXT_DELIMITER, hits[1].chunk.text);
        assert_eq!(retriever.context_for("drdo"), expected);
        assert_eq!(hits[0].chunk.text, "drdo drdo ");
    }

    #[test]
    fn test_uninitialized_index_gives_empty_context() {
        let embedder: Arc<dyn EmbedderBackend> = Arc::new(HashingEmbedder::new(64).unwrap());
        let retriever = Retriever::new(embedder, Arc::new(IndexHandle::new()), &RagSettings::default());
        assert!(retriever.search("anything").is_empty());
        assert_eq!(retriever.context_for("anything"), "");
    }

    #[test]
    fn test_embedding_failure_gives_empty_context() {
        let hashing = HashingEmbedder::new(64).unwrap();
        let handle = ready_handle(&hashing, PROFILE, 500);
        let broken: Arc<dyn EmbedderBackend> = Arc::new(UnavailableEmbedder::new(64, "no model"));
        let retriever = Retriever::new(broken, handle, &RagSettings::default());
        assert_eq!(retriever.context_for("Where does Satvik work?"), "");
    }
}
