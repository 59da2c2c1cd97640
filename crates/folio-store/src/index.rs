//! Exact cosine-similarity index over chunk embeddings.
//!
//! A `VectorIndex` is an immutable snapshot: built once from scratch and
//! never mutated. `IndexHandle` is the single swap point shared by request
//! handlers; a rebuild constructs a whole new snapshot and installs it in one
//! step, so readers holding the previous `Arc` never see partial state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, ArrayView1};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, warn};

use folio_core::{Error, Result};
use folio_ingest::Chunk;

/// A search result: chunk plus cosine similarity in [-1, 1].
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

/// Lightweight description of an index generation.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub chunks: usize,
    pub dimension: usize,
    pub model_name: String,
    pub built_at: DateTime<Utc>,
}

/// Immutable index snapshot.
#[derive(Debug)]
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    /// L2-normalized embeddings, shape (N, dim). Zero vectors stay zero.
    matrix: Array2<f32>,
    model_name: String,
    built_at: DateTime<Utc>,
}

impl VectorIndex {
    /// Build a snapshot from chunks and their embeddings (same order).
    ///
    /// Every embedding must have `dimension` components.
    pub fn build(
        chunks: Vec<Chunk>,
        embeddings: Vec<Array1<f32>>,
        dimension: usize,
        model_name: impl Into<String>,
    ) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(Error::Internal(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        let mut matrix = Array2::<f32>::zeros((chunks.len(), dimension));
        for (i, embedding) in embeddings.iter().enumerate() {
            if embedding.len() != dimension {
                return Err(Error::DimensionMismatch {
                    expected: dimension,
                    found: embedding.len(),
                });
            }
            let norm = embedding.dot(embedding).sqrt();
            if norm > 1e-9 {
                matrix.row_mut(i).assign(&(embedding / norm));
            }
        }

        debug!("Built vector index: {} rows, dim={}", chunks.len(), dimension);

        Ok(Self {
            chunks,
            matrix,
            model_name: model_name.into(),
            built_at: Utc::now(),
        })
    }

    /// Override the build timestamp (used when loading a persisted index).
    pub fn with_built_at(mut self, built_at: DateTime<Utc>) -> Self {
        self.built_at = built_at;
        self
    }

    /// Up to `k` most similar chunks, best first; ties by ascending chunk id.
    ///
    /// Returns an empty list for an empty index, `k == 0`, a zero query or a
    /// query of the wrong dimension.
    pub fn search(&self, query: &Array1<f32>, k: usize) -> Vec<SearchHit> {
        if k == 0 || self.chunks.is_empty() {
            return Vec::new();
        }
        if query.len() != self.dimension() {
            warn!(
                "Query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension()
            );
            return Vec::new();
        }

        let q_norm = query.dot(query).sqrt();
        if q_norm < 1e-9 {
            return Vec::new();
        }
        let q = query / q_norm;

        // (N, dim) @ (dim,) → (N,)
        let similarities = self.matrix.dot(&q);

        let mut ranked: Vec<(usize, f32)> = similarities.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| self.chunks[a.0].id.cmp(&self.chunks[b.0].id))
        });
        ranked.truncate(k);

        ranked
            .into_iter()
            .map(|(i, score)| SearchHit {
                chunk: self.chunks[i].clone(),
                score: score.clamp(-1.0, 1.0),
            })
            .collect()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Normalized embedding of the i-th chunk.
    pub fn embedding(&self, i: usize) -> ArrayView1<'_, f32> {
        self.matrix.row(i)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn summary(&self) -> IndexSummary {
        IndexSummary {
            chunks: self.len(),
            dimension: self.dimension(),
            model_name: self.model_name.clone(),
            built_at: self.built_at,
        }
    }
}

/// Shared reference to the live index generation.
#[derive(Default)]
pub struct IndexHandle {
    current: RwLock<Option<Arc<VectorIndex>>>,
}

impl IndexHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the live index, if one has been installed.
    pub fn current(&self) -> Option<Arc<VectorIndex>> {
        self.current.read().clone()
    }

    /// Replace the live index. Returns the previous generation.
    pub fn install(&self, index: Arc<VectorIndex>) -> Option<Arc<VectorIndex>> {
        self.current.write().replace(index)
    }

    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }

    /// Search the live index. Uninitialized → empty result.
    pub fn search(&self, query: &Array1<f32>, k: usize) -> Vec<SearchHit> {
        match self.current() {
            Some(index) => index.search(query, k),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn chunk(id: i64, text: &str) -> Chunk {
        Chunk {
            id,
            text: text.to_string(),
            start_offset: 0,
            end_offset: text.len(),
        }
    }

    fn sample_index() -> VectorIndex {
        VectorIndex::build(
            vec![chunk(0, "x axis"), chunk(1, "y axis"), chunk(2, "diagonal"), chunk(3, "x again")],
            vec![
                array![1.0, 0.0],
                array![0.0, 2.0],
                array![1.0, 1.0],
                array![3.0, 0.0],
            ],
            2,
            "test",
        )
        .unwrap()
    }

    #[test]
    fn test_search_orders_by_score_then_id() {
        let index = sample_index();
        let hits = index.search(&array![1.0, 0.0], 4);
        let ids: Vec<i64> = hits.iter().map(|h| h.chunk.id).collect();
        // Chunks 0 and 3 tie at 1.0; lower id first.
        assert_eq!(ids, vec![0, 3, 2, 1]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[2].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!(hits[3].score.abs() < 1e-6);
    }

    #[test]
    fn test_search_respects_k_and_range() {
        let index = sample_index();
        for k in 0..6 {
            let hits = index.search(&array![0.3, -0.7], k);
            assert!(hits.len() <= k);
            for pair in hits.windows(2) {
                assert!(pair[0].score >= pair[1].score);
            }
            assert!(hits.iter().all(|h| (-1.0..=1.0).contains(&h.score)));
        }
    }

    #[test]
    fn test_search_edge_cases_return_empty() {
        let index = sample_index();
        assert!(index.search(&array![0.0, 0.0], 3).is_empty());
        assert!(index.search(&array![1.0, 0.0, 0.0], 3).is_empty());

        let empty = VectorIndex::build(Vec::new(), Vec::new(), 2, "test").unwrap();
        assert!(empty.search(&array![1.0, 0.0], 3).is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = VectorIndex::build(
            vec![chunk(0, "a"), chunk(1, "b")],
            vec![array![1.0, 0.0], array![1.0, 0.0, 0.0]],
            2,
            "test",
        );
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch {
                expected: 2,
                found: 3
            })
        ));
    }

    #[test]
    fn test_count_mismatch() {
        let result = VectorIndex::build(vec![chunk(0, "a")], Vec::new(), 2, "test");
        assert!(result.is_err());
    }

    #[test]
    fn test_handle_swap() {
        let handle = IndexHandle::new();
        assert!(!handle.is_ready());
        assert!(handle.search(&array![1.0, 0.0], 3).is_empty());

        let first = Arc::new(sample_index());
        assert!(handle.install(first.clone()).is_none());
        assert!(handle.is_ready());

        // A reader holding the old snapshot keeps it across a swap.
        let reader = handle.current().unwrap();
        let second = Arc::new(
            VectorIndex::build(vec![chunk(0, "only")], vec![array![0.0, 1.0]], 2, "test")
                .unwrap(),
        );
        let previous = handle.install(second).unwrap();
        assert!(Arc::ptr_eq(&previous, &first));
        assert_eq!(reader.len(), 4);
        assert_eq!(handle.current().unwrap().len(), 1);
    }
}
