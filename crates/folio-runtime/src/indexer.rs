//! Index construction: document → chunks → embeddings → installed snapshot.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use folio_core::{Error, RagSettings, Result};
use folio_infer::EmbedderBackend;
use folio_ingest::{clean_text, Chunker, Document};
use folio_store::{IndexHandle, IndexStore, VectorIndex};

use crate::types::{BuildReport, IndexSource};

/// Chunk and embed `document` into a fresh snapshot.
///
/// Chunk text is normalized before embedding; the stored chunk keeps the
/// original text.
pub fn build_index(
    document: &Document,
    chunker: &Chunker,
    embedder: &dyn EmbedderBackend,
) -> Result<VectorIndex> {
    let chunks = chunker.chunk(document.text());
    let cleaned: Vec<String> = chunks.iter().map(|c| clean_text(&c.text)).collect();
    let texts: Vec<&str> = cleaned.iter().map(String::as_str).collect();

    let embeddings = embedder
        .embed_batch(&texts)?
        .into_iter()
        .map(|r| r.embedding)
        .collect();

    VectorIndex::build(chunks, embeddings, embedder.dimension(), embedder.model_name())
}

/// Owns the live index and everything needed to rebuild it.
pub struct IndexManager {
    embedder: Arc<dyn EmbedderBackend>,
    handle: Arc<IndexHandle>,
    store: Option<Arc<IndexStore>>,
    document_path: PathBuf,
    rag: RagSettings,
    /// Serializes rebuilds.
    rebuild_lock: Mutex<()>,
}

impl IndexManager {
    pub fn new(
        embedder: Arc<dyn EmbedderBackend>,
        handle: Arc<IndexHandle>,
        store: Option<Arc<IndexStore>>,
        document_path: impl Into<PathBuf>,
        rag: RagSettings,
    ) -> Self {
        Self {
            embedder,
            handle,
            store,
            document_path: document_path.into(),
            rag,
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn handle(&self) -> &Arc<IndexHandle> {
        &self.handle
    }

    /// Read the source document (placeholder when the file is missing).
    pub async fn load_document(&self) -> Result<Document> {
        let path = self.document_path.clone();
        tokio::task::spawn_blocking(move || Document::load(&path))
            .await
            .map_err(|e| Error::Internal(format!("document load task failed: {}", e)))?
    }

    /// Rebuild from the document, install, then persist.
    ///
    /// On error the previous generation keeps serving. A persistence failure
    /// is not an error: the new index is installed and `persisted` is false.
    pub async fn rebuild(&self) -> Result<BuildReport> {
        let _guard = self.rebuild_lock.lock().await;

        let embedder = self.embedder.clone();
        let path = self.document_path.clone();
        let rag = self.rag;
        let index = tokio::task::spawn_blocking(move || {
            let document = Document::load(&path)?;
            let chunker = Chunker::new(rag.chunk_size, rag.chunk_overlap)?;
            build_index(&document, &chunker, embedder.as_ref())
        })
        .await
        .map_err(|e| Error::Internal(format!("index build task failed: {}", e)))??;

        let index = Arc::new(index);
        self.handle.install(index.clone());
        info!(
            "Installed new index: {} chunks, dim={}, model={}",
            index.len(),
            index.dimension(),
            index.model_name()
        );

        let persisted = self.persist(index.clone()).await;

        Ok(BuildReport {
            chunks: index.len(),
            dimension: index.dimension(),
            model_name: index.model_name().to_string(),
            source: IndexSource::Built,
            persisted,
        })
    }

    /// Startup path: install the persisted index when it was built by the
    /// active embedder, otherwise rebuild from the document.
    pub async fn load_or_build(&self) -> Result<BuildReport> {
        if let Some(store) = self.store.clone() {
            let loaded = tokio::task::spawn_blocking(move || store.load())
                .await
                .map_err(|e| Error::Internal(format!("index load task failed: {}", e)))?;

            match loaded {
                Ok(Some(index))
                    if index.model_name() == self.embedder.model_name()
                        && index.dimension() == self.embedder.dimension() =>
                {
                    let report = BuildReport {
                        chunks: index.len(),
                        dimension: index.dimension(),
                        model_name: index.model_name().to_string(),
                        source: IndexSource::Loaded,
                        persisted: true,
                    };
                    self.handle.install(Arc::new(index));
                    return Ok(report);
                }
                Ok(Some(index)) => info!(
                    "Persisted index was built by {} (dim={}), rebuilding for {} (dim={})",
                    index.model_name(),
                    index.dimension(),
                    self.embedder.model_name(),
                    self.embedder.dimension()
                ),
                Ok(None) => info!("No persisted index, building a new one"),
                Err(e) => warn!("Could not read persisted index, rebuilding: {}", e),
            }
        }

        self.rebuild().await
    }

    async fn persist(&self, index: Arc<VectorIndex>) -> bool {
        let Some(store) = self.store.clone() else {
            return false;
        };
        match tokio::task::spawn_blocking(move || store.save(&index)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Index installed but not persisted: {}", e);
                false
            }
            Err(e) => {
                warn!("Index persistence task failed: {}", e);
                false
            }
        }
    }
}
