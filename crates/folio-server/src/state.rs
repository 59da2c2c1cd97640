//! Shared application state.

use std::sync::Arc;

use tracing::{info, warn};

use folio_chat::{LLMConfig, LlmClient};
use folio_core::{FolioConfig, Result};
use folio_infer::EmbedderBackend;
use folio_protocol::SecurityGuardrails;
use folio_runtime::{ChatOrchestrator, IndexManager, Retriever};
use folio_store::{IndexHandle, IndexStore};

use crate::blog::{BlogFeed, JsonFileFeed, BLOG_FEED_FILE};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: FolioConfig,
    pub index: IndexManager,
    pub orchestrator: ChatOrchestrator,
    pub guardrails: SecurityGuardrails,
    pub blog_feed: Option<Arc<dyn BlogFeed>>,
}

impl AppState {
    /// Wire up the components. The index starts uninitialized; call
    /// `index.load_or_build()` to install one.
    pub fn new(config: FolioConfig, llm: LlmClient, embedder: Arc<dyn EmbedderBackend>) -> Self {
        let handle = Arc::new(IndexHandle::new());

        let store = match IndexStore::open(&config.data_paths.index_dir) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!("Index persistence disabled: {}", e);
                None
            }
        };

        let index = IndexManager::new(
            embedder.clone(),
            handle.clone(),
            store,
            config.data_paths.personal_info.clone(),
            config.rag,
        );
        let retriever = Retriever::new(embedder, handle, &config.rag);
        let orchestrator = ChatOrchestrator::new(retriever, Arc::new(llm));

        let feed_path = config.data_paths.root.join(BLOG_FEED_FILE);
        let blog_feed: Option<Arc<dyn BlogFeed>> = if feed_path.exists() {
            info!("Serving blog posts from {}", feed_path.display());
            Some(Arc::new(JsonFileFeed::new(feed_path)))
        } else {
            None
        };

        Self {
            config,
            index,
            orchestrator,
            guardrails: SecurityGuardrails::default(),
            blog_feed,
        }
    }

    /// Build state from resolved configuration, creating the embedder and
    /// LLM client.
    pub fn from_config(config: FolioConfig, llm_config: LLMConfig) -> Result<Self> {
        let embedder = folio_infer::create_embedder(
            config.embedding_backend,
            &config.data_paths.model_dir,
            config.embedding_dim,
        )?;
        info!(
            "LLM provider: {}, model: {}",
            llm_config.provider, llm_config.model
        );
        let llm = LlmClient::new(llm_config)?;
        Ok(Self::new(config, llm, embedder))
    }

    pub fn llm(&self) -> &LlmClient {
        self.orchestrator.llm()
    }

    pub fn profile_name(&self) -> &str {
        &self.llm().config().profile_name
    }
}
