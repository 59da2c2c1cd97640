//! Chat orchestrator: retrieval then generation for one request.

use std::sync::Arc;

use tracing::{debug, warn};

use folio_chat::{ConversationTurn, GenerationRequest, LlmClient};

use crate::retriever::Retriever;
use crate::types::ChatOutcome;

pub struct ChatOrchestrator {
    retriever: Retriever,
    llm: Arc<LlmClient>,
}

impl ChatOrchestrator {
    pub fn new(retriever: Retriever, llm: Arc<LlmClient>) -> Self {
        Self { retriever, llm }
    }

    pub fn llm(&self) -> &LlmClient {
        &self.llm
    }

    /// Answer `query`. Never fails: retrieval problems yield an empty
    /// context and provider problems fall back to the mock responder.
    pub async fn chat(&self, query: &str, history: &[ConversationTurn]) -> ChatOutcome {
        let retriever = self.retriever.clone();
        let owned_query = query.to_string();
        let context = match tokio::task::spawn_blocking(move || retriever.context_for(&owned_query)).await {
            Ok(context) => context,
            Err(e) => {
                warn!("Retrieval task failed, continuing without context: {}", e);
                String::new()
            }
        };
        debug!("Context for query: {} chars", context.len());

        let request = GenerationRequest {
            question: query.to_string(),
            context,
            history: history.to_vec(),
        };
        let generation = self.llm.respond(&request).await;

        ChatOutcome {
            response: generation.text,
            context_used: request.context,
            provider: generation.provider,
            fell_back: generation.fell_back,
        }
    }
}
