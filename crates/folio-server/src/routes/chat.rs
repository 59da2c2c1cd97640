//! Chat route: guardrails, retrieval and generation.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use folio_chat::ConversationTurn;
use folio_protocol::{format_response, validate_question};

use crate::client::ClientInfo;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(chat))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    /// Retrieved context, empty when nothing cleared the threshold.
    pub context_used: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    fn refused(response: String, error: String) -> Json<Self> {
        Json(Self {
            response,
            context_used: String::new(),
            error: Some(error),
        })
    }
}

/// POST /chat: answer one question about the profile.
///
/// Refusals and provider failures are reported in the body with status 200.
async fn chat(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(req): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let start = Instant::now();
    let name = state.profile_name().to_string();

    let message = if state.config.security_enabled {
        match state.guardrails.validate_request(
            &req.message,
            req.conversation_history.len(),
            &client.ip,
            client.user_agent.as_deref(),
        ) {
            Ok(screened) => screened.message,
            Err(reason) => {
                warn!("Chat request from {} refused: {}", client.ip, reason);
                return ChatResponse::refused(
                    format!(
                        "I'm sorry, but I cannot process that request. Please ask a valid question about {}.",
                        name
                    ),
                    reason.to_string(),
                );
            }
        }
    } else {
        req.message.trim().to_string()
    };

    if !validate_question(&message) {
        return ChatResponse::refused(
            format!(
                "Please ask a valid question about {} (at least 3 characters).",
                name
            ),
            "Invalid question format".to_string(),
        );
    }

    let outcome = state
        .orchestrator
        .chat(&message, &req.conversation_history)
        .await;

    info!(
        "Chat answered by {} (fallback={}, context={} chars) in {}ms",
        outcome.provider,
        outcome.fell_back,
        outcome.context_used.len(),
        start.elapsed().as_millis()
    );

    Json(ChatResponse {
        response: format_response(&outcome.response),
        context_used: outcome.context_used,
        error: None,
    })
}
