//! Service info and health routes.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

/// GET /: service name, version and endpoint map.
async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Folio personal-info chatbot API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "chat": "/chat",
            "health": "/health",
            "personal_info": "/personal-info",
            "rebuild_index": "/rebuild-index",
            "medium_blogs": "/medium-blogs",
            "security_stats": "/security/stats",
        },
    }))
}

/// GET /health: index and provider readiness.
///
/// `index` describes the live generation, `null` before the first build.
async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let handle = state.index.handle();
    let rag_ready = handle.is_ready();
    let index = handle.current().map(|index| index.summary());
    let llm_ready = state.llm().check_ready().await;
    let (status, message) = if rag_ready && llm_ready {
        ("healthy", "All systems operational")
    } else {
        ("unhealthy", "Some systems are not ready")
    };

    Json(serde_json::json!({
        "status": status,
        "rag_ready": rag_ready,
        "llm_ready": llm_ready,
        "message": message,
        "index": index,
    }))
}
