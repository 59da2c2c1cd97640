//! Source document and index rebuild routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{error, info};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/personal-info", get(personal_info))
        .route("/rebuild-index", post(rebuild_index))
}

/// GET /personal-info: raw document text and section titles.
async fn personal_info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.index.load_document().await {
        Ok(document) => {
            let sections: Vec<&str> = document
                .sections()
                .iter()
                .filter_map(|s| s.title.as_deref())
                .collect();
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "personal_info": document.text(),
                    "sections": sections,
                })),
            )
        }
        Err(e) => {
            error!("Failed to load personal info: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": format!("Error loading personal info: {}", e) })),
            )
        }
    }
}

/// POST /rebuild-index: rebuild from the document and swap it in.
async fn rebuild_index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.index.rebuild().await {
        Ok(report) => {
            info!(
                "Index rebuilt: {} chunks, dim={}, persisted={}",
                report.chunks, report.dimension, report.persisted
            );
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "message": "RAG index rebuilt successfully",
                    "chunks": report.chunks,
                    "dimension": report.dimension,
                    "persisted": report.persisted,
                })),
            )
        }
        Err(e) => {
            error!("Index rebuild failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": format!("Error rebuilding index: {}", e) })),
            )
        }
    }
}
