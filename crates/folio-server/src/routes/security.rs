//! Guardrail statistics and manual unblock.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use folio_protocol::SecurityStats;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/security/stats", get(stats))
        .route("/security/reset/{ip}", post(reset_ip))
}

/// GET /security/stats
async fn stats(State(state): State<Arc<AppState>>) -> Json<SecurityStats> {
    Json(state.guardrails.stats())
}

/// POST /security/reset/{ip}: unblock an IP.
async fn reset_ip(
    State(state): State<Arc<AppState>>,
    Path(ip): Path<String>,
) -> Json<serde_json::Value> {
    let message = if state.guardrails.reset_ip(&ip) {
        format!("IP {} unblocked successfully", ip)
    } else {
        format!("IP {} was not blocked", ip)
    };
    Json(serde_json::json!({ "message": message }))
}
