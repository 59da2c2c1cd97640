//! Blog posts from the optional feed.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tracing::error;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/medium-blogs", get(medium_blogs))
}

/// GET /medium-blogs: posts from the configured feed, `[]` without one.
async fn medium_blogs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(feed) = state.blog_feed.clone() else {
        return (StatusCode::OK, Json(serde_json::json!([])));
    };

    match tokio::task::spawn_blocking(move || feed.posts()).await {
        Ok(Ok(posts)) => (StatusCode::OK, Json(serde_json::json!(posts))),
        Ok(Err(e)) => {
            error!("Blog feed failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": format!("Error fetching blog posts: {}", e) })),
            )
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": format!("Blog feed task failed: {}", e) })),
        ),
    }
}
