//! Folio server: HTTP surface over the RAG chat pipeline.

pub mod blog;
pub mod client;
pub mod routes;
pub mod state;

pub use blog::{BlogFeed, BlogPost, JsonFileFeed};
pub use routes::build_router;
pub use state::AppState;
