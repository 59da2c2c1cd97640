//! Folio: personal-info RAG chatbot server.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use folio_chat::LLMConfig;
use folio_core::FolioConfig;
use folio_server::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = FolioConfig::from_env()?;
    let llm_config = LLMConfig::from_env()?;

    config.data_paths.ensure_dirs()?;
    info!("Data directory: {}", config.data_paths.root.display());

    let addr = config.bind_addr();
    let state = Arc::new(AppState::from_config(config, llm_config)?);

    // A missing index is not fatal: /health reports it and /rebuild-index
    // can install one later.
    match state.index.load_or_build().await {
        Ok(report) => info!(
            "Index ready ({:?}): {} chunks, dim={}, model={}",
            report.source, report.chunks, report.dimension, report.model_name
        ),
        Err(e) => error!("Index not built: {}", e),
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Folio server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
