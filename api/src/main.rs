mod error;
mod query_payload;
mod rag_response;
mod routes;
mod state;
mod uploads;

use anyhow::{Context, Result};
use docqa::{Config, RagPipeline};
use state::AppState;
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment variables and logging
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    for dir in [&config.data_dir, &config.storage_dir] {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let state = AppState::new(RagPipeline::from_config(&config));
    match state.ensure_engine().await {
        Ok(Some(_)) => log::info!("RAG system initialized successfully"),
        Ok(None) => log::warn!(
            "No PDF files found in {}. Upload documents to initialize the system.",
            config.data_dir.display()
        ),
        Err(e) => log::error!("Failed to initialize RAG system: {}", e),
    }

    let app = routes::router(state).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    log::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
