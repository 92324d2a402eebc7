//! Document Q&A server binary
//!
//! Run with: cargo run -p docqa --bin docqa-server

use std::sync::Arc;

use docqa::{
    config::RagConfig,
    pipeline::Orchestrator,
    providers::Providers,
    server::{state::AppState, DocQaServer},
    storage::{DocumentRegistry, DocumentStore},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docqa=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RagConfig::load()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Backend: {:?}", config.llm.backend);
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!("  - Embedding dimensions: {}", config.embeddings.dimensions);
    tracing::info!("  - LLM model: {}", config.llm.generate_model);
    tracing::info!(
        "  - Chunking: {} chars, {} overlap",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - Documents: {}", config.storage.docs_dir.display());

    let providers = Providers::from_config(&config)?;
    if providers.check_health().await.is_err() {
        tracing::warn!("Starting anyway; queries will fail until the providers are reachable");
    }

    let registry = DocumentRegistry::load(&config.storage.registry_path);
    let store = DocumentStore::new(&config.storage.docs_dir)?;

    let orchestrator = Arc::new(
        Orchestrator::new(&config, providers.embedder, providers.llm)?
            .with_storage(registry, store),
    );

    // Rebuild the index from stored originals in the background
    let bootstrap = orchestrator.clone();
    tokio::spawn(async move {
        if let Err(e) = bootstrap.bootstrap().await {
            tracing::error!("Startup indexing failed: {}", e);
        }
    });

    let server = DocQaServer::new(AppState::new(config, orchestrator));

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  Status: http://{}/status", server.address());
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
