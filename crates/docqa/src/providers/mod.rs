//! Provider abstractions for embeddings and LLM
//!
//! Trait-based so the pipeline can switch between the Gemini API, a local
//! Ollama server, and the offline hashing embedder.

pub mod embedding;
pub mod gemini;
pub mod hash;
pub mod llm;
pub mod ollama;

use std::sync::Arc;

use crate::config::{BackendProvider, RagConfig};
use crate::error::{Error, Result};

pub use embedding::{EmbeddingGateway, EmbeddingProvider};
pub use gemini::{GeminiApi, GeminiClient, GeminiEmbedder};
pub use hash::HashEmbedder;
pub use llm::LlmProvider;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm};

/// Embedding and generation providers selected by configuration
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn LlmProvider>,
}

impl Providers {
    /// Build the providers for `config.llm.backend`.
    ///
    /// The offline backend embeds with `HashEmbedder` and generates with the
    /// local Ollama server, so a fully local setup needs no API key.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        match config.llm.backend {
            BackendProvider::Gemini => {
                let api = Arc::new(GeminiApi::new(&config.llm)?);
                Ok(Self {
                    embedder: Arc::new(GeminiEmbedder::new(api.clone(), &config.embeddings)),
                    llm: Arc::new(GeminiClient::new(api, &config.llm)),
                })
            }
            BackendProvider::Ollama => {
                let client = Arc::new(OllamaClient::new(&config.llm)?);
                Ok(Self {
                    embedder: Arc::new(OllamaEmbedder::new(client.clone(), &config.embeddings)),
                    llm: Arc::new(OllamaLlm::new(client, &config.llm)),
                })
            }
            BackendProvider::Offline => {
                let client = Arc::new(OllamaClient::new(&config.llm)?);
                Ok(Self {
                    embedder: Arc::new(HashEmbedder::new(config.embeddings.dimensions)),
                    llm: Arc::new(OllamaLlm::new(client, &config.llm)),
                })
            }
        }
    }

    /// Probe both providers, logging the ones that do not answer
    pub async fn check_health(&self) -> Result<()> {
        let embedder_ok = self.embedder.health_check().await.unwrap_or(false);
        let llm_ok = self.llm.health_check().await.unwrap_or(false);

        if !embedder_ok {
            tracing::warn!("Embedding provider '{}' is not reachable", self.embedder.name());
        }
        if !llm_ok {
            tracing::warn!(
                "LLM provider '{}' ({}) is not reachable",
                self.llm.name(),
                self.llm.model()
            );
        }

        if embedder_ok && llm_ok {
            Ok(())
        } else {
            Err(Error::internal("one or more providers are unreachable"))
        }
    }
}
