//! Embedding provider trait and the batching gateway in front of it

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Trait for generating text embeddings
///
/// Implementations:
/// - `GeminiEmbedder`: Gemini API (text-embedding-004)
/// - `OllamaEmbedder`: Local Ollama server (nomic-embed-text)
/// - `HashEmbedder`: offline feature hashing
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order
    ///
    /// Default implementation calls `embed` sequentially.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Embedding dimensions (e.g. 768 for text-embedding-004)
    fn dimensions(&self) -> usize;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Bounded, order-checked access to an embedding provider
#[derive(Clone)]
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    timeout: Duration,
}

impl EmbeddingGateway {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        Self {
            provider,
            batch_size: config.batch_size.max(1),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Embed a query
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        tokio::time::timeout(self.timeout, self.provider.embed(text))
            .await
            .map_err(|_| self.timed_out())?
            .map_err(into_embedding_error)
    }

    /// Embed one batch (at most `batch_size` texts); output order matches input
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = tokio::time::timeout(self.timeout, self.provider.embed_batch(texts))
            .await
            .map_err(|_| self.timed_out())?
            .map_err(into_embedding_error)?;

        if vectors.len() != texts.len() {
            return Err(Error::embedding(format!(
                "{} returned {} embeddings for {} texts",
                self.provider.name(),
                vectors.len(),
                texts.len()
            )));
        }

        Ok(vectors)
    }

    fn timed_out(&self) -> Error {
        Error::embedding(format!(
            "{} did not respond within {}s",
            self.provider.name(),
            self.timeout.as_secs()
        ))
    }
}

/// Transport failures become embedding service errors; typed errors pass through
fn into_embedding_error(err: Error) -> Error {
    match err {
        Error::Http(e) => Error::embedding(e.to_string()),
        other => other,
    }
}
