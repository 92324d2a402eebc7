//! Test doubles shared by the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use docqa::config::RagConfig;
use docqa::pipeline::{Orchestrator, RetryPolicy};
use docqa::providers::{EmbeddingProvider, HashEmbedder, LlmProvider};
use docqa::{Error, Result, SourceDocument};

pub const DIMENSIONS: usize = 4096;

/// Returns a fixed reply and keeps every prompt it was sent
pub struct RecordingLlm {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl RecordingLlm {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for RecordingLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "recording"
    }

    fn model(&self) -> &str {
        "test"
    }
}

/// Never answers within any reasonable timeout
pub struct StalledLlm;

#[async_trait]
impl LlmProvider for StalledLlm {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(String::new())
    }

    fn name(&self) -> &str {
        "stalled"
    }

    fn model(&self) -> &str {
        "test"
    }
}

/// Hash embedder whose batch calls wait for `release`
pub struct GatedEmbedder {
    inner: HashEmbedder,
    pub release: Arc<Notify>,
}

impl GatedEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: HashEmbedder::new(DIMENSIONS),
            release: Arc::new(Notify::new()),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for GatedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.inner.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.release.notified().await;
        Ok(texts.iter().map(|t| self.inner.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn name(&self) -> &str {
        "gated"
    }
}

/// Hash embedder that misbehaves on marked texts: `drift` yields 3-dimensional
/// vectors and `unreachable` fails like a dead service
pub struct DriftingEmbedder {
    inner: HashEmbedder,
}

impl DriftingEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: HashEmbedder::new(DIMENSIONS),
        })
    }

    fn vector(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains("unreachable") {
            return Err(Error::embedding("connection refused"));
        }
        if text.contains("drift") {
            return Ok(vec![1.0, 0.0, 0.0]);
        }
        Ok(self.inner.embed_text(text))
    }
}

#[async_trait]
impl EmbeddingProvider for DriftingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.vector(text)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.vector(t)).collect()
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn name(&self) -> &str {
        "drifting"
    }
}

pub fn test_config() -> RagConfig {
    let mut config = RagConfig::default();
    config.embeddings.dimensions = DIMENSIONS;
    config.retrieval.top_k = 1;
    config.retrieval.score_threshold = 0.1;
    config
}

pub fn orchestrator_with(
    config: &RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
) -> Orchestrator {
    Orchestrator::new(config, embedder, llm)
        .unwrap()
        .with_retry(RetryPolicy::none())
}

pub fn orchestrator(llm: Arc<dyn LlmProvider>) -> Orchestrator {
    orchestrator_with(
        &test_config(),
        Arc::new(HashEmbedder::new(DIMENSIONS)),
        llm,
    )
}

pub fn text_file(name: &str, text: &str) -> SourceDocument {
    SourceDocument::new(name, text.as_bytes().to_vec())
}

pub fn sky_and_grass() -> Vec<SourceDocument> {
    vec![
        text_file("sky.txt", "The sky is blue."),
        text_file("grass.txt", "The grass is green."),
    ]
}
