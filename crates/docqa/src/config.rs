//! Configuration for the document Q&A service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::retrieval::DistanceMetric;

/// Environment variable naming the TOML config file
pub const CONFIG_ENV: &str = "DOCQA_CONFIG";

const GEMINI_EMBED_MODEL: &str = "text-embedding-004";
const GEMINI_GENERATE_MODEL: &str = "gemini-2.5-pro";
const OLLAMA_EMBED_MODEL: &str = "nomic-embed-text";
const OLLAMA_GENERATE_MODEL: &str = "llama3.2";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Prompt and generation configuration
    pub generation: GenerationConfig,
    /// Model backend configuration
    pub llm: LlmConfig,
    /// Retry policy for external calls
    pub pipeline: PipelineConfig,
    /// Where uploaded files and the registry live
    pub storage: StorageConfig,
}

impl RagConfig {
    /// Load configuration: TOML file (if any), then environment overrides, then validation.
    ///
    /// The file path comes from `DOCQA_CONFIG`; otherwise `docqa.toml` in the
    /// working directory is used when present.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .ok()
            .or_else(|| {
                let default = PathBuf::from("docqa.toml");
                default.exists().then_some(default)
            });

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))?;
        config.apply_backend_defaults();
        Ok(config)
    }

    /// Swap Gemini model names left at their defaults for Ollama ones
    pub fn apply_backend_defaults(&mut self) {
        if self.llm.backend == BackendProvider::Gemini {
            return;
        }
        if self.llm.generate_model == GEMINI_GENERATE_MODEL {
            self.llm.generate_model = OLLAMA_GENERATE_MODEL.to_string();
        }
        if self.llm.backend == BackendProvider::Ollama
            && self.embeddings.model == GEMINI_EMBED_MODEL
        {
            self.embeddings.model = OLLAMA_EMBED_MODEL.to_string();
        }
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self) {
        if let Some(key) = std::env::var("GEMINI_API_KEY")
            .ok()
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .filter(|k| !k.is_empty())
        {
            self.llm.api_key = Some(key);
        }
        if let Ok(host) = std::env::var("DOCQA_HOST") {
            self.server.host = host;
        }
        if let Some(port) = std::env::var("DOCQA_PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Ok(dir) = std::env::var("DOCQA_DOCS_DIR") {
            self.storage.docs_dir = PathBuf::from(dir);
        }
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;

        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be > 0".to_string()));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::Config("embeddings.batch_size must be > 0".to_string()));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be > 0".to_string()));
        }
        if self.generation.timeout_secs == 0 {
            return Err(Error::Config("generation.timeout_secs must be > 0".to_string()));
        }
        if self.llm.backend != BackendProvider::Gemini
            && self.llm.generate_model.starts_with("gemini")
        {
            return Err(Error::Config(format!(
                "llm.generate_model '{}' is a Gemini model but llm.backend is {:?}",
                self.llm.generate_model, self.llm.backend
            )));
        }
        if self.llm.backend == BackendProvider::Ollama && self.embeddings.model == GEMINI_EMBED_MODEL
        {
            return Err(Error::Config(format!(
                "embeddings.model '{}' is a Gemini model but llm.backend is Ollama",
                self.embeddings.model
            )));
        }
        if self.generation.max_prompt_chars < self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "generation.max_prompt_chars ({}) must be at least chunking.chunk_size ({})",
                self.generation.max_prompt_chars, self.chunking.chunk_size
            )));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

/// Which service produces embeddings and completions
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendProvider {
    /// Google Gemini API
    #[default]
    Gemini,
    /// Local Ollama server
    Ollama,
    /// Offline hashing embedder with local Ollama generation
    Offline,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model to use
    pub model: String,
    /// Embedding dimensions (768 for text-embedding-004)
    pub dimensions: usize,
    /// Texts per embedding request
    pub batch_size: usize,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: GEMINI_EMBED_MODEL.to_string(),
            dimensions: 768,
            batch_size: 32,
            timeout_secs: 30,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl ChunkingConfig {
    /// Overlap must be strictly smaller than the window
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be > 0".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks to retrieve
    pub top_k: usize,
    /// Minimum score for a chunk to be used
    pub score_threshold: f32,
    /// Similarity metric of the vector index
    pub metric: DistanceMetric,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            score_threshold: 0.25,
            metric: DistanceMetric::Cosine,
        }
    }
}

/// Prompt budget and generation timeout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Maximum prompt length in characters
    pub max_prompt_chars: usize,
    /// Timeout for one model call in seconds
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_prompt_chars: 12_000,
            timeout_secs: 60,
        }
    }
}

/// Model backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend provider
    pub backend: BackendProvider,
    /// Gemini API key
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Gemini API base URL
    pub gemini_base_url: String,
    /// Ollama base URL
    pub ollama_base_url: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Maximum output tokens
    pub max_output_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: BackendProvider::Gemini,
            api_key: None,
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            generate_model: GEMINI_GENERATE_MODEL.to_string(),
            temperature: 0.2,
            max_output_tokens: 2048,
        }
    }
}

/// Retry policy for embedding and generation calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Backoff before the first retry, doubled on each attempt
    pub retry_base_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_base_delay_ms: 500,
        }
    }
}

/// Storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Uploaded originals
    pub docs_dir: PathBuf,
    /// Document registry file
    pub registry_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docqa");

        Self {
            docs_dir: base.join("docs"),
            registry_path: base.join("documents.json"),
        }
    }
}
