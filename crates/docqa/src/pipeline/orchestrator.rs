//! Pipeline state machine tying ingestion, retrieval and generation together

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::{
    build_citations, format_answer_with_sources, GenerationGateway, PromptAssembler,
};
use crate::ingestion::{IngestPipeline, PreparedDocument};
use crate::providers::{EmbeddingGateway, EmbeddingProvider, LlmProvider};
use crate::retrieval::{DocumentEntries, Retriever, VectorIndex};
use crate::storage::{sanitize_filename, DocumentRegistry, DocumentStore, StagedFile};
use crate::types::{
    Answer, Document, FailedFile, IngestReport, SourceDocument, StatusResponse,
};

use super::retry::RetryPolicy;

/// Lifecycle of the document index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    /// Nothing indexed yet
    Empty,
    /// An ingestion or rebuild is running
    Indexing,
    /// Questions can be answered
    Ready,
    /// The last ingestion left nothing searchable
    Error,
}

impl PipelineState {
    /// Value reported by `/status`
    pub fn status_label(&self) -> &'static str {
        match self {
            Self::Empty => "checking",
            Self::Indexing => "initializing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Empty => "empty",
            Self::Indexing => "indexing",
            Self::Ready => "ready",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Documents that made it through parsing and embedding
struct Embedded {
    documents: Vec<Document>,
    entries: Vec<DocumentEntries>,
    sources: Vec<SourceDocument>,
    failed: Vec<FailedFile>,
    chunks: usize,
}

/// Drives ingestion and question answering over a shared index.
///
/// Ingestions, rebuilds and deletions are serialised; questions run
/// concurrently with each other and only read the index.
pub struct Orchestrator {
    pipeline: IngestPipeline,
    embeddings: EmbeddingGateway,
    index: Arc<VectorIndex>,
    retriever: Retriever,
    assembler: PromptAssembler,
    generator: GenerationGateway,
    retry: RetryPolicy,
    registry: DocumentRegistry,
    store: Option<DocumentStore>,
    state: RwLock<PipelineState>,
    last_error: RwLock<Option<String>>,
    state_tx: watch::Sender<PipelineState>,
    ingest_lock: Mutex<()>,
}

impl Orchestrator {
    /// Build an orchestrator with an in-memory registry and no stored originals
    pub fn new(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let index = Arc::new(VectorIndex::new(
            embedder.dimensions(),
            config.retrieval.metric,
        ));
        let embeddings = EmbeddingGateway::new(embedder, &config.embeddings);
        let retriever = Retriever::new(index.clone(), embeddings.clone(), &config.retrieval);
        let (state_tx, _) = watch::channel(PipelineState::Empty);

        Ok(Self {
            pipeline: IngestPipeline::from_config(&config.chunking)?,
            embeddings,
            index,
            retriever,
            assembler: PromptAssembler::from_config(&config.generation),
            generator: GenerationGateway::new(llm, &config.generation),
            retry: RetryPolicy::from_config(&config.pipeline),
            registry: DocumentRegistry::in_memory(),
            store: None,
            state: RwLock::new(PipelineState::Empty),
            last_error: RwLock::new(None),
            state_tx,
            ingest_lock: Mutex::new(()),
        })
    }

    /// Persist metadata in `registry` and originals in `store`
    pub fn with_storage(mut self, registry: DocumentRegistry, store: DocumentStore) -> Self {
        self.registry = registry;
        self.store = Some(store);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> PipelineState {
        *self.state.read()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state_tx.subscribe()
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Ingested documents, oldest first
    pub fn documents(&self) -> Vec<Document> {
        self.registry.list()
    }

    fn set_state(&self, next: PipelineState) {
        let prev = std::mem::replace(&mut *self.state.write(), next);
        if prev != next {
            tracing::info!("Pipeline state: {} -> {}", prev, next);
        }
        self.state_tx.send_replace(next);
    }

    /// Settle the state after an ingestion or rebuild attempt
    fn settle(&self, failure: Option<String>) {
        if self.index.is_ready() {
            *self.last_error.write() = None;
            self.set_state(PipelineState::Ready);
        } else {
            *self.last_error.write() = failure;
            self.set_state(PipelineState::Error);
        }
    }

    /// Snapshot for `/status`
    pub fn status(&self) -> StatusResponse {
        let state = self.state();
        let documents_loaded = self.registry.len();

        let message = match state {
            PipelineState::Empty => {
                "No documents indexed yet. Upload files to get started.".to_string()
            }
            PipelineState::Indexing => "Indexing documents...".to_string(),
            PipelineState::Ready => format!(
                "Ready: {} documents, {} chunks indexed",
                documents_loaded,
                self.index.len()
            ),
            PipelineState::Error => self
                .last_error
                .read()
                .clone()
                .unwrap_or_else(|| "No documents could be indexed".to_string()),
        };

        StatusResponse {
            status: state.status_label().to_string(),
            message,
            documents_loaded,
            vector_store_ready: self.index.is_ready(),
        }
    }

    /// Ingest uploaded documents
    pub async fn ingest(&self, documents: Vec<SourceDocument>) -> Result<IngestReport> {
        self.ingest_with_cancel(documents, CancellationToken::new())
            .await
    }

    /// Ingest uploaded documents, stopping between embedding batches once `cancel` fires.
    ///
    /// Unreadable documents are reported in `failed`; a service failure aborts
    /// the whole call without touching the index.
    pub async fn ingest_with_cancel(
        &self,
        documents: Vec<SourceDocument>,
        cancel: CancellationToken,
    ) -> Result<IngestReport> {
        if documents.is_empty() {
            return Ok(IngestReport::default());
        }

        let _guard = self.ingest_lock.lock().await;
        let started = Instant::now();
        self.set_state(PipelineState::Indexing);
        tracing::info!("Ingesting {} documents", documents.len());

        let result = self.ingest_locked(documents, &cancel).await;

        match result {
            Ok(mut report) => {
                report.processing_time_ms = started.elapsed().as_millis() as u64;
                let failure = (!report.failed.is_empty()).then(|| {
                    format!(
                        "No documents could be indexed ({} failed)",
                        report.failed.len()
                    )
                });
                self.settle(failure);
                tracing::info!(
                    "Ingested {} documents ({} chunks, {} failed) in {}ms",
                    report.ingested.len(),
                    report.chunks_indexed,
                    report.failed.len(),
                    report.processing_time_ms
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!("Ingestion aborted: {}", e);
                self.settle(Some(e.to_string()));
                Err(e)
            }
        }
    }

    async fn ingest_locked(
        &self,
        documents: Vec<SourceDocument>,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        let embedded = self.prepare_and_embed(documents, cancel).await?;

        // Originals only replace the stored copies once the index commit succeeds
        let staged = self.stage_originals(&embedded.sources).await?;

        let names: Vec<&str> = embedded.entries.iter().map(|(name, _)| name.as_str()).collect();
        let previous = self.index.document_entries(&names);

        let committed = if cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            self.index.replace_documents(embedded.entries)
        };
        if let Err(e) = committed {
            if let Some(store) = &self.store {
                store.discard(staged).await;
            }
            return Err(e);
        }

        if let Some(store) = &self.store {
            if let Err(e) = store.publish(staged).await {
                tracing::error!("Failed to store originals, restoring previous index entries: {}", e);
                self.index.replace_documents(previous)?;
                return Err(e);
            }
        }

        if let Err(e) = self.registry.upsert_all(embedded.documents.iter().cloned()) {
            tracing::error!("Failed to save document registry: {}", e);
        }

        Ok(IngestReport {
            ingested: embedded.documents,
            failed: embedded.failed,
            chunks_indexed: embedded.chunks,
            processing_time_ms: 0,
        })
    }

    /// Write originals to temporary names when a store is configured
    async fn stage_originals(&self, sources: &[SourceDocument]) -> Result<Vec<StagedFile>> {
        let Some(store) = &self.store else {
            return Ok(Vec::new());
        };

        let mut staged = Vec::with_capacity(sources.len());
        for source in sources {
            match store.stage(&source.filename, &source.data).await {
                Ok(file) => staged.push(file),
                Err(e) => {
                    store.discard(staged).await;
                    return Err(e);
                }
            }
        }
        Ok(staged)
    }

    /// Parse, chunk and embed; nothing is committed
    async fn prepare_and_embed(
        &self,
        documents: Vec<SourceDocument>,
        cancel: &CancellationToken,
    ) -> Result<Embedded> {
        // A name uploaded twice in one batch keeps its last copy
        let mut order: Vec<String> = Vec::new();
        let mut latest: HashMap<String, SourceDocument> = HashMap::new();
        for doc in documents {
            let name = doc.filename.clone();
            if latest.insert(name.clone(), doc).is_none() {
                order.push(name);
            }
        }

        let mut prepared: Vec<(PreparedDocument, SourceDocument)> = Vec::new();
        let mut failed = Vec::new();

        for filename in order {
            let Some(source) = latest.remove(&filename) else {
                continue;
            };
            match self.prepare(source.clone()).await {
                Ok(doc) => prepared.push((doc, source)),
                Err(e) if e.is_per_document() => {
                    tracing::warn!("Skipping '{}': {}", filename, e);
                    failed.push(FailedFile {
                        filename,
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let texts: Vec<String> = prepared
            .iter()
            .flat_map(|(doc, _)| doc.chunks.iter().map(|c| c.text.clone()))
            .collect();
        let vectors = self.embed_texts(&texts, cancel).await?;

        let mut vectors = vectors.into_iter();
        let mut documents = Vec::with_capacity(prepared.len());
        let mut entries = Vec::with_capacity(prepared.len());
        let mut sources = Vec::with_capacity(prepared.len());

        for (doc, source) in prepared {
            let doc_entries: Vec<_> = doc
                .chunks
                .into_iter()
                .zip(vectors.by_ref())
                .collect();
            entries.push((doc.document.filename.clone(), doc_entries));
            documents.push(doc.document);
            sources.push(source);
        }

        Ok(Embedded {
            documents,
            entries,
            sources,
            failed,
            chunks: texts.len(),
        })
    }

    /// Parse + chunk off the async runtime
    async fn prepare(&self, source: SourceDocument) -> Result<PreparedDocument> {
        let pipeline = self.pipeline.clone();
        let filename = source.filename.clone();

        tokio::task::spawn_blocking(move || pipeline.prepare(&source))
            .await
            .unwrap_or_else(|e| {
                Err(Error::file_parse(
                    filename,
                    format!("extraction crashed: {}", e),
                ))
            })
    }

    async fn embed_texts(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.embeddings.batch_size();
        let total = texts.len().div_ceil(batch_size);
        let mut vectors = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                tracing::info!("Ingestion cancelled after {}/{} batches", i, total);
                return Err(Error::Cancelled);
            }

            let embedded = self
                .retry
                .run("Embedding batch", || self.embeddings.embed_batch(batch))
                .await?;
            tracing::debug!("Embedded batch {}/{} ({} texts)", i + 1, total, batch.len());
            vectors.extend(embedded);
        }

        Ok(vectors)
    }

    /// Answer a question from the indexed documents
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let state = self.state();
        if state != PipelineState::Ready {
            return Err(Error::NotReady {
                state: state.to_string(),
            });
        }

        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidRequest("question must not be empty".to_string()));
        }

        let started = Instant::now();
        let retrieved = self
            .retry
            .run("Query embedding", || self.retriever.retrieve(question))
            .await?;

        if retrieved.is_empty() {
            tracing::info!("No relevant context for question, skipping generation");
            return Ok(Answer::not_found(
                question.to_string(),
                0,
                started.elapsed().as_millis() as u64,
            ));
        }

        let assembled = self.assembler.assemble(question, &retrieved);
        if assembled.included.is_empty() {
            tracing::warn!("No retrieved chunk fits the prompt budget");
            return Ok(Answer::not_found(
                question.to_string(),
                retrieved.len(),
                started.elapsed().as_millis() as u64,
            ));
        }

        let text = self
            .retry
            .run("Generation", || self.generator.generate(&assembled.prompt))
            .await?;

        let citations = build_citations(&assembled.included);
        let answer = format_answer_with_sources(&text, &citations);

        tracing::info!(
            "Answered with {}/{} chunks from {} sources",
            assembled.included.len(),
            retrieved.len(),
            citations.len()
        );

        Ok(Answer {
            question: question.to_string(),
            answer,
            citations,
            chunks_retrieved: retrieved.len(),
            chunks_used: assembled.included.len(),
            grounded: true,
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Remove one document from the index, registry and store
    ///
    /// Names are stored as bare file names, so anything that is not one
    /// cannot refer to a document.
    pub async fn delete_document(&self, filename: &str) -> Result<usize> {
        if sanitize_filename(filename).as_deref() != Some(filename) {
            return Err(Error::DocumentNotFound(filename.to_string()));
        }

        let _guard = self.ingest_lock.lock().await;

        let removed_chunks = self.index.remove_document(filename);
        let was_registered = self.registry.remove(filename)?.is_some();
        let had_original = match &self.store {
            Some(store) => store.delete(filename).await?,
            None => false,
        };

        if removed_chunks == 0 && !was_registered && !had_original {
            return Err(Error::DocumentNotFound(filename.to_string()));
        }

        tracing::info!("Deleted '{}' ({} chunks)", filename, removed_chunks);
        if !self.index.is_ready() {
            self.set_state(PipelineState::Empty);
        }
        Ok(removed_chunks)
    }

    /// Remove every document
    pub async fn clear(&self) -> Result<usize> {
        let _guard = self.ingest_lock.lock().await;

        let count = self.registry.len();
        self.index.clear();
        self.registry.clear()?;
        if let Some(store) = &self.store {
            store.clear().await?;
        }
        *self.last_error.write() = None;
        self.set_state(PipelineState::Empty);

        tracing::info!("Cleared {} documents", count);
        Ok(count)
    }

    /// Rebuild the index from the stored originals
    pub async fn reinitialize(&self) -> Result<IngestReport> {
        let _guard = self.ingest_lock.lock().await;
        let started = Instant::now();

        let Some(store) = &self.store else {
            tracing::warn!("No document store configured, nothing to rebuild from");
            return Ok(IngestReport::default());
        };
        let sources = store.load_all().await?;

        if sources.is_empty() {
            self.index.clear();
            self.registry.clear()?;
            self.set_state(PipelineState::Empty);
            tracing::info!("No stored documents to index");
            return Ok(IngestReport::default());
        }

        self.set_state(PipelineState::Indexing);
        tracing::info!("Rebuilding index from {} stored documents", sources.len());

        let cancel = CancellationToken::new();
        let embedded = match self.prepare_and_embed(sources, &cancel).await {
            Ok(embedded) => embedded,
            Err(e) => {
                tracing::error!("Rebuild aborted: {}", e);
                self.settle(Some(e.to_string()));
                return Err(e);
            }
        };

        let entries = embedded
            .entries
            .into_iter()
            .flat_map(|(_, entries)| entries)
            .collect();
        if let Err(e) = self.index.rebuild(entries) {
            self.settle(Some(e.to_string()));
            return Err(e);
        }

        let registry_result = self
            .registry
            .clear()
            .and_then(|_| self.registry.upsert_all(embedded.documents.iter().cloned()));
        if let Err(e) = registry_result {
            tracing::error!("Failed to save document registry: {}", e);
        }

        let report = IngestReport {
            ingested: embedded.documents,
            failed: embedded.failed,
            chunks_indexed: embedded.chunks,
            processing_time_ms: started.elapsed().as_millis() as u64,
        };
        self.settle(Some(format!(
            "No stored documents could be indexed ({} failed)",
            report.failed.len()
        )));

        tracing::info!(
            "Rebuilt index: {} documents, {} chunks, {} failed",
            report.ingested.len(),
            report.chunks_indexed,
            report.failed.len()
        );
        Ok(report)
    }

    /// Index whatever originals are already stored (server startup)
    pub async fn bootstrap(&self) -> Result<()> {
        let report = self.reinitialize().await?;
        for failed in &report.failed {
            tracing::warn!("Could not index stored '{}': {}", failed.filename, failed.error);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::HashEmbedder;
    use async_trait::async_trait;

    struct EchoLlm;

    #[async_trait]
    impl LlmProvider for EchoLlm {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok("echo".to_string())
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo-1"
        }
    }

    fn orchestrator() -> Orchestrator {
        let config = RagConfig::default();
        Orchestrator::new(
            &config,
            Arc::new(HashEmbedder::new(config.embeddings.dimensions)),
            Arc::new(EchoLlm),
        )
        .unwrap()
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(PipelineState::Empty.status_label(), "checking");
        assert_eq!(PipelineState::Indexing.status_label(), "initializing");
        assert_eq!(PipelineState::Ready.status_label(), "ready");
        assert_eq!(PipelineState::Error.status_label(), "error");
        assert_eq!(PipelineState::Indexing.to_string(), "indexing");
    }

    #[tokio::test]
    async fn test_starts_empty_and_refuses_questions() {
        let orchestrator = orchestrator();
        assert_eq!(orchestrator.state(), PipelineState::Empty);
        assert_eq!(orchestrator.status().status, "checking");
        assert!(matches!(
            orchestrator.answer("anything").await,
            Err(Error::NotReady { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_names_keep_last_copy() {
        let orchestrator = orchestrator();
        let report = orchestrator
            .ingest(vec![
                SourceDocument::new("a.txt", "first version"),
                SourceDocument::new("a.txt", "second version"),
            ])
            .await
            .unwrap();

        assert_eq!(report.ingested.len(), 1);
        assert_eq!(orchestrator.index().len(), 1);
        assert_eq!(orchestrator.documents()[0].size, 14);
    }

    #[tokio::test]
    async fn test_cancelled_ingest_leaves_index_untouched() {
        let orchestrator = orchestrator();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = orchestrator
            .ingest_with_cancel(vec![SourceDocument::new("a.txt", "text")], cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(orchestrator.index().is_empty());
        assert_eq!(orchestrator.state(), PipelineState::Error);
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let orchestrator = orchestrator();
        orchestrator
            .ingest(vec![SourceDocument::new("a.txt", "some text")])
            .await
            .unwrap();
        assert!(matches!(
            orchestrator.answer("   ").await,
            Err(Error::InvalidRequest(_))
        ));
    }
}
