//! Question → relevant chunks

use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::providers::EmbeddingGateway;
use crate::types::ScoredChunk;

use super::index::VectorIndex;

/// Embeds questions and looks them up in the index
#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    embeddings: EmbeddingGateway,
    top_k: usize,
    score_threshold: f32,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>, embeddings: EmbeddingGateway, config: &RetrievalConfig) -> Self {
        Self {
            index,
            embeddings,
            top_k: config.top_k,
            score_threshold: config.score_threshold,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn score_threshold(&self) -> f32 {
        self.score_threshold
    }

    /// Top-k chunks above the threshold, best first; may be empty
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>> {
        let query = self.embeddings.embed(question).await?;
        let results = self.index.search(&query, self.top_k, self.score_threshold)?;

        tracing::debug!(
            "Retrieved {} chunks (top_k={}, threshold={})",
            results.len(),
            self.top_k,
            self.score_threshold
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;
    use crate::error::Error;
    use crate::providers::{EmbeddingProvider, HashEmbedder};
    use crate::retrieval::DistanceMetric;
    use crate::types::Chunk;
    use uuid::Uuid;

    fn chunk(document: &str, text: &str) -> Chunk {
        Chunk {
            id: Uuid::new_v4(),
            document: document.to_string(),
            page: None,
            index: 0,
            text: text.to_string(),
            char_start: 0,
            char_end: text.len(),
            overlap: 0,
        }
    }

    async fn setup(config: RetrievalConfig) -> (Retriever, Arc<VectorIndex>) {
        let embedder = Arc::new(HashEmbedder::new(4096));
        let gateway = EmbeddingGateway::new(embedder.clone(), &EmbeddingConfig::default());
        let index = Arc::new(VectorIndex::new(4096, DistanceMetric::Cosine));

        let texts = ["The sky is blue.", "Grass is green."];
        let mut entries = Vec::new();
        for (doc, text) in [("sky.txt", texts[0]), ("grass.txt", texts[1])] {
            entries.push((chunk(doc, text), embedder.embed(text).await.unwrap()));
        }
        index.add(entries).unwrap();

        (Retriever::new(index.clone(), gateway, &config), index)
    }

    #[tokio::test]
    async fn test_retrieves_matching_document() {
        let (retriever, _) = setup(RetrievalConfig::default()).await;
        let results = retriever.retrieve("What color is the sky?").await.unwrap();

        assert!(!results.is_empty());
        assert_eq!(results[0].chunk.document, "sky.txt");
    }

    #[tokio::test]
    async fn test_unrelated_question_retrieves_nothing() {
        let (retriever, _) = setup(RetrievalConfig::default()).await;
        let results = retriever.retrieve("quantum chromodynamics lattice").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_empty_index_is_not_ready() {
        let (retriever, index) = setup(RetrievalConfig::default()).await;
        index.clear();
        assert!(matches!(
            retriever.retrieve("sky").await,
            Err(Error::IndexNotReady)
        ));
    }
}
