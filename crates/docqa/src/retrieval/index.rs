//! Exact nearest-neighbour vector index

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::types::{Chunk, ScoredChunk};

/// Similarity function used for scoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine similarity in [-1, 1]
    #[default]
    Cosine,
    /// 1 / (1 + L2 distance), in (0, 1]
    Euclidean,
    /// Raw inner product
    DotProduct,
}

impl DistanceMetric {
    /// Higher is more similar
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(a, b),
            Self::Euclidean => {
                let dist: f32 = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + dist)
            }
            Self::DotProduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        }
    }
}

/// Cosine similarity; 0.0 if either vector has zero magnitude
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// A chunk with its vector
#[derive(Debug, Clone)]
struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
    /// Global insertion counter, breaks score ties
    seq: u64,
}

#[derive(Debug, Default)]
struct IndexInner {
    entries: Vec<IndexEntry>,
    next_seq: u64,
}

impl IndexInner {
    fn append(&mut self, batch: Vec<(Chunk, Vec<f32>)>) -> usize {
        let count = batch.len();
        for (chunk, vector) in batch {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.entries.push(IndexEntry { chunk, vector, seq });
        }
        count
    }
}

/// Entries of one document, replacing whatever the index held for it
pub type DocumentEntries = (String, Vec<(Chunk, Vec<f32>)>);

/// In-memory index answering exact top-k queries by linear scan.
///
/// Every mutation validates the whole batch before taking the write lock, so a
/// rejected batch leaves the index untouched and readers never observe half a
/// batch.
#[derive(Debug)]
pub struct VectorIndex {
    dimensions: usize,
    metric: DistanceMetric,
    inner: RwLock<IndexInner>,
}

impl VectorIndex {
    pub fn new(dimensions: usize, metric: DistanceMetric) -> Self {
        Self {
            dimensions,
            metric,
            inner: RwLock::new(IndexInner::default()),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn check_batch<'a>(&self, vectors: impl IntoIterator<Item = &'a Vec<f32>>) -> Result<()> {
        vectors
            .into_iter()
            .try_for_each(|v| self.check_dimensions(v))
    }

    /// Append a batch of entries
    pub fn add(&self, entries: Vec<(Chunk, Vec<f32>)>) -> Result<usize> {
        self.check_batch(entries.iter().map(|(_, v)| v))?;

        let added = self.inner.write().append(entries);
        tracing::debug!("Indexed {} vectors", added);
        Ok(added)
    }

    /// Drop the entries of `document` and append the new ones
    pub fn replace_document(&self, document: &str, entries: Vec<(Chunk, Vec<f32>)>) -> Result<usize> {
        self.replace_documents(vec![(document.to_string(), entries)])
    }

    /// Replace several documents under one write lock
    pub fn replace_documents(&self, documents: Vec<DocumentEntries>) -> Result<usize> {
        self.check_batch(documents.iter().flat_map(|(_, e)| e.iter().map(|(_, v)| v)))?;

        let names: HashSet<&str> = documents.iter().map(|(name, _)| name.as_str()).collect();

        let mut inner = self.inner.write();
        let before = inner.entries.len();
        inner
            .entries
            .retain(|e| !names.contains(e.chunk.document.as_str()));
        let replaced = before - inner.entries.len();

        let mut added = 0;
        for (_, entries) in documents {
            added += inner.append(entries);
        }

        tracing::debug!("Replaced {} vectors with {}", replaced, added);
        Ok(added)
    }

    /// Current entries of each named document, in insertion order.
    ///
    /// Names with nothing indexed come back with an empty list, so passing the
    /// result to `replace_documents` restores exactly this state.
    pub fn document_entries(&self, documents: &[&str]) -> Vec<DocumentEntries> {
        let inner = self.inner.read();
        documents
            .iter()
            .map(|name| {
                let entries = inner
                    .entries
                    .iter()
                    .filter(|e| e.chunk.document == *name)
                    .map(|e| (e.chunk.clone(), e.vector.clone()))
                    .collect();
                (name.to_string(), entries)
            })
            .collect()
    }

    /// Swap the whole contents for `entries`
    pub fn rebuild(&self, entries: Vec<(Chunk, Vec<f32>)>) -> Result<usize> {
        self.check_batch(entries.iter().map(|(_, v)| v))?;

        let mut inner = self.inner.write();
        inner.entries.clear();
        Ok(inner.append(entries))
    }

    /// Remove every entry of `document`; returns how many were removed
    pub fn remove_document(&self, document: &str) -> usize {
        let mut inner = self.inner.write();
        let before = inner.entries.len();
        inner.entries.retain(|e| e.chunk.document != document);
        before - inner.entries.len()
    }

    /// Remove everything
    pub fn clear(&self) {
        self.inner.write().entries.clear();
    }

    /// Whether the index holds anything to search
    pub fn is_ready(&self) -> bool {
        !self.inner.read().entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct documents indexed
    pub fn document_count(&self) -> usize {
        let inner = self.inner.read();
        inner
            .entries
            .iter()
            .map(|e| e.chunk.document.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Top-`k` entries scoring at least `threshold`, best first.
    ///
    /// Equal scores keep insertion order.
    pub fn search(&self, query: &[f32], k: usize, threshold: f32) -> Result<Vec<ScoredChunk>> {
        let inner = self.inner.read();
        if inner.entries.is_empty() {
            return Err(Error::IndexNotReady);
        }
        self.check_dimensions(query)?;

        let mut scored: Vec<(f32, u64, &Chunk)> = inner
            .entries
            .iter()
            .map(|e| (self.metric.score(&e.vector, query), e.seq, &e.chunk))
            .filter(|(score, _, _)| *score >= threshold)
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, _, chunk)| ScoredChunk {
                chunk: chunk.clone(),
                score,
            })
            .collect())
    }
}
