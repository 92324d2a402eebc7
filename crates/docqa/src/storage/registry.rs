//! Document registry persisted as `documents.json`

use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::Document;

/// Metadata of every ingested document, keyed by filename
#[derive(Debug)]
pub struct DocumentRegistry {
    documents: DashMap<String, Document>,
    /// Where the registry is saved; `None` keeps it in memory only
    path: Option<PathBuf>,
}

impl DocumentRegistry {
    /// Registry that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            documents: DashMap::new(),
            path: None,
        }
    }

    /// Load the registry at `path`; a missing or unreadable file yields an empty registry
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let documents = DashMap::new();

        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str::<Vec<Document>>(&content) {
                    Ok(docs) => {
                        for doc in docs {
                            documents.insert(doc.filename.clone(), doc);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read {}: {}", path.display(), e);
                }
            }
        }

        tracing::info!("Loaded {} documents from registry", documents.len());
        Self {
            documents,
            path: Some(path),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert or replace a document and persist
    pub fn upsert(&self, document: Document) -> Result<()> {
        self.documents.insert(document.filename.clone(), document);
        self.save()
    }

    /// Insert or replace several documents with a single write
    pub fn upsert_all(&self, documents: impl IntoIterator<Item = Document>) -> Result<()> {
        for document in documents {
            self.documents.insert(document.filename.clone(), document);
        }
        self.save()
    }

    /// Remove a document and persist
    pub fn remove(&self, filename: &str) -> Result<Option<Document>> {
        let removed = self.documents.remove(filename).map(|(_, doc)| doc);
        if removed.is_some() {
            self.save()?;
        }
        Ok(removed)
    }

    /// Drop every entry and persist
    pub fn clear(&self) -> Result<()> {
        self.documents.clear();
        self.save()
    }

    pub fn get(&self, filename: &str) -> Option<Document> {
        self.documents.get(filename).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.documents.contains_key(filename)
    }

    /// All documents, oldest upload first
    pub fn list(&self) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .documents
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        docs.sort_by(|a, b| {
            a.uploaded_at
                .cmp(&b.uploaded_at)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        docs
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Write the registry; goes through a temp file so a crash never leaves half a file
    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.list())?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}
