//! Per-document ingestion: parse + chunk

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, Document, SourceDocument};

use super::chunker::TextChunker;
use super::parser::{hash_content, FileParser, ParsedDocument};

/// A document that has been parsed and chunked, ready for embedding
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub document: Document,
    pub chunks: Vec<Chunk>,
}

/// Turns uploaded files into documents and chunks
#[derive(Debug, Clone)]
pub struct IngestPipeline {
    chunker: TextChunker,
}

impl IngestPipeline {
    /// Create a new ingestion pipeline
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Ok(Self {
            chunker: TextChunker::new(chunk_size, chunk_overlap)?,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Ok(Self {
            chunker: TextChunker::from_config(config)?,
        })
    }

    /// Parse a file
    pub fn parse_file(&self, filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        FileParser::parse(filename, data)
    }

    /// Full ingestion of one file: parse + chunk.
    ///
    /// A file without extractable text is reported as a parse failure so that
    /// it shows up in the upload's failed files instead of silently indexing
    /// nothing.
    pub fn prepare(&self, source: &SourceDocument) -> Result<PreparedDocument> {
        let parsed = self.parse_file(&source.filename, &source.data)?;
        if parsed.is_empty() {
            return Err(Error::file_parse(
                &source.filename,
                "no extractable text (the file may be empty or image-based)",
            ));
        }

        let mut document = Document::new(
            source.filename.clone(),
            parsed.file_type,
            hash_content(&source.data),
            source.data.len() as u64,
        );
        document.total_pages = parsed.total_pages;

        let chunks = self
            .chunker
            .split(&parsed.content, &source.filename, &parsed.pages);
        document.total_chunks = chunks.len() as u32;

        tracing::debug!(
            "Prepared '{}': {} chars, {} chunks",
            source.filename,
            parsed.content.len(),
            chunks.len()
        );

        Ok(PreparedDocument { document, chunks })
    }
}

impl Default for IngestPipeline {
    fn default() -> Self {
        Self {
            chunker: TextChunker::default(),
        }
    }
}
