//! Document and chunk types with source tracking for citations

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported file types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Word,
    /// Plain text file
    Text,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Word),
            "txt" | "text" | "md" | "markdown" => Some(Self::Text),
            _ => None,
        }
    }

    /// Detect file type from a filename
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        Self::from_extension(ext)
    }
}

/// A raw uploaded file waiting to be ingested
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Original filename, used as the document identifier
    pub filename: String,
    /// File bytes
    pub data: Bytes,
}

impl SourceDocument {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// A document that has been ingested
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Filename as uploaded; unique within the registry
    pub filename: String,
    /// File type
    pub file_type: FileType,
    /// SHA-256 of the uploaded bytes
    pub content_hash: String,
    /// File size in bytes
    pub size: u64,
    /// Total number of pages (PDF only)
    pub total_pages: Option<u32>,
    /// Total number of chunks created
    pub total_chunks: u32,
    /// Upload timestamp
    pub uploaded_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    pub fn new(filename: String, file_type: FileType, content_hash: String, size: u64) -> Self {
        Self {
            filename,
            file_type,
            content_hash,
            size,
            total_pages: None,
            total_chunks: 0,
            uploaded_at: chrono::Utc::now(),
        }
    }
}

/// A chunk of text from a document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Source document filename
    pub document: String,
    /// Page covering the chunk start (1-indexed, PDF only)
    pub page: Option<u32>,
    /// Sequence index within the document
    pub index: u32,
    /// Text content
    pub text: String,
    /// Byte offsets into the extracted document text
    pub char_start: usize,
    pub char_end: usize,
    /// Leading bytes shared with the previous chunk
    pub overlap: usize,
}

impl Chunk {
    /// Page label used in prompts and citations
    pub fn page_label(&self) -> String {
        self.page
            .map(|p| p.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    }

    /// Text contributed by this chunk that the previous chunk did not contain
    pub fn fresh_text(&self) -> &str {
        &self.text[self.overlap.min(self.text.len())..]
    }
}

/// A chunk paired with its similarity to a query
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Higher is more similar
    pub score: f32,
}
