//! Response types for ingestion, queries and status

use serde::{Deserialize, Serialize};

use super::document::{Document, FileType, ScoredChunk};

/// Answer used when retrieval finds nothing relevant
pub const NOT_FOUND_ANSWER: &str =
    "I couldn't find information about that in the uploaded documents.";

/// Citation for a chunk that was included in the prompt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    /// Source filename
    pub filename: String,
    /// Page number (if applicable)
    pub page: Option<u32>,
    /// Best similarity score among the chunks cited here
    pub score: f32,
    /// Short excerpt from the source
    pub snippet: String,
}

impl Citation {
    /// Create a citation from a scored chunk
    pub fn from_scored(scored: &ScoredChunk, snippet_len: usize) -> Self {
        Self {
            filename: scored.chunk.document.clone(),
            page: scored.chunk.page,
            score: scored.score,
            snippet: crate::generation::citation::truncate_snippet(
                scored.chunk.text.trim(),
                snippet_len,
            ),
        }
    }

    /// Format citation for display in text
    pub fn format_inline(&self) -> String {
        match self.page {
            Some(page) => format!("[Source: {}, Page: {}]", self.filename, page),
            None => format!("[Source: {}]", self.filename),
        }
    }
}

/// Answer to a question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// The question that was asked
    pub question: String,
    /// Generated text with appended source lines
    pub answer: String,
    /// Sources used to build the prompt
    pub citations: Vec<Citation>,
    /// Chunks that passed retrieval
    pub chunks_retrieved: usize,
    /// Chunks that fit in the prompt
    pub chunks_used: usize,
    /// False when no context was found and the model was not called
    pub grounded: bool,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl Answer {
    /// Create a "not found" answer
    pub fn not_found(question: String, chunks_retrieved: usize, processing_time_ms: u64) -> Self {
        Self {
            question,
            answer: NOT_FOUND_ANSWER.to_string(),
            citations: Vec::new(),
            chunks_retrieved,
            chunks_used: 0,
            grounded: false,
            processing_time_ms,
        }
    }
}

/// A file that could not be ingested
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailedFile {
    pub filename: String,
    pub error: String,
}

/// Outcome of an ingestion call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    /// Documents now searchable
    pub ingested: Vec<Document>,
    /// Documents skipped because of per-document errors
    pub failed: Vec<FailedFile>,
    /// Chunks written to the index
    pub chunks_indexed: usize,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl IngestReport {
    pub fn failed_files(&self) -> Vec<String> {
        self.failed.iter().map(|f| f.filename.clone()).collect()
    }
}

/// Response for POST /upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub failed_files: Vec<String>,
    pub uploaded: Vec<String>,
    pub chunks_indexed: usize,
}

impl From<&IngestReport> for UploadResponse {
    fn from(report: &IngestReport) -> Self {
        Self {
            failed_files: report.failed_files(),
            uploaded: report.ingested.iter().map(|d| d.filename.clone()).collect(),
            chunks_indexed: report.chunks_indexed,
        }
    }
}

/// Entry of GET /files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    pub size: u64,
    pub upload_date: String,
    pub file_type: FileType,
}

impl From<&Document> for FileInfo {
    fn from(doc: &Document) -> Self {
        Self {
            filename: doc.filename.clone(),
            size: doc.size,
            upload_date: doc.uploaded_at.to_rfc3339(),
            file_type: doc.file_type,
        }
    }
}

/// Response for GET /files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileListResponse {
    pub files: Vec<FileInfo>,
}

/// Response for POST /query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub question: String,
    pub answer: String,
    pub status: String,
    pub sources: Vec<Citation>,
}

impl From<Answer> for QueryResponse {
    fn from(answer: Answer) -> Self {
        Self {
            question: answer.question,
            answer: answer.answer,
            status: "success".to_string(),
            sources: answer.citations,
        }
    }
}

/// Response for GET /status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
    pub documents_loaded: usize,
    pub vector_store_ready: bool,
}

/// Generic `{status, message}` acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: String,
    pub message: String,
}

impl ActionResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: "warning".to_string(),
            message: message.into(),
        }
    }
}
