//! Core types for the document Q&A pipeline

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, Document, FileType, ScoredChunk, SourceDocument};
pub use query::QueryRequest;
pub use response::{
    ActionResponse, Answer, Citation, FailedFile, FileInfo, FileListResponse, IngestReport,
    QueryResponse, StatusResponse, UploadResponse,
};
