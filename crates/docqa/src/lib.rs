//! docqa: question answering over uploaded documents
//!
//! Uploaded PDF, Word and text files are parsed, split into overlapping
//! chunks, embedded and held in an in-memory vector index. Questions are
//! answered by a language model from the closest chunks only, with the
//! source file and page of every chunk used cited in the answer.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use pipeline::{Orchestrator, PipelineState};
pub use types::{
    document::{Chunk, Document, FileType, ScoredChunk, SourceDocument},
    query::QueryRequest,
    response::{Answer, Citation, IngestReport, QueryResponse},
};
