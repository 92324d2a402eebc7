//! Document ingestion: text extraction and chunking

mod chunker;
mod parser;
mod processor;

pub use chunker::{reconstruct, TextChunker};
pub use parser::{
    hash_content, DocxExtractor, FileParser, PageSpan, ParsedDocument, PdfExtractor,
    PlainTextExtractor, TextExtractor,
};
pub use processor::{IngestPipeline, PreparedDocument};
