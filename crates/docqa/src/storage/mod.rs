//! Persistent storage: document registry and uploaded originals

mod document_store;
mod registry;

pub use document_store::{sanitize_filename, DocumentStore, StagedFile};
pub use registry::DocumentRegistry;
