//! Vector search and retrieval

mod index;
mod retriever;

pub use index::{DistanceMetric, DocumentEntries, VectorIndex};
pub use retriever::Retriever;
