//! Query request types

use serde::{Deserialize, Serialize};

/// Request body for POST /query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer
    pub question: String,
}

impl QueryRequest {
    /// Trimmed question, `None` when blank
    pub fn normalized(&self) -> Option<&str> {
        let q = self.question.trim();
        (!q.is_empty()).then_some(q)
    }
}
