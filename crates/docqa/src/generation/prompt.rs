//! Prompt assembly for grounded answers

use crate::config::GenerationConfig;
use crate::types::ScoredChunk;

const PREAMBLE: &str = "Answer the question based only on the following context:\n";
const INSTRUCTIONS: &str =
    "Important: Include the relevant source document file names and page numbers in your answer.";

/// A prompt and the chunks it contains
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub prompt: String,
    /// Chunks placed in the context, best first
    pub included: Vec<ScoredChunk>,
}

impl AssembledPrompt {
    /// Number of context chunks left out to fit the budget
    pub fn dropped(&self, retrieved: usize) -> usize {
        retrieved.saturating_sub(self.included.len())
    }
}

/// Builds prompts from retrieved chunks within a character budget
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    max_chars: usize,
}

impl PromptAssembler {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(config.max_prompt_chars)
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Build the prompt, dropping the lowest-scoring chunks until it fits.
    ///
    /// Chunks are never truncated. When not even one chunk fits, `included`
    /// is empty.
    pub fn assemble(&self, question: &str, chunks: &[ScoredChunk]) -> AssembledPrompt {
        let mut included: Vec<ScoredChunk> = chunks.to_vec();
        included.sort_by(|a, b| b.score.total_cmp(&a.score));

        loop {
            let prompt = Self::render(question, &included);
            if prompt.chars().count() <= self.max_chars || included.is_empty() {
                if included.len() < chunks.len() {
                    tracing::debug!(
                        "Dropped {} chunks to fit the {}-char prompt budget",
                        chunks.len() - included.len(),
                        self.max_chars
                    );
                }
                return AssembledPrompt { prompt, included };
            }
            included.pop();
        }
    }

    /// One context block per chunk
    pub fn format_block(chunk: &ScoredChunk) -> String {
        format!(
            "[source: {}, page: {}]\n{}",
            chunk.chunk.document,
            chunk.chunk.page_label(),
            chunk.chunk.text
        )
    }

    fn render(question: &str, chunks: &[ScoredChunk]) -> String {
        let context = chunks
            .iter()
            .map(Self::format_block)
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "{}{}\n\nQuestion: {}\n\n{}\n\nAnswer:",
            PREAMBLE, context, question, INSTRUCTIONS
        )
    }
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}
