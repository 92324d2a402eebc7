//! Answer generation: prompt assembly, model access and citations

pub mod citation;
mod gateway;
mod prompt;

pub use citation::{build_citations, format_answer_with_sources, truncate_snippet};
pub use gateway::GenerationGateway;
pub use prompt::{AssembledPrompt, PromptAssembler};
