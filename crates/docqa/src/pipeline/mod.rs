//! Pipeline orchestration

mod orchestrator;
mod retry;

pub use orchestrator::{Orchestrator, PipelineState};
pub use retry::RetryPolicy;
