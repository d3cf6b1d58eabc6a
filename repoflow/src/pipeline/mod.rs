//! Pipeline orchestration.

mod orchestrator;
mod response;

pub use orchestrator::Orchestrator;
pub use response::PipelineResponse;
