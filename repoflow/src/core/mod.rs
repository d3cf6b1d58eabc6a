//! Core types for repoflow.
//!
//! This module contains the fundamental types used throughout the pipeline:
//! - `StageOutput`: The typed result of a stage execution
//! - `BatchStatus`: Three-way outcome of batch file operations
//! - `PipelineState`: Orchestrator state machine

mod output;
mod status;

pub use output::StageOutput;
pub use status::{BatchStatus, PipelineState};
