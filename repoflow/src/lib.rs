//! # Repoflow
//!
//! Prompt-driven repository analysis and reversible code modification.
//!
//! Repoflow takes a repository root and an optional natural-language prompt,
//! decides which stages the request needs, and runs them in order:
//!
//! - **Stage selection**: a reasoning capability proposes stages from a fixed
//!   catalog; the proposal is validated and its ordering repaired
//! - **Sequential execution**: stages share a write-once run context and the
//!   first failure stops the run
//! - **Change transactions**: proposed file writes are path-checked, backed up,
//!   diffed and reversible, with a three-way batch status
//! - **Per-repository locking**: apply, revert and repository walks are
//!   serialized per canonical root
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use repoflow::prelude::*;
//!
//! let config = RepoflowConfig::from_env()?;
//! let orchestrator = Orchestrator::from_config(&config)?;
//!
//! let response = orchestrator
//!     .run("uploads/my-repo", Some("Add a --verbose flag"))
//!     .await?;
//!
//! if let Some(outcome) = response.modification {
//!     println!("{}", outcome.explanation);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod changes;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod reasoning;
pub mod repository;
pub mod selector;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::changes::{
        diff_summary, ApplyReport, ChangeManager, ChangeService, ChangeSet, Patch, RevertReport,
    };
    pub use crate::config::{ReasonerConfig, RepoflowConfig};
    pub use crate::context::{RunContext, RunIdentity};
    pub use crate::core::{BatchStatus, PipelineState, StageOutput};
    pub use crate::errors::{ErrorKind, FileError, RepoflowError, StageError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{Orchestrator, PipelineResponse};
    pub use crate::reasoning::{GuardedReasoner, Reasoner, ReasoningRequest, RetryConfig};
    #[cfg(feature = "openai")]
    pub use crate::reasoning::OpenAiReasoner;
    pub use crate::repository::{RepositoryHandle, RepositoryLocks};
    pub use crate::selector::{SelectionDecision, Selector};
    pub use crate::stages::{Stage, StageId, StageRegistry};
}
