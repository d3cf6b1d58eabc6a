//! Context management for pipeline execution.
//!
//! This module provides:
//! - Run identity for correlating events
//! - The append-only run context shared between stages

mod identity;
mod run;

pub use identity::RunIdentity;
pub use run::RunContext;
