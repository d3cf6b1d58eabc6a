//! Orchestrator events.
//!
//! Each orchestrator owns its sink; events carry the run id so that
//! concurrent runs can be told apart.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use crate::context::RunIdentity;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Event names emitted by the orchestrator.
pub mod names {
    /// A run began.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// The selector returned a decision.
    pub const SELECTION_COMPLETED: &str = "selection.completed";
    /// A stage began.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A stage produced its output.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A stage failed and the run stopped.
    pub const STAGE_FAILED: &str = "stage.failed";
    /// The modifier applied a change set.
    pub const CHANGES_APPLIED: &str = "changes.applied";
    /// Files were restored from backup.
    pub const CHANGES_REVERTED: &str = "changes.reverted";
    /// A run finished successfully.
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    /// A run failed.
    pub const PIPELINE_FAILED: &str = "pipeline.failed";
}

/// Emits events for one run, adding its id and elapsed time to every payload.
#[derive(Clone)]
pub struct RunEmitter {
    sink: Arc<dyn EventSink>,
    identity: RunIdentity,
}

impl RunEmitter {
    /// Creates an emitter for the run identified by `identity`.
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>, identity: RunIdentity) -> Self {
        Self { sink, identity }
    }

    /// Emits `event_type` with `fields` merged into the run metadata.
    pub fn emit(&self, event_type: &str, fields: Value) {
        let mut payload = Map::new();
        payload.insert("run_id".into(), json!(self.identity.run_id.to_string()));
        payload.insert("elapsed_ms".into(), json!(self.identity.elapsed_ms()));
        if let Value::Object(extra) = fields {
            payload.extend(extra);
        }
        self.sink.try_emit(event_type, Some(Value::Object(payload)));
    }
}

impl std::fmt::Debug for RunEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunEmitter")
            .field("run_id", &self.identity.run_id)
            .finish_non_exhaustive()
    }
}
