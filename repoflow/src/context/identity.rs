//! Run identity for tracking pipeline executions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a single orchestrator invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// The unique ID for this pipeline run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
}

impl RunIdentity {
    /// Creates a new run identity with a generated run ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }

    /// Creates a run identity with a specific run ID.
    #[must_use]
    pub fn with_run_id(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
        }
    }

    /// Milliseconds elapsed since the run started.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}
