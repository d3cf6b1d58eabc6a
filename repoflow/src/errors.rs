//! Error types for the repoflow pipeline.
//!
//! Every failure is classified into an [`ErrorKind`] so callers can branch on
//! what went wrong without matching message text.

use crate::stages::StageId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A repository or backup was missing.
    NotFound,
    /// A malformed external response, or a path escaping the repository root.
    ValidationFailure,
    /// A filesystem read or write failed.
    IoFailure,
    /// A batch operation where some items succeeded and some did not.
    PartialFailure,
    /// An external call exceeded its deadline.
    Timeout,
    /// The reasoning capability could not be reached or refused the request.
    ReasoningFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::ValidationFailure => write!(f, "validation_failure"),
            Self::IoFailure => write!(f, "io_failure"),
            Self::PartialFailure => write!(f, "partial_failure"),
            Self::Timeout => write!(f, "timeout"),
            Self::ReasoningFailure => write!(f, "reasoning_failure"),
        }
    }
}

/// The main error type for repoflow operations.
#[derive(Debug, Error)]
pub enum RepoflowError {
    /// A repository, file or backup does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input failed validation.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A change-set path resolved outside the repository root.
    #[error("{0}")]
    PathEscape(#[from] PathEscapeError),

    /// A structured response from the reasoning capability had the wrong shape.
    #[error("{0}")]
    MalformedResponse(#[from] MalformedResponseError),

    /// IO error with the operation that caused it.
    #[error("IO error while {context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A batch had failed items; see `ApplyReport::into_result`.
    #[error("Partial failure: {succeeded} succeeded, {failed} failed")]
    PartialFailure {
        /// Items that succeeded.
        succeeded: usize,
        /// Items that failed.
        failed: usize,
    },

    /// An external call did not finish before its deadline.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The deadline that elapsed.
        after_ms: u64,
    },

    /// The reasoning capability failed.
    #[error("Reasoning error: {message}")]
    Reasoning {
        /// Provider or transport message.
        message: String,
        /// Whether a later attempt may succeed.
        retryable: bool,
    },

    /// A pipeline stage failed.
    #[error("{0}")]
    Stage(#[from] StageError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RepoflowError {
    /// Wraps an IO error with the operation that produced it.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a non-retryable reasoning error.
    pub fn reasoning(message: impl Into<String>) -> Self {
        Self::Reasoning {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a retryable reasoning error.
    pub fn reasoning_retryable(message: impl Into<String>) -> Self {
        Self::Reasoning {
            message: message.into(),
            retryable: true,
        }
    }

    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) | Self::PathEscape(_) | Self::MalformedResponse(_) | Self::Config(_) => {
                ErrorKind::ValidationFailure
            }
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::NotFound
            }
            Self::Io { .. } => ErrorKind::IoFailure,
            Self::PartialFailure { .. } => ErrorKind::PartialFailure,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Reasoning { .. } => ErrorKind::ReasoningFailure,
            Self::Stage(err) => err.kind,
        }
    }

    /// Returns true if retrying the same operation may succeed.
    ///
    /// Malformed responses are never retryable: the caller must re-prompt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Reasoning { retryable, .. } => *retryable,
            Self::Stage(err) => err.retryable,
            _ => false,
        }
    }
}

/// Error raised when input fails validation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// The error message.
    pub message: String,
    /// Field that caused the error, if applicable.
    pub field: Option<String>,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn for_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

/// Error raised when a requested path would leave the repository root.
#[derive(Debug, Clone, Error)]
#[error("Path '{path}' is not allowed: {reason}")]
pub struct PathEscapeError {
    /// The path as requested.
    pub path: String,
    /// Why it was rejected.
    pub reason: String,
}

impl PathEscapeError {
    /// Creates a new path escape error.
    #[must_use]
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Error raised when a structured response cannot be used.
#[derive(Debug, Clone, Error)]
#[error("Malformed {source_name} response: {message}")]
pub struct MalformedResponseError {
    /// Which protocol produced the response (e.g. "selector").
    pub source_name: String,
    /// What was wrong with it.
    pub message: String,
}

impl MalformedResponseError {
    /// Creates a new malformed response error.
    #[must_use]
    pub fn new(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Error returned by a stage that failed.
#[derive(Debug, Clone, Error)]
#[error("Stage {stage} failed: {message}")]
pub struct StageError {
    /// Stage that failed.
    pub stage: StageId,
    /// Classification of the failure.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Whether the underlying failure is retryable.
    pub retryable: bool,
}

impl StageError {
    /// Creates a new stage error.
    #[must_use]
    pub fn new(stage: StageId, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a stage error from a library error, keeping its classification.
    #[must_use]
    pub fn from_error(stage: StageId, err: &RepoflowError) -> Self {
        Self {
            stage,
            kind: err.kind(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }

    /// Creates an error for a stage whose required input was never produced.
    #[must_use]
    pub fn missing_input(stage: StageId, input: &str) -> Self {
        Self::new(
            stage,
            ErrorKind::ValidationFailure,
            format!("required input '{input}' was not produced by an earlier stage"),
        )
    }
}

/// Error raised when a context field is written by a second producer.
#[derive(Debug, Clone, Error)]
#[error("Data conflict: '{key}' was already recorded")]
pub struct DataConflictError {
    /// The conflicting field.
    pub key: String,
}

impl DataConflictError {
    /// Creates a new data conflict error.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Error for a single item inside a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    /// Repository-relative path as requested.
    pub path: String,
    /// Classification of the failure.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
}

impl FileError {
    /// Creates a file error from a library error.
    #[must_use]
    pub fn new(path: impl Into<String>, err: &RepoflowError) -> Self {
        Self {
            path: path.into(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}
