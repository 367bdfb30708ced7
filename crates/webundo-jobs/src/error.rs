//! Error types for the webundo-jobs crate.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by the registry and the coordinator operations.
#[derive(Debug, Error)]
pub enum JobError {
    /// The undo window passed: the id is unknown, already timed out, already
    /// triggered, or belongs to a cancelable job.
    #[error("Job lost: {id} never existed, expired or was already undone")]
    JobLost { id: String },

    /// The action was triggered but did not finish within the caller's wait.
    /// It still runs to completion; calling `undo` again resumes the wait.
    #[error("Undo result not ready after {waited:?}")]
    ResultTimeout { waited: Duration },

    /// The undoable action panicked while running.
    #[error("Undo action panicked: {0}")]
    ActionPanicked(String),

    /// `undo` was asked for a different output type than the action returns.
    #[error("Output type mismatch: job returns {actual}, caller expected {expected}")]
    OutputType {
        expected: &'static str,
        actual: &'static str,
    },

    /// The waiting task went away after accepting a trigger, e.g. because the
    /// runtime is shutting down.
    #[error("Worker for job {id} exited before producing a result")]
    WorkerGone { id: String },

    /// A fresh id collided with a live entry. Indicates a registry bug.
    #[error("Duplicate job id in registry: {id}")]
    DuplicateId { id: String },
}

impl JobError {
    /// Short error code string, suitable for forwarding to clients.
    pub fn code(&self) -> &'static str {
        match self {
            JobError::JobLost { .. } => "JOB_LOST",
            JobError::ResultTimeout { .. } => "RESULT_TIMEOUT",
            JobError::ActionPanicked(_) => "ACTION_PANICKED",
            JobError::OutputType { .. } => "OUTPUT_TYPE",
            JobError::WorkerGone { .. } => "WORKER_GONE",
            JobError::DuplicateId { .. } => "DUPLICATE_ID",
        }
    }

    /// True when the caller can report "too late" to its user rather than
    /// treating the failure as a server fault.
    pub fn is_lost(&self) -> bool {
        matches!(self, JobError::JobLost { .. })
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, JobError>;
