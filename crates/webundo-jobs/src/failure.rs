//! Observability channel for actions that fail with no caller to report to.
//!
//! Cancelable actions run on a detached task, so their errors and panics are
//! handed to a [`FailureHandler`] instead of disappearing with the task.
//! Undoable actions don't go through here: their outcome is returned to
//! whoever awaits `undo`.

use std::any::Any;

use thiserror::Error;
use tokio::task::JoinError;
use tracing::error;

use crate::types::{JobId, JobKind};

/// Why a detached action failed.
#[derive(Debug, Error)]
pub enum FailureCause {
    #[error("action returned an error: {0:#}")]
    Error(anyhow::Error),

    #[error("action panicked: {0}")]
    Panic(String),
}

/// A failed detached action, as delivered to the handler.
#[derive(Debug)]
pub struct JobFailure {
    pub id: JobId,
    pub kind: JobKind,
    pub cause: FailureCause,
}

/// Receives failures of detached actions.
///
/// Called on a Tokio worker right after the action returns, so handlers
/// must be cheap and non-blocking.
pub trait FailureHandler: Send + Sync {
    fn on_failure(&self, failure: &JobFailure);
}

/// Default handler: one `error!` line per failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFailures;

impl FailureHandler for LogFailures {
    fn on_failure(&self, failure: &JobFailure) {
        error!(
            job_id = %failure.id,
            kind = %failure.kind,
            "detached job failed: {}",
            failure.cause
        );
    }
}

/// Render a blocking task's panic payload as text.
pub(crate) fn panic_message(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => payload_to_string(payload.as_ref()),
        Err(_) => "task was cancelled before completing".to_string(),
    }
}

fn payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_strings_are_extracted() {
        let static_str: Box<dyn Any + Send> = Box::new("boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("kaboom"));
        let other: Box<dyn Any + Send> = Box::new(42u32);

        assert_eq!(payload_to_string(static_str.as_ref()), "boom");
        assert_eq!(payload_to_string(owned.as_ref()), "kaboom");
        assert_eq!(payload_to_string(other.as_ref()), "non-string panic payload");
    }

    #[test]
    fn cause_display_includes_error_chain() {
        let err = anyhow::anyhow!("disk full").context("writing dump");
        let cause = FailureCause::Error(err);
        assert_eq!(cause.to_string(), "action returned an error: writing dump: disk full");
    }
}
