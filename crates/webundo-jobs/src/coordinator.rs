//! `JobCoordinator` — the four operations request handlers call.
//!
//! Handlers share one coordinator (it is `Clone`); the registry behind it is
//! injected by the host, so tests and independent subsystems can each own
//! their own.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::{
    cancelable::{self, CancelableEntry},
    error::{JobError, Result},
    failure::{FailureHandler, LogFailures},
    registry::{JobHandle, JobRegistry},
    types::{JobId, JobInfo, JobKind},
    undoable::{self, UndoableEntry},
};

/// Launches, cancels and triggers jobs against a shared [`JobRegistry`].
#[derive(Clone)]
pub struct JobCoordinator {
    registry: Arc<JobRegistry>,
    runtime: Handle,
    failures: Arc<dyn FailureHandler>,
}

impl JobCoordinator {
    /// Job tasks are spawned on `runtime`; failures of detached actions are
    /// logged until a handler is set with [`with_failure_handler`].
    ///
    /// [`with_failure_handler`]: Self::with_failure_handler
    pub fn new(registry: Arc<JobRegistry>, runtime: Handle) -> Self {
        Self {
            registry,
            runtime,
            failures: Arc::new(LogFailures),
        }
    }

    pub fn with_failure_handler(mut self, handler: Arc<dyn FailureHandler>) -> Self {
        self.failures = handler;
        self
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Cancelable jobs
    // -----------------------------------------------------------------------

    /// Schedule `action` to run once `delay` has elapsed, unless cancelled.
    ///
    /// Returns immediately. The action runs on the blocking pool; an error or
    /// panic from it goes to the failure handler.
    ///
    /// # Errors
    ///
    /// - `DuplicateId` — the fresh id collided with a live entry.
    pub fn launch_cancelable<F>(&self, action: F, delay: Duration) -> Result<JobId>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let id = JobId::new();
        let (entry, disarm) = CancelableEntry::new(Box::new(action), delay);
        self.registry
            .insert(id.clone(), JobHandle::Cancelable(entry))?;
        cancelable::arm(
            &self.runtime,
            Arc::clone(&self.registry),
            Arc::clone(&self.failures),
            id.clone(),
            delay,
            disarm,
        );

        info!(job_id = %id, delay = ?delay, "cancelable job launched");
        Ok(id)
    }

    /// Stop a pending cancelable job.
    ///
    /// Returns `true` only for the call that removed the job before it fired.
    /// Too late, already cancelled, unknown and undoable ids all give `false`.
    pub fn cancel(&self, id: &JobId) -> bool {
        match self.registry.remove_if_present(JobKind::Cancelable, id) {
            Some(handle) => {
                // Dropping the entry disarms the timer and discards the action.
                drop(handle);
                info!(job_id = %id, "cancelable job cancelled");
                true
            }
            None => {
                debug!(job_id = %id, "cancel: job already fired or unknown");
                false
            }
        }
    }

    /// Cancel every pending cancelable job. Returns how many were stopped.
    pub fn cancel_all(&self) -> usize {
        let cancelled = self
            .registry
            .ids(JobKind::Cancelable)
            .iter()
            .filter(|id| self.cancel(id))
            .count();
        if cancelled > 0 {
            info!(count = cancelled, "pending cancelable jobs cancelled");
        }
        cancelled
    }

    // -----------------------------------------------------------------------
    // Undoable jobs
    // -----------------------------------------------------------------------

    /// Register `action` to run only if triggered via [`undo`] within
    /// `deadline`. Returns immediately.
    ///
    /// # Errors
    ///
    /// - `DuplicateId` — the fresh id collided with a live entry.
    ///
    /// [`undo`]: Self::undo
    pub fn launch_undoable<F, T>(&self, action: F, deadline: Duration) -> Result<JobId>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Any + Send + 'static,
    {
        let id = JobId::new();
        let (entry, trigger) = UndoableEntry::new::<T>(deadline);
        self.registry
            .insert(id.clone(), JobHandle::Undoable(entry))?;
        undoable::wait_for_trigger(
            &self.runtime,
            Arc::clone(&self.registry),
            id.clone(),
            deadline,
            trigger,
            action,
        );

        info!(job_id = %id, deadline = ?deadline, "undoable job launched");
        Ok(id)
    }

    /// Trigger an undoable job and wait for its output.
    ///
    /// `wait` bounds only the wait for the result; `None` waits until the
    /// action finishes. Once triggered, the action runs to completion even if
    /// this call gives up, and a later `undo` with the same id picks the
    /// result up.
    ///
    /// # Errors
    ///
    /// - `JobLost`        — unknown, expired, already undone, or cancelable id.
    ///   Also returned while another `undo` is waiting on the same job.
    /// - `OutputType`     — `T` is not the action's output type; the job is
    ///   left pending.
    /// - `ResultTimeout`  — triggered, but not finished within `wait`; the job
    ///   stays registered for another `undo`.
    /// - `ActionPanicked` — the action panicked.
    /// - `WorkerGone`     — the waiting task vanished (runtime shutdown).
    pub async fn undo<T: Any + Send>(&self, id: &JobId, wait: Option<Duration>) -> Result<T> {
        let lost = || JobError::JobLost { id: id.to_string() };

        let Some(output) = self
            .registry
            .with_entry(JobKind::Undoable, id, JobHandle::output_type)
            .flatten()
        else {
            debug!(job_id = %id, "undo: no such undoable job");
            return Err(lost());
        };
        output.check::<T>()?;

        let mut triggered = match self.registry.remove_if_present(JobKind::Undoable, id) {
            Some(JobHandle::Undoable(entry)) => {
                let Some(triggered) = entry.fire() else {
                    return Err(JobError::WorkerGone { id: id.to_string() });
                };
                info!(job_id = %id, "undo trigger delivered");
                triggered
            }
            Some(JobHandle::Triggered(triggered)) => {
                debug!(job_id = %id, "undo: resuming wait for triggered job");
                triggered
            }
            _ => {
                debug!(job_id = %id, "undo: lost the race to the deadline or another undo");
                return Err(lost());
            }
        };

        let result = triggered.collect::<T>(id, wait).await;
        if matches!(result, Err(JobError::ResultTimeout { .. })) {
            // Park the receiver so the next undo can keep waiting.
            self.registry
                .insert(id.clone(), JobHandle::Triggered(triggered))?;
        }
        result
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Snapshot of a single pending job.
    pub fn lookup(&self, kind: JobKind, id: &JobId) -> Option<JobInfo> {
        self.registry.lookup(kind, id)
    }

    /// Snapshot of every pending job, oldest first.
    pub fn pending(&self) -> Vec<JobInfo> {
        self.registry.snapshot()
    }
}
