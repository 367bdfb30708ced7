//! Delayed single-shot jobs that fire on their own unless cancelled first.
//!
//! The entry goes into the registry before the timer task is spawned, so the
//! task can always find it. When the delay elapses the task races `cancel`
//! for the entry through [`JobRegistry::remove_if_present`]; the action only
//! runs if the task wins. A successful `cancel` drops the entry, which also
//! drops the disarm sender and wakes the sleeping task so it exits early.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::{runtime::Handle, sync::oneshot};
use tracing::{debug, info};

use crate::{
    failure::{panic_message, FailureCause, FailureHandler, JobFailure},
    registry::{JobHandle, JobRegistry},
    types::{due_after, JobId, JobKind},
};

pub(crate) type CancelableAction = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// Registry entry for a pending cancelable job.
pub struct CancelableEntry {
    /// Behind a mutex only so the registry stays `Sync`; never contended.
    action: Mutex<CancelableAction>,
    /// Held only to be dropped: closing it wakes the timer task.
    _disarm: oneshot::Sender<()>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) due_at: DateTime<Utc>,
}

impl CancelableEntry {
    /// Build the entry plus the receiver the timer task listens on.
    pub(crate) fn new(
        action: CancelableAction,
        delay: Duration,
    ) -> (Self, oneshot::Receiver<()>) {
        let (disarm_tx, disarm_rx) = oneshot::channel();
        let created_at = Utc::now();
        let entry = Self {
            action: Mutex::new(action),
            _disarm: disarm_tx,
            created_at,
            due_at: due_after(created_at, delay),
        };
        (entry, disarm_rx)
    }

    fn into_action(self) -> CancelableAction {
        self.action
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Spawn the timer task for a job whose entry is already registered.
pub(crate) fn arm(
    runtime: &Handle,
    registry: Arc<JobRegistry>,
    failures: Arc<dyn FailureHandler>,
    id: JobId,
    delay: Duration,
    disarm: oneshot::Receiver<()>,
) {
    runtime.spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = disarm => {
                debug!(job_id = %id, "timer disarmed by cancel");
                return;
            }
        }

        let Some(JobHandle::Cancelable(entry)) =
            registry.remove_if_present(JobKind::Cancelable, &id)
        else {
            debug!(job_id = %id, "cancel won the race, not firing");
            return;
        };

        info!(job_id = %id, "firing cancelable job");
        let cause = match tokio::task::spawn_blocking(entry.into_action()).await {
            Ok(Ok(())) => {
                debug!(job_id = %id, "cancelable job completed");
                return;
            }
            Ok(Err(e)) => FailureCause::Error(e),
            Err(join_err) => FailureCause::Panic(panic_message(join_err)),
        };
        failures.on_failure(&JobFailure {
            id,
            kind: JobKind::Cancelable,
            cause,
        });
    });
}
