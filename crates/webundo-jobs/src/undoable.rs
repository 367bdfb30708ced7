//! Jobs that run only when triggered before their deadline.
//!
//! The registry entry holds the trigger sender; the waiting task owns the
//! action. Triggering means removing the entry (single winner) and sending a
//! fresh result slot through the trigger. The task then runs the action and
//! writes the outcome into that slot exactly once.
//!
//! When the deadline elapses the task tries the same removal, but only of an
//! entry that is still waiting. Losing it means a trigger was accepted in the
//! meantime and its send follows immediately, so the task keeps waiting for it
//! instead of discarding the action.
//!
//! A caller that stops waiting for the result parks the receiving end back in
//! the registry as a [`TriggeredEntry`]; the next `undo` for the same id takes
//! it out again and resumes the wait.

use std::any::{type_name, Any, TypeId};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::{runtime::Handle, sync::oneshot};
use tracing::{debug, info, warn};

use crate::{
    error::{JobError, Result},
    failure::panic_message,
    registry::{JobHandle, JobRegistry},
    types::{due_after, JobId},
};

/// What the action produced: its boxed output, or the panic message.
pub(crate) type Outcome = std::result::Result<Box<dyn Any + Send>, String>;

/// One-shot slot the waiting task writes the outcome into.
pub(crate) type ResultSlot = oneshot::Sender<Outcome>;

/// Output type an undoable action was launched with.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OutputType {
    id: TypeId,
    name: &'static str,
}

impl OutputType {
    fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    /// Ensure the action's output can be handed back as `T`.
    pub(crate) fn check<T: Any>(&self) -> Result<()> {
        if self.id == TypeId::of::<T>() {
            Ok(())
        } else {
            Err(JobError::OutputType {
                expected: type_name::<T>(),
                actual: self.name,
            })
        }
    }
}

/// Registry entry for an undoable job that has not been triggered yet.
pub struct UndoableEntry {
    trigger: oneshot::Sender<ResultSlot>,
    output: OutputType,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) due_at: DateTime<Utc>,
}

impl UndoableEntry {
    /// Build the entry for an action returning `T`, plus the trigger receiver
    /// the waiting task listens on.
    pub(crate) fn new<T: Any + Send>(
        deadline: Duration,
    ) -> (Self, oneshot::Receiver<ResultSlot>) {
        let (trigger_tx, trigger_rx) = oneshot::channel();
        let created_at = Utc::now();
        let entry = Self {
            trigger: trigger_tx,
            output: OutputType::of::<T>(),
            created_at,
            due_at: due_after(created_at, deadline),
        };
        (entry, trigger_rx)
    }

    pub(crate) fn output(&self) -> OutputType {
        self.output
    }

    /// Deliver the trigger and return the receiving end of its result.
    /// `None` only if the waiting task is gone.
    pub(crate) fn fire(self) -> Option<TriggeredEntry> {
        let (slot, outcome) = oneshot::channel();
        self.trigger.send(slot).ok()?;
        Some(TriggeredEntry {
            outcome,
            output: self.output,
            created_at: self.created_at,
            due_at: self.due_at,
            triggered_at: Utc::now(),
        })
    }
}

/// Registry entry for an undoable job whose trigger was accepted but whose
/// result nobody is waiting on right now.
pub struct TriggeredEntry {
    outcome: oneshot::Receiver<Outcome>,
    output: OutputType,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) due_at: DateTime<Utc>,
    pub(crate) triggered_at: DateTime<Utc>,
}

impl TriggeredEntry {
    pub(crate) fn output(&self) -> OutputType {
        self.output
    }

    /// Wait for the action's outcome, bounded by `wait` if given.
    ///
    /// On `ResultTimeout` the receiver is untouched, so the entry can be
    /// parked and waited on again.
    pub(crate) async fn collect<T: Any>(&mut self, id: &JobId, wait: Option<Duration>) -> Result<T> {
        let received = match wait {
            Some(limit) => match tokio::time::timeout(limit, &mut self.outcome).await {
                Ok(received) => received,
                Err(_elapsed) => {
                    warn!(job_id = %id, waited = ?limit, "undo result not ready in time");
                    return Err(JobError::ResultTimeout { waited: limit });
                }
            },
            None => (&mut self.outcome).await,
        };

        let output = received
            .map_err(|_| JobError::WorkerGone { id: id.to_string() })?
            .map_err(JobError::ActionPanicked)?;

        // `undo` checks the type before triggering or resuming; this only
        // turns a mismatch into an error instead of a panic.
        output
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| JobError::OutputType {
                expected: type_name::<T>(),
                actual: self.output.name(),
            })
    }
}

/// Spawn the task that waits for the trigger and runs `action` on demand.
pub(crate) fn wait_for_trigger<F, T>(
    runtime: &Handle,
    registry: Arc<JobRegistry>,
    id: JobId,
    deadline: Duration,
    mut trigger: oneshot::Receiver<ResultSlot>,
    action: F,
) where
    F: FnOnce() -> T + Send + 'static,
    T: Any + Send + 'static,
{
    runtime.spawn(async move {
        let slot = match tokio::time::timeout(deadline, &mut trigger).await {
            Ok(Ok(slot)) => slot,
            Ok(Err(_)) => {
                debug!(job_id = %id, "entry dropped without a trigger");
                return;
            }
            Err(_elapsed) => {
                let expired =
                    registry.remove_matching(&id, |handle| matches!(handle, JobHandle::Undoable(_)));
                if expired.is_some() {
                    info!(job_id = %id, "undo window closed, action discarded");
                    return;
                }
                debug!(job_id = %id, "trigger accepted at the deadline, waiting for it");
                match trigger.await {
                    Ok(slot) => slot,
                    Err(_) => {
                        warn!(job_id = %id, "trigger accepted but never delivered");
                        return;
                    }
                }
            }
        };

        info!(job_id = %id, "undo triggered, running action");
        let outcome: Outcome = match tokio::task::spawn_blocking(action).await {
            Ok(output) => Ok(Box::new(output) as Box<dyn Any + Send>),
            Err(join_err) => Err(panic_message(join_err)),
        };

        if slot.send(outcome).is_err() {
            warn!(job_id = %id, "undo caller dropped the job, result discarded");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobKind;

    #[test]
    fn output_check_matches_launch_type() {
        let (entry, _trigger) = UndoableEntry::new::<String>(Duration::from_secs(5));
        assert!(entry.output().check::<String>().is_ok());

        let err = entry.output().check::<u32>().unwrap_err();
        assert_eq!(err.code(), "OUTPUT_TYPE");
        assert!(err.to_string().contains("alloc::string::String"));
    }

    #[test]
    fn fire_fails_once_waiter_is_gone() {
        let (entry, trigger) = UndoableEntry::new::<()>(Duration::from_secs(5));
        drop(trigger);
        assert!(entry.fire().is_none());
    }

    #[tokio::test]
    async fn fired_trigger_carries_the_slot() {
        let (entry, trigger) = UndoableEntry::new::<u8>(Duration::from_secs(5));
        let mut triggered = entry.fire().expect("waiter alive");

        let slot = trigger.await.expect("trigger delivered");
        slot.send(Ok(Box::new(7u8) as Box<dyn Any + Send>)).unwrap();
        let id = JobId::new();
        assert_eq!(triggered.collect::<u8>(&id, None).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn timed_out_collect_can_be_resumed() {
        let (entry, trigger) = UndoableEntry::new::<u8>(Duration::from_secs(5));
        let mut triggered = entry.fire().expect("waiter alive");
        let id = JobId::new();

        let err = triggered
            .collect::<u8>(&id, Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::ResultTimeout { waited } if waited == Duration::from_millis(20)));

        let slot = trigger.await.expect("trigger delivered");
        slot.send(Ok(Box::new(9u8) as Box<dyn Any + Send>)).unwrap();
        assert_eq!(triggered.collect::<u8>(&id, None).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn panicked_outcome_is_reported() {
        let (entry, trigger) = UndoableEntry::new::<u8>(Duration::from_secs(5));
        let mut triggered = entry.fire().expect("waiter alive");
        let slot = trigger.await.expect("trigger delivered");
        slot.send(Err("boom".to_string())).unwrap();

        let err = triggered.collect::<u8>(&JobId::new(), None).await.unwrap_err();
        assert!(matches!(err, JobError::ActionPanicked(ref msg) if msg == "boom"));
    }

    #[tokio::test]
    async fn trigger_accepted_at_the_deadline_still_runs() {
        let registry = Arc::new(JobRegistry::new());
        let id = JobId::new();
        let (entry, trigger) = UndoableEntry::new::<u8>(Duration::from_millis(50));
        registry.insert(id.clone(), JobHandle::Undoable(entry)).unwrap();
        wait_for_trigger(
            &Handle::current(),
            Arc::clone(&registry),
            id.clone(),
            Duration::from_millis(50),
            trigger,
            || 5u8,
        );

        // Win the removal, but hold the trigger back until the waiter has
        // timed out and found the entry gone.
        let Some(JobHandle::Undoable(entry)) = registry.remove_if_present(JobKind::Undoable, &id)
        else {
            panic!("entry should still be waiting");
        };
        tokio::time::sleep(Duration::from_millis(150)).await;

        let mut triggered = entry.fire().expect("waiter still listening");
        let out = triggered
            .collect::<u8>(&id, Some(Duration::from_secs(2)))
            .await
            .unwrap();
        assert_eq!(out, 5);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn deadline_never_discards_a_parked_result() {
        let registry = Arc::new(JobRegistry::new());
        let id = JobId::new();
        let (entry, trigger) = UndoableEntry::new::<u8>(Duration::from_millis(50));
        let triggered = entry.fire().expect("waiter alive");
        registry.insert(id.clone(), JobHandle::Triggered(triggered)).unwrap();

        let taken = registry.remove_matching(&id, |handle| matches!(handle, JobHandle::Undoable(_)));
        assert!(taken.is_none());
        assert!(registry.lookup(JobKind::Undoable, &id).is_some());
        drop(trigger);
    }
}
