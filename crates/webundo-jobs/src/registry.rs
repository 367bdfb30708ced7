use dashmap::{mapref::entry::Entry, DashMap};
use tracing::{debug, error};

use crate::{
    cancelable::CancelableEntry,
    error::{JobError, Result},
    types::{JobId, JobInfo, JobKind},
    undoable::{OutputType, TriggeredEntry, UndoableEntry},
};

/// A live job as stored in the registry.
pub enum JobHandle {
    Cancelable(CancelableEntry),
    /// Undoable job still inside its window.
    Undoable(UndoableEntry),
    /// Undoable job already triggered, result not yet collected.
    Triggered(TriggeredEntry),
}

impl JobHandle {
    pub fn kind(&self) -> JobKind {
        match self {
            JobHandle::Cancelable(_) => JobKind::Cancelable,
            JobHandle::Undoable(_) | JobHandle::Triggered(_) => JobKind::Undoable,
        }
    }

    pub(crate) fn output_type(&self) -> Option<OutputType> {
        match self {
            JobHandle::Cancelable(_) => None,
            JobHandle::Undoable(entry) => Some(entry.output()),
            JobHandle::Triggered(entry) => Some(entry.output()),
        }
    }

    pub fn info(&self, id: &JobId) -> JobInfo {
        match self {
            JobHandle::Cancelable(entry) => JobInfo {
                id: id.clone(),
                kind: JobKind::Cancelable,
                created_at: entry.created_at,
                due_at: entry.due_at,
                output_type: None,
                triggered_at: None,
            },
            JobHandle::Undoable(entry) => JobInfo {
                id: id.clone(),
                kind: JobKind::Undoable,
                created_at: entry.created_at,
                due_at: entry.due_at,
                output_type: Some(entry.output().name().to_string()),
                triggered_at: None,
            },
            JobHandle::Triggered(entry) => JobInfo {
                id: id.clone(),
                kind: JobKind::Undoable,
                created_at: entry.created_at,
                due_at: entry.due_at,
                output_type: Some(entry.output().name().to_string()),
                triggered_at: Some(entry.triggered_at),
            },
        }
    }
}

/// Concurrent store of every pending job, shared by callers and job tasks.
///
/// Keyed by id alone so an id can only ever be live in one namespace; the
/// kind stored with the handle makes cross-kind lookups miss. Owned by the
/// host and passed to the coordinator as `Arc<JobRegistry>`.
pub struct JobRegistry {
    entries: DashMap<JobId, JobHandle>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Add a new entry under `id`. The kind is taken from the handle.
    ///
    /// Ids are generated fresh, so a collision means something is badly
    /// wrong: the live entry is left untouched and `DuplicateId` is returned.
    pub fn insert(&self, id: JobId, handle: JobHandle) -> Result<()> {
        match self.entries.entry(id) {
            Entry::Occupied(occupied) => {
                error!(
                    job_id = %occupied.key(),
                    kind = %handle.kind(),
                    "refusing to overwrite live job entry"
                );
                Err(JobError::DuplicateId {
                    id: occupied.key().to_string(),
                })
            }
            Entry::Vacant(vacant) => {
                debug!(job_id = %vacant.key(), kind = %handle.kind(), "job registered");
                vacant.insert(handle);
                Ok(())
            }
        }
    }

    /// Atomically take the entry out if it is still present under `kind`.
    ///
    /// At most one caller ever receives `Some` for a given entry; this is the
    /// single point where fire/cancel and timeout/trigger races are decided.
    pub fn remove_if_present(&self, kind: JobKind, id: &JobId) -> Option<JobHandle> {
        self.remove_matching(id, |handle| handle.kind() == kind)
    }

    /// Like [`remove_if_present`](Self::remove_if_present) with an arbitrary
    /// test on the stored handle.
    pub(crate) fn remove_matching(
        &self,
        id: &JobId,
        pred: impl FnOnce(&JobHandle) -> bool,
    ) -> Option<JobHandle> {
        self.entries
            .remove_if(id, |_, handle| pred(handle))
            .map(|(_, handle)| handle)
    }

    /// Read-only presence check.
    pub fn lookup(&self, kind: JobKind, id: &JobId) -> Option<JobInfo> {
        self.with_entry(kind, id, |handle| handle.info(id))
    }

    /// Run `f` against the entry while holding its shard read lock.
    ///
    /// `f` must not call back into the registry.
    pub(crate) fn with_entry<R>(
        &self,
        kind: JobKind,
        id: &JobId,
        f: impl FnOnce(&JobHandle) -> R,
    ) -> Option<R> {
        self.entries
            .get(id)
            .filter(|handle| handle.kind() == kind)
            .map(|handle| f(handle.value()))
    }

    /// Ids of every live job of `kind`.
    pub fn ids(&self, kind: JobKind) -> Vec<JobId> {
        self.entries
            .iter()
            .filter(|e| e.value().kind() == kind)
            .map(|e| e.key().clone())
            .collect()
    }

    /// Number of live jobs of `kind`.
    pub fn len(&self, kind: JobKind) -> usize {
        self.entries
            .iter()
            .filter(|e| e.value().kind() == kind)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All live jobs, oldest first.
    pub fn snapshot(&self) -> Vec<JobInfo> {
        let mut jobs: Vec<JobInfo> = self
            .entries
            .iter()
            .map(|e| e.value().info(e.key()))
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        jobs
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
