//! `webundo-jobs` — in-process cancelable and undoable deferred jobs.
//!
//! # Overview
//!
//! A host (typically a request handler) launches a job and hands the returned
//! [`JobId`] to its client. A later request uses that id to either cancel the
//! job or trigger it.
//!
//! | Kind         | Runs when                          | Second request            |
//! |--------------|------------------------------------|---------------------------|
//! | `Cancelable` | its delay elapses                  | `cancel` stops it first   |
//! | `Undoable`   | triggered before its deadline      | `undo` runs it, awaits it |
//!
//! Every race between a job's own timer and a caller (fire vs cancel,
//! timeout vs trigger) is decided by [`JobRegistry::remove_if_present`]:
//! whoever removes the entry wins, everyone else sees it gone.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//! use webundo_jobs::{JobCoordinator, JobRegistry};
//!
//! #[tokio::main]
//! async fn main() -> webundo_jobs::Result<()> {
//!     let jobs = JobCoordinator::new(
//!         Arc::new(JobRegistry::new()),
//!         tokio::runtime::Handle::current(),
//!     );
//!
//!     let id = jobs.launch_cancelable(|| Ok(()), Duration::from_secs(3))?;
//!     assert!(jobs.cancel(&id));
//!
//!     let id = jobs.launch_undoable(|| "done".to_string(), Duration::from_secs(10))?;
//!     let out: String = jobs.undo(&id, None).await?;
//!     assert_eq!(out, "done");
//!     Ok(())
//! }
//! ```

pub mod cancelable;
pub mod coordinator;
pub mod error;
pub mod failure;
pub mod registry;
pub mod types;
pub mod undoable;

pub use coordinator::JobCoordinator;
pub use error::{JobError, Result};
pub use failure::{FailureCause, FailureHandler, JobFailure, LogFailures};
pub use registry::{JobHandle, JobRegistry};
pub use types::{JobId, JobInfo, JobKind};
