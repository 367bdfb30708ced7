// End-to-end "undo send" scenarios at human time scales: a save that can be
// cancelled, and a publish that can be taken back.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use webundo_jobs::{JobCoordinator, JobRegistry};

fn coordinator() -> JobCoordinator {
    JobCoordinator::new(Arc::new(JobRegistry::new()), Handle::current())
}

fn temp_file(tag: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("webundo-{tag}-{}", uuid::Uuid::new_v4()));
    std::fs::write(&path, "stuff").unwrap();
    path
}

fn delete(path: PathBuf) -> impl FnOnce() -> anyhow::Result<()> + Send + 'static {
    move || {
        std::fs::remove_file(&path)?;
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_delete_leaves_file_in_place() {
    let jobs = coordinator();
    let path = temp_file("cancel");

    let id = jobs
        .launch_cancelable(delete(path.clone()), Duration::from_secs(3))
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(jobs.cancel(&id));

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(path.exists());
    std::fs::remove_file(&path).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn late_cancel_cannot_save_file() {
    let jobs = coordinator();
    let path = temp_file("late");

    let id = jobs
        .launch_cancelable(delete(path.clone()), Duration::from_secs(1))
        .unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(!jobs.cancel(&id));
    assert!(!path.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn unpublish_within_window_returns_done() {
    let jobs = coordinator();
    let post = String::from("hello world");

    let id = jobs
        .launch_undoable(
            move || {
                assert_eq!(post, "hello world");
                "done"
            },
            Duration::from_secs(10),
        )
        .unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let out: &'static str = jobs.undo(&id, None).await.unwrap();
    assert_eq!(out, "done");
}

#[tokio::test(flavor = "multi_thread")]
async fn unpublish_after_window_is_lost() {
    let jobs = coordinator();
    let id = jobs
        .launch_undoable(|| "done", Duration::from_secs(1))
        .unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let err = jobs.undo::<&'static str>(&id, None).await.unwrap_err();
    assert!(err.is_lost());
}
