use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use webundo_core::config::WebundoConfig;
use webundo_jobs::{JobCoordinator, JobRegistry};

/// Exercise cancelable and undoable jobs from the command line.
#[derive(Parser, Debug)]
#[command(name = "webundo", version)]
struct Cli {
    /// Config file (defaults to $WEBUNDO_CONFIG, then ~/.webundo/webundo.toml).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create FILE, schedule its deletion, and optionally cancel it.
    CancelDemo {
        #[arg(long)]
        file: PathBuf,
        /// Seconds before the deletion fires.
        #[arg(long)]
        delay: Option<u64>,
        /// Seconds to wait before cancelling; omit to let the job fire.
        #[arg(long)]
        cancel_after: Option<u64>,
    },
    /// Publish a post, then try to take it back.
    UndoDemo {
        /// Seconds the undo stays available.
        #[arg(long)]
        deadline: Option<u64>,
        /// Seconds to wait before undoing.
        #[arg(long, default_value_t = 2)]
        undo_after: u64,
        /// Seconds to wait for the undo result.
        #[arg(long)]
        wait: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webundo=info,webundo_jobs=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // explicit --config > WEBUNDO_CONFIG > ~/.webundo/webundo.toml
    let config = WebundoConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        WebundoConfig::default()
    });

    let jobs = JobCoordinator::new(
        Arc::new(JobRegistry::new()),
        tokio::runtime::Handle::current(),
    );

    match cli.command {
        Command::CancelDemo {
            file,
            delay,
            cancel_after,
        } => {
            let delay = delay
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.jobs.default_delay());
            cancel_demo(&jobs, &file, delay, cancel_after.map(Duration::from_secs)).await
        }
        Command::UndoDemo {
            deadline,
            undo_after,
            wait,
        } => {
            let deadline = deadline
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.jobs.default_deadline());
            let wait = wait
                .map(Duration::from_secs)
                .or_else(|| config.jobs.undo_wait());
            undo_demo(&jobs, deadline, Duration::from_secs(undo_after), wait).await
        }
    }
}

async fn cancel_demo(
    jobs: &JobCoordinator,
    file: &Path,
    delay: Duration,
    cancel_after: Option<Duration>,
) -> anyhow::Result<()> {
    std::fs::write(file, "stuff").with_context(|| format!("creating {}", file.display()))?;

    let target = file.to_path_buf();
    let id = jobs.launch_cancelable(
        move || {
            std::fs::remove_file(&target)
                .with_context(|| format!("deleting {}", target.display()))
        },
        delay,
    )?;
    info!(job_id = %id, "deletion scheduled");
    print_pending(jobs)?;

    match cancel_after {
        Some(after) => {
            tokio::time::sleep(after).await;
            if jobs.cancel(&id) {
                println!("Job cancelled successfully");
            } else {
                println!("Too late, job finished already");
            }
            // give a lost race time to finish deleting
            tokio::time::sleep(delay.saturating_sub(after) + Duration::from_millis(200)).await;
        }
        None => tokio::time::sleep(delay + Duration::from_millis(200)).await,
    }

    let state = if file.exists() { "still exists" } else { "was deleted" };
    println!("{} {}", file.display(), state);
    Ok(())
}

async fn undo_demo(
    jobs: &JobCoordinator,
    deadline: Duration,
    undo_after: Duration,
    wait: Option<Duration>,
) -> anyhow::Result<()> {
    let post = String::from("somevalue");
    println!("Published {post}");

    let id = jobs.launch_undoable(
        move || {
            info!(%post, "unpublishing");
            String::from("done")
        },
        deadline,
    )?;
    print_pending(jobs)?;

    tokio::time::sleep(undo_after).await;
    match jobs.undo::<String>(&id, wait).await {
        Ok(result) => println!("Undone: {result}"),
        Err(e) if e.is_lost() => println!("Job was lost already"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn print_pending(jobs: &JobCoordinator) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&jobs.pending())?);
    Ok(())
}
