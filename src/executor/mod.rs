//! Pass execution: scan, queue, worker pool, report

pub mod pool;

use crate::metadata::MetadataSyncer;
use crate::scanner::{scan_tasks, PathScanner};
use crate::strategy::LinkStrategy;
use crate::types::{map_io_error, Action, FileTask, RunReport, RunStats, SyncError, SyncJob, TaskOutcome};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

pub use pool::{PoolStats, WorkerPool};

/// Work applied by a pool worker to each task
pub trait TaskHandler: Send + Sync {
    fn handle(&self, task: &FileTask) -> TaskOutcome;
}

/// Which of the two mirroring passes is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pass {
    /// Media files become copies, symlinks or placeholders
    Links,
    /// Auxiliary files are copied when missing or stale
    Metadata,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Links => f.write_str("link"),
            Pass::Metadata => f.write_str("metadata"),
        }
    }
}

/// Events emitted while a pass runs.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Pass is about to scan `source` into `target`.
    PassStarted {
        pass: Pass,
        source: PathBuf,
        target: PathBuf,
        threads: usize,
    },
    ScanStarted { root: PathBuf },
    /// Scanner exhausted; `matched` tasks were queued.
    ScanFinished { root: PathBuf, matched: u64 },
    WorkerStarted { worker: usize },
    WorkerFinished { worker: usize },
    /// An artifact was written for `path` (relative to the source root).
    TaskCreated {
        worker: usize,
        action: Action,
        path: PathBuf,
    },
    TaskSkipped { worker: usize, path: PathBuf },
    /// Task failed but the pass continued.
    TaskFailed {
        worker: usize,
        path: PathBuf,
        kind: &'static str,
        error: String,
    },
    PassFinished { pass: Pass, report: RunReport },
    /// Pass stopped on a run-level failure.
    PassAborted { pass: Pass, error: String },
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncEvent::PassStarted {
                pass,
                source,
                target,
                threads,
            } => write!(
                f,
                "Starting {} pass: {} => {} ({} threads)",
                pass,
                source.display(),
                target.display(),
                threads
            ),
            SyncEvent::ScanStarted { root } => write!(f, "Scanning {}", root.display()),
            SyncEvent::ScanFinished { root, matched } => {
                write!(f, "Scan of {} complete: {} matching files", root.display(), matched)
            }
            SyncEvent::WorkerStarted { worker } => write!(f, "Thread-{} started", worker),
            SyncEvent::WorkerFinished { worker } => write!(f, "Thread-{} finished", worker),
            SyncEvent::TaskCreated {
                worker,
                action,
                path,
            } => write!(f, "Thread-{}: {} {}", worker, action, path.display()),
            SyncEvent::TaskSkipped { worker, path } => {
                write!(f, "Thread-{}: up to date, skipping {}", worker, path.display())
            }
            SyncEvent::TaskFailed {
                worker,
                path,
                error,
                ..
            } => write!(f, "Thread-{}: ERROR {}: {}", worker, path.display(), error),
            SyncEvent::PassFinished { pass, report } => {
                write!(f, "Finished {} pass\n{}", pass, report)
            }
            SyncEvent::PassAborted { pass, error } => {
                write!(f, "Aborted {} pass: {}", pass, error)
            }
        }
    }
}

/// Caller-supplied receiver of progress events, shared with every worker.
pub type ProgressSink = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Run one pass over `job`.
///
/// The calling thread walks the source tree and feeds the worker pool; the
/// report is assembled after every worker has exited. A missing source root
/// produces an empty report.
///
/// Must not be called from inside an async runtime: the pool owns its own.
///
/// # Errors
/// * target root cannot be created
/// * a task reported a run-level failure (e.g. a source outside the cloud root)
pub fn run_pass(
    job: &SyncJob,
    pass: Pass,
    sink: Option<ProgressSink>,
) -> Result<RunReport, SyncError> {
    let start = Instant::now();

    tracing::info!(
        "Starting {} pass: {} => {} with {} threads",
        pass,
        job.source_root().display(),
        job.target_root().display(),
        job.thread_count()
    );
    emit_event(
        sink.as_ref(),
        &SyncEvent::PassStarted {
            pass,
            source: job.source_root().to_path_buf(),
            target: job.target_root().to_path_buf(),
            threads: job.thread_count(),
        },
    );

    fs::create_dir_all(job.target_root()).map_err(|e| map_io_error(job.target_root(), e))?;

    let handler: Arc<dyn TaskHandler> = match pass {
        Pass::Links => {
            Arc::new(LinkStrategy::new(job.mode().clone(), job.extensions().clone()))
        }
        Pass::Metadata => Arc::new(MetadataSyncer::new()),
    };
    let run_stats = Arc::new(RunStats::new());
    let pool = WorkerPool::new(
        job.thread_count(),
        job.queue_capacity(),
        handler,
        Arc::clone(&run_stats),
        sink.clone(),
    )?;

    emit_event(
        sink.as_ref(),
        &SyncEvent::ScanStarted {
            root: job.source_root().to_path_buf(),
        },
    );
    let mut scanner = PathScanner::new(job.source_root(), job.extensions().clone());
    let mut enqueue_error = None;
    for task in scan_tasks(&mut scanner, job.source_root(), job.target_root()) {
        if pool.is_aborted() {
            break;
        }
        if let Err(e) = pool.enqueue(task) {
            enqueue_error = Some(e);
            break;
        }
    }
    let matched = scanner.matched();
    tracing::info!("Scan complete: {} matching files", matched);
    emit_event(
        sink.as_ref(),
        &SyncEvent::ScanFinished {
            root: job.source_root().to_path_buf(),
            matched,
        },
    );

    let pool_result = pool.close_and_wait().and_then(|stats| match enqueue_error {
        Some(err) => Err(err),
        None => Ok(stats),
    });
    let pool_stats = match pool_result {
        Ok(stats) => stats,
        Err(err) => {
            tracing::error!("{} pass aborted: {}", pass, err);
            emit_event(
                sink.as_ref(),
                &SyncEvent::PassAborted {
                    pass,
                    error: err.to_string(),
                },
            );
            return Err(err);
        }
    };
    tracing::debug!(
        "Pool drained: {} enqueued, {} processed, per worker {:?}",
        pool_stats.enqueued,
        pool_stats.processed,
        pool_stats.per_worker_processed
    );

    let report = RunReport::new(start.elapsed(), &run_stats);
    tracing::info!(
        "Finished {} pass in {:.2}s: {} created, {} skipped, {} errors",
        pass,
        report.elapsed.as_secs_f64(),
        report.created,
        report.skipped_existing,
        report.errors
    );
    emit_event(sink.as_ref(), &SyncEvent::PassFinished { pass, report });

    Ok(report)
}

pub(crate) fn emit_event(sink: Option<&ProgressSink>, event: &SyncEvent) {
    if let Some(callback) = sink {
        callback(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExtensionSet, LinkMode};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn link_job(src: &TempDir, dst: &TempDir, threads: usize) -> SyncJob {
        SyncJob::new(
            src.path().join("Library"),
            dst.path(),
            ExtensionSet::parse(".mkv", false),
            LinkMode::CopyOrSymlink {
                size_threshold: 1024,
            },
            threads,
        )
        .expect("job")
    }

    #[test]
    fn test_run_pass_missing_source_is_empty_report() {
        let src = TempDir::new().expect("create src tempdir");
        let dst = TempDir::new().expect("create dst tempdir");

        let report = run_pass(&link_job(&src, &dst, 2), Pass::Links, None).expect("run pass");
        assert_eq!(report.created, 0);
        assert_eq!(report.skipped_existing, 0);
        assert_eq!(report.errors, 0);
    }

    #[test]
    fn test_run_pass_writes_under_recomputed_target_root() {
        let src = TempDir::new().expect("create src tempdir");
        let dst = TempDir::new().expect("create dst tempdir");
        fs::create_dir_all(src.path().join("Library/Show")).expect("create library");
        fs::write(src.path().join("Library/Show/ep1.mkv"), b"x").expect("write ep1");

        let report = run_pass(&link_job(&src, &dst, 2), Pass::Links, None).expect("run pass");
        assert_eq!(report.created, 1);
        assert!(dst.path().join("Library/Show/ep1.mkv").exists());
        assert!(!dst.path().join("Show").exists());
    }

    #[test]
    fn test_run_pass_emits_ordered_pass_events() {
        let src = TempDir::new().expect("create src tempdir");
        let dst = TempDir::new().expect("create dst tempdir");
        fs::create_dir_all(src.path().join("Library")).expect("create library");
        fs::write(src.path().join("Library/a.mkv"), b"x").expect("write a");

        let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let events_ref = Arc::clone(&events);
        let sink: ProgressSink = Arc::new(move |event: &SyncEvent| {
            let label = match event {
                SyncEvent::PassStarted { .. } => "pass-start",
                SyncEvent::ScanStarted { .. } => "scan-start",
                SyncEvent::ScanFinished { .. } => "scan-finish",
                SyncEvent::PassFinished { .. } => "pass-finish",
                SyncEvent::PassAborted { .. } => "pass-abort",
                _ => return,
            };
            events_ref
                .lock()
                .expect("lock events")
                .push(label.to_string());
        });

        run_pass(&link_job(&src, &dst, 1), Pass::Links, Some(sink)).expect("run pass");

        let snapshot = events.lock().expect("lock events snapshot").clone();
        assert_eq!(
            snapshot,
            vec!["pass-start", "scan-start", "scan-finish", "pass-finish"]
        );
    }

    #[test]
    fn test_event_display_is_human_readable() {
        let event = SyncEvent::TaskFailed {
            worker: 3,
            path: PathBuf::from("Show/ep1.mkv"),
            kind: "Permission denied",
            error: "Permission denied: /x".to_string(),
        };
        assert_eq!(
            event.to_string(),
            "Thread-3: ERROR Show/ep1.mkv: Permission denied: /x"
        );
        assert_eq!(Pass::Metadata.to_string(), "metadata");
    }
}
