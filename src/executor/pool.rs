//! Worker pool draining the scanner's task queue.
//!
//! This module provides a dispatcher + worker inbox design:
//! - bounded upstream `mpsc` queue fed by the scanning thread
//! - a dispatcher task fanning tasks out to per-worker inboxes
//! - file work executed on the blocking pool, one task per worker at a time
//! - explicit sender drop on shutdown before awaiting workers

use super::{emit_event, ProgressSink, SyncEvent, TaskHandler};
use crate::types::{FileTask, RunStats, SyncError, TaskOutcome};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Queue bookkeeping for one pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: usize,
    pub enqueued: usize,
    pub dispatched: usize,
    pub processed: usize,
    pub per_worker_processed: Vec<usize>,
}

impl PoolStats {
    fn new(workers: usize) -> Self {
        Self {
            workers,
            enqueued: 0,
            dispatched: 0,
            processed: 0,
            per_worker_processed: vec![0; workers],
        }
    }
}

/// State every worker reads or updates
struct WorkerContext {
    handler: Arc<dyn TaskHandler>,
    run_stats: Arc<RunStats>,
    aborted: AtomicBool,
    fatal: std::sync::Mutex<Option<SyncError>>,
    sink: Option<ProgressSink>,
}

impl WorkerContext {
    fn record(&self, worker: usize, task: &FileTask, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Created(action) => {
                self.run_stats.record_created();
                tracing::debug!(
                    "Thread-{}: {} {} => {}",
                    worker,
                    action,
                    task.absolute_source.display(),
                    task.absolute_target.display()
                );
                emit_event(
                    self.sink.as_ref(),
                    &SyncEvent::TaskCreated {
                        worker,
                        action,
                        path: task.relative_path.clone(),
                    },
                );
            }
            TaskOutcome::Skipped => {
                self.run_stats.record_skipped();
                tracing::trace!("Thread-{}: up to date {}", worker, task.relative_path.display());
                emit_event(
                    self.sink.as_ref(),
                    &SyncEvent::TaskSkipped {
                        worker,
                        path: task.relative_path.clone(),
                    },
                );
            }
            TaskOutcome::Failed(err) => self.record_failure(worker, task, &err),
            TaskOutcome::Fatal(err) => {
                tracing::error!(
                    "Thread-{}: aborting run at {}: {}",
                    worker,
                    task.absolute_source.display(),
                    err
                );
                self.aborted.store(true, Ordering::SeqCst);
                if let Ok(mut slot) = self.fatal.lock() {
                    if slot.is_none() {
                        *slot = Some(err);
                    }
                }
            }
        }
    }

    fn record_failure(&self, worker: usize, task: &FileTask, err: &SyncError) {
        self.run_stats.record_error();
        tracing::warn!(
            "Thread-{}: failed {}: {}",
            worker,
            task.absolute_source.display(),
            err
        );
        emit_event(
            self.sink.as_ref(),
            &SyncEvent::TaskFailed {
                worker,
                path: task.relative_path.clone(),
                kind: err.kind_label(),
                error: err.to_string(),
            },
        );
    }

    fn take_fatal(&self) -> Option<SyncError> {
        self.fatal.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// Fixed-size pool applying one `TaskHandler` to every queued task
pub struct WorkerPool {
    runtime: Runtime,
    enqueue_tx: Option<mpsc::Sender<FileTask>>,
    dispatcher_handle: Option<JoinHandle<()>>,
    worker_handles: Vec<JoinHandle<()>>,
    stats: Arc<Mutex<PoolStats>>,
    context: Arc<WorkerContext>,
}

impl WorkerPool {
    /// Create a dispatcher + worker pool with bounded channels.
    pub fn new(
        worker_count: usize,
        queue_capacity: usize,
        handler: Arc<dyn TaskHandler>,
        run_stats: Arc<RunStats>,
        sink: Option<ProgressSink>,
    ) -> Result<Self, SyncError> {
        let workers = worker_count.max(1);
        let capacity = queue_capacity.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .max_blocking_threads(workers)
            .thread_name("medialink-worker")
            .enable_all()
            .build()
            .map_err(SyncError::Io)?;

        let stats = Arc::new(Mutex::new(PoolStats::new(workers)));
        let context = Arc::new(WorkerContext {
            handler,
            run_stats,
            aborted: AtomicBool::new(false),
            fatal: std::sync::Mutex::new(None),
            sink,
        });
        let handle = runtime.handle().clone();

        let (enqueue_tx, enqueue_rx) = mpsc::channel::<FileTask>(capacity);

        let mut worker_txs = Vec::with_capacity(workers);
        let mut worker_handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let (worker_tx, worker_rx) = mpsc::channel::<FileTask>(capacity);
            worker_txs.push(worker_tx);
            worker_handles.push(handle.spawn(worker_loop(
                worker_id,
                worker_rx,
                Arc::clone(&context),
                Arc::clone(&stats),
            )));
        }

        let dispatcher_handle =
            handle.spawn(dispatcher_loop(enqueue_rx, worker_txs, Arc::clone(&stats)));

        Ok(Self {
            runtime,
            enqueue_tx: Some(enqueue_tx),
            dispatcher_handle: Some(dispatcher_handle),
            worker_handles,
            stats,
            context,
        })
    }

    /// Enqueue a task, blocking while the queue is full.
    pub fn enqueue(&self, task: FileTask) -> Result<(), SyncError> {
        let sender = self.enqueue_tx.as_ref().ok_or_else(|| {
            SyncError::Validation("worker pool queue is already closed".to_string())
        })?;
        let stats = Arc::clone(&self.stats);

        self.runtime.block_on(async {
            sender.send(task).await.map_err(|_| {
                SyncError::Validation("worker pool queue receiver is closed".to_string())
            })?;

            let mut guard = stats.lock().await;
            guard.enqueued += 1;
            Ok(())
        })
    }

    /// Has a worker hit a run-level failure?
    pub fn is_aborted(&self) -> bool {
        self.context.aborted.load(Ordering::SeqCst)
    }

    /// Close queue input and wait for dispatcher/workers to exit cleanly.
    ///
    /// Returns the first fatal task error instead of the stats when the run
    /// was aborted.
    pub fn close_and_wait(mut self) -> Result<PoolStats, SyncError> {
        self.enqueue_tx.take();

        let dispatcher = self.dispatcher_handle.take();
        let workers = std::mem::take(&mut self.worker_handles);
        let stats = Arc::clone(&self.stats);

        let pool_stats = self.runtime.block_on(async move {
            if let Some(handle) = dispatcher {
                handle.await.map_err(map_join_error)?;
            }
            for handle in workers {
                handle.await.map_err(map_join_error)?;
            }
            Ok::<_, SyncError>(stats.lock().await.clone())
        })?;

        match self.context.take_fatal() {
            Some(err) => Err(err),
            None => Ok(pool_stats),
        }
    }
}

async fn dispatcher_loop(
    mut enqueue_rx: mpsc::Receiver<FileTask>,
    worker_txs: Vec<mpsc::Sender<FileTask>>,
    stats: Arc<Mutex<PoolStats>>,
) {
    let mut next_worker = 0usize;
    let worker_len = worker_txs.len();

    while let Some(task) = enqueue_rx.recv().await {
        if worker_len == 0 {
            break;
        }

        let target = next_worker % worker_len;
        if worker_txs[target].send(task).await.is_ok() {
            let mut guard = stats.lock().await;
            guard.dispatched += 1;
            next_worker = (next_worker + 1) % worker_len;
        }
    }
    // worker_txs are dropped here, which closes worker inboxes.
}

async fn worker_loop(
    worker_id: usize,
    mut worker_rx: mpsc::Receiver<FileTask>,
    context: Arc<WorkerContext>,
    stats: Arc<Mutex<PoolStats>>,
) {
    let worker = worker_id + 1;
    emit_event(context.sink.as_ref(), &SyncEvent::WorkerStarted { worker });

    while let Some(task) = worker_rx.recv().await {
        // Keep draining after an abort so the dispatcher never blocks
        if context.aborted.load(Ordering::SeqCst) {
            continue;
        }

        let job = task.clone();
        let job_context = Arc::clone(&context);
        match tokio::task::spawn_blocking(move || job_context.handler.handle(&job)).await {
            Ok(outcome) => context.record(worker, &task, outcome),
            Err(join_err) => context.record_failure(
                worker,
                &task,
                &SyncError::WorkerFailed(join_err.to_string()),
            ),
        }

        let mut guard = stats.lock().await;
        guard.processed += 1;
        if let Some(slot) = guard.per_worker_processed.get_mut(worker_id) {
            *slot += 1;
        }
    }

    emit_event(context.sink.as_ref(), &SyncEvent::WorkerFinished { worker });
}

fn map_join_error(error: tokio::task::JoinError) -> SyncError {
    SyncError::WorkerFailed(format!("worker pool task failed: {}", error))
}
