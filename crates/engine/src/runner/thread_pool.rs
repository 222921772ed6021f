//! Default concurrent backend: a bounded pool of worker threads over a FIFO
//! queue.
//!
//! Workers pick queued runs in submission order but may complete them out of
//! order; ordering between two runs exists only where one depends on the
//! other's future. Dropping the runner is the end of its execution scope:
//! the queue is drained, workers are joined, and every future it produced is
//! terminal by the time `drop` returns.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::call::TaskCall;
use crate::future::TaskFuture;
use crate::runner::{RunOutcome, TaskRunner, drive_run};

/// Fallback worker count when the host's parallelism cannot be queried.
const DEFAULT_MAX_WORKERS: usize = 4;

/// Counters accumulated by a [`ThreadPoolRunner`] over its lifetime.
///
/// `submitted` is incremented at submission; the other counters when a
/// worker finishes with a run, so they lag `submitted` while work is in
/// flight and reconcile once the queue drains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolTelemetry {
    /// Runs accepted by `submit`.
    pub submitted: u64,
    /// Runs whose body returned a value.
    pub completed: u64,
    /// Runs that failed, including dependency failures.
    pub failed: u64,
    /// Runs whose body panicked.
    pub crashed: u64,
    /// Runs cancelled before their body executed.
    pub cancelled: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    crashed: AtomicU64,
    cancelled: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PoolTelemetry {
        PoolTelemetry {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            crashed: self.crashed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

struct QueuedRun {
    call: TaskCall,
    future: TaskFuture,
}

struct PoolQueue {
    items: VecDeque<QueuedRun>,
    shutdown: bool,
}

struct PoolShared {
    queue: Mutex<PoolQueue>,
    signal: Condvar,
    counters: Counters,
}

/// The default in-process backend: `max_workers` threads executing queued
/// runs concurrently.
///
/// The runner is an explicit execution context — construct it at the top of
/// an execution scope, pass it to `submit`/`map`, and let it drop (or call
/// [`wait_for_all_submissions`](TaskRunner::wait_for_all_submissions)) at
/// the end of the scope to guarantee no orphaned background work.
pub struct ThreadPoolRunner {
    shared: Arc<PoolShared>,
    submissions: Mutex<Vec<TaskFuture>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPoolRunner {
    /// Pool sized to the host's available parallelism.
    pub fn new() -> Self {
        Self::with_max_workers(default_max_workers())
    }

    /// Pool with an explicit worker bound; at most `max_workers` runs are
    /// executing at any instant. Values below one are clamped to one.
    pub fn with_max_workers(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        let shared = Arc::new(PoolShared {
            queue: Mutex::new(PoolQueue {
                items: VecDeque::new(),
                shutdown: false,
            }),
            signal: Condvar::new(),
            counters: Counters::default(),
        });

        let workers = (0..max_workers)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || worker_loop(shared))
            })
            .collect();

        debug!(max_workers, "thread pool runner started");
        Self {
            shared,
            submissions: Mutex::new(Vec::new()),
            workers,
        }
    }

    /// Snapshot of the pool's lifetime counters.
    pub fn telemetry(&self) -> PoolTelemetry {
        self.shared.counters.snapshot()
    }
}

impl Default for ThreadPoolRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRunner for ThreadPoolRunner {
    fn submit(&self, call: TaskCall) -> TaskFuture {
        let future = TaskFuture::pending(call.task.name());
        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        self.submissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(future.clone());

        debug!(id = %future.id(), task = %future.task_name(), "task run submitted");
        {
            let mut queue = self.shared.queue.lock().unwrap_or_else(PoisonError::into_inner);
            queue.items.push_back(QueuedRun {
                call,
                future: future.clone(),
            });
        }
        self.shared.signal.notify_one();
        future
    }

    fn wait_for_all_submissions(&self) {
        // Snapshot first: waits must not hold the submissions lock, and runs
        // submitted while draining are picked up by the next call.
        let outstanding = self.submissions.lock().unwrap_or_else(PoisonError::into_inner).clone();
        debug!(outstanding = outstanding.len(), "draining task runner submissions");
        for future in outstanding {
            let _ = future.wait(None);
        }
    }
}

impl Drop for ThreadPoolRunner {
    fn drop(&mut self) {
        {
            let mut queue = self.shared.queue.lock().unwrap_or_else(PoisonError::into_inner);
            queue.shutdown = true;
        }
        self.shared.signal.notify_all();
        // Workers drain the queue before exiting, so joining here guarantees
        // every produced future is terminal when the scope closes.
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn default_max_workers() -> usize {
    thread::available_parallelism().map(|count| count.get()).unwrap_or(DEFAULT_MAX_WORKERS)
}

fn worker_loop(shared: Arc<PoolShared>) {
    loop {
        let run = {
            let mut queue = shared.queue.lock().unwrap_or_else(PoisonError::into_inner);
            loop {
                if let Some(run) = queue.items.pop_front() {
                    break run;
                }
                if queue.shutdown {
                    return;
                }
                queue = shared.signal.wait(queue).unwrap_or_else(PoisonError::into_inner);
            }
        };

        let counter = match drive_run(&run.call, &run.future) {
            RunOutcome::Completed => &shared.counters.completed,
            RunOutcome::Failed => &shared.counters.failed,
            RunOutcome::Crashed => &shared.counters.crashed,
            RunOutcome::Cancelled => &shared.counters.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
