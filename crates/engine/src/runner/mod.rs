//! Executor backends.
//!
//! [`TaskRunner`] is the pluggable contract every backend satisfies: accept a
//! submission, hand back a future without blocking on execution, and
//! guarantee progress independent of the caller. The default backend is the
//! in-process [`ThreadPoolRunner`]; [`ImmediateRunner`] executes inline for
//! tests and previews. Remote cluster backends implement the same trait and
//! reuse [`drive_run`]'s resolution semantics through
//! [`resolve_call`](crate::resolve::resolve_call).

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use gantry_types::{RunError, State};

use crate::call::TaskCall;
use crate::future::TaskFuture;
use crate::resolve;

pub mod thread_pool;

pub use thread_pool::ThreadPoolRunner;

/// Pluggable executor contract.
///
/// Implementations must return from `submit` without executing the call on
/// the calling thread's critical path, execute each submission at most once,
/// and drive the submitted future through exactly the documented state
/// machine: `Pending -> Running -> {Completed | Failed | Crashed}`, with
/// `Cancelled` reachable from `Pending`.
pub trait TaskRunner {
    /// Accept a unit of work and return its future immediately.
    fn submit(&self, call: TaskCall) -> TaskFuture;

    /// Block until every future this runner produced is terminal, so no
    /// background work outlives the caller's execution scope.
    fn wait_for_all_submissions(&self);
}

/// What happened to a driven run; backends feed this into their accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunOutcome {
    Completed,
    Failed,
    Crashed,
    Cancelled,
}

/// Resolve dependencies, execute the body, and finalize one run on the
/// current thread. Shared by every in-process backend.
pub(crate) fn drive_run(call: &TaskCall, future: &TaskFuture) -> RunOutcome {
    if future.state().is_terminal() {
        // Cancelled between submission and dequeue: never execute.
        debug!(id = %future.id(), task = %future.task_name(), "skipping cancelled task run");
        return RunOutcome::Cancelled;
    }

    let resolved = match resolve::resolve_call(call) {
        Ok(resolved) => resolved,
        Err(error) => {
            warn!(id = %future.id(), task = %future.task_name(), %error, "task run failed before start");
            future.transition(State::failed(error));
            return RunOutcome::Failed;
        }
    };

    if !future.transition(State::running()) {
        // Cancelled while dependencies were resolving.
        return RunOutcome::Cancelled;
    }

    match panic::catch_unwind(AssertUnwindSafe(|| call.task.invoke(resolved))) {
        Ok(Ok(value)) => {
            debug!(id = %future.id(), task = %future.task_name(), "task run completed");
            future.transition(State::completed(value));
            RunOutcome::Completed
        }
        Ok(Err(error)) => {
            let error = RunError::TaskFailed {
                message: format!("{error:#}"),
            };
            debug!(id = %future.id(), task = %future.task_name(), %error, "task run failed");
            future.transition(State::failed(error));
            RunOutcome::Failed
        }
        Err(payload) => {
            let error = RunError::Crashed {
                message: panic_message(payload),
            };
            warn!(id = %future.id(), task = %future.task_name(), %error, "task run crashed");
            future.transition(State::crashed(error));
            RunOutcome::Crashed
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task body panicked".to_string()
    }
}

/// Inline backend: executes each submission on the calling thread before
/// returning the already-terminal future.
///
/// Useful for tests and previews where determinism beats concurrency; it is
/// not a scheduling backend and `submit` blocks for the duration of the
/// body.
pub struct ImmediateRunner;

impl TaskRunner for ImmediateRunner {
    fn submit(&self, call: TaskCall) -> TaskFuture {
        let future = TaskFuture::pending(call.task.name());
        drive_run(&call, &future);
        future
    }

    fn wait_for_all_submissions(&self) {}
}
