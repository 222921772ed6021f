//! Future handles for submitted task runs.
//!
//! Exactly one [`TaskFuture`] is created per submission. Clones share the
//! same interior, which is how downstream submissions reference an upstream
//! run without owning it. A future's `Mutex<State>` is the only state mutated
//! across thread boundaries in the engine: every write goes through
//! [`TaskFuture::transition`], which refuses to move out of a terminal state
//! and signals waiters exactly once, when the terminal state arrives.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use gantry_types::{RunError, State, StateKind};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of one submitted task run, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RunId(u64);

impl RunId {
    pub(crate) fn next() -> Self {
        RunId(NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

struct Shared {
    state: Mutex<State>,
    done: Condvar,
}

/// Handle to one submitted task run.
///
/// Offers blocking ([`wait`](TaskFuture::wait), [`result`](TaskFuture::result))
/// and non-blocking ([`state`](TaskFuture::state)) access to the run's
/// lifecycle. Once the run reaches a terminal state the handle never changes
/// again; repeated reads return the same value or error.
#[derive(Clone)]
pub struct TaskFuture {
    id: RunId,
    task_name: Arc<str>,
    shared: Arc<Shared>,
}

impl fmt::Debug for TaskFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFuture")
            .field("id", &self.id)
            .field("task", &self.task_name)
            .field("state", &self.state().kind())
            .finish()
    }
}

impl TaskFuture {
    /// Create the pending handle for a fresh submission.
    pub(crate) fn pending(task_name: &str) -> Self {
        Self {
            id: RunId::next(),
            task_name: Arc::from(task_name),
            shared: Arc::new(Shared {
                state: Mutex::new(State::pending()),
                done: Condvar::new(),
            }),
        }
    }

    /// Identifier of the underlying run.
    pub fn id(&self) -> RunId {
        self.id
    }

    /// Name of the task this run executes, for diagnostics.
    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state snapshot, without blocking. Callers poll with
    /// `future.state().is_failed()` and similar.
    pub fn state(&self) -> State {
        self.lock_state().clone()
    }

    /// Move the run to `next`, refusing once a terminal state is reached.
    ///
    /// Waiters are signalled only on the transition into a terminal state, so
    /// the completion primitive fires exactly once per run. Returns false if
    /// the run was already terminal (for example cancelled while queued).
    pub(crate) fn transition(&self, next: State) -> bool {
        let mut state = self.lock_state();
        if state.is_terminal() {
            return false;
        }
        debug!(
            id = %self.id,
            task = %self.task_name,
            from = %state.kind(),
            to = %next.kind(),
            "task run state transition"
        );
        let terminal = next.is_terminal();
        *state = next;
        drop(state);
        if terminal {
            self.shared.done.notify_all();
        }
        true
    }

    /// Block until the run reaches a terminal state or `timeout` elapses.
    ///
    /// Returns `Ok` for any terminal state, success or failure; waiting never
    /// surfaces the task's own error. On expiry the caller unblocks with
    /// [`RunError::Timeout`] while the underlying run keeps going and can be
    /// waited on again.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<(), RunError> {
        let state = self.lock_state();
        match timeout {
            None => {
                let _state = self
                    .shared
                    .done
                    .wait_while(state, |state| !state.is_terminal())
                    .unwrap_or_else(PoisonError::into_inner);
                Ok(())
            }
            Some(limit) => {
                let (state, outcome) = self
                    .shared
                    .done
                    .wait_timeout_while(state, limit, |state| !state.is_terminal())
                    .unwrap_or_else(PoisonError::into_inner);
                if outcome.timed_out() && !state.is_terminal() {
                    Err(RunError::Timeout { waited: limit })
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Wait for the run and return its produced value.
    ///
    /// `Completed` yields the value. `Failed`/`Crashed` yield the captured
    /// error when `raise_on_failure` is set, otherwise the error rendered as
    /// a JSON value so fire-and-forget pipelines can inspect it without
    /// propagation. `Cancelled` always yields [`RunError::Cancelled`],
    /// regardless of the flag.
    pub fn result(&self, raise_on_failure: bool, timeout: Option<Duration>) -> Result<Value, RunError> {
        self.wait(timeout)?;
        let state = self.state();
        if let Some(value) = state.value() {
            return Ok(value.clone());
        }
        match state.error() {
            Some(error) if raise_on_failure => Err(error.clone()),
            Some(error) => Ok(error_as_value(error)),
            // Cancelled is the only terminal kind with no payload.
            None => Err(RunError::Cancelled),
        }
    }

    /// Request cancellation of the run.
    ///
    /// A pending run moves straight to `Cancelled` and is never executed. A
    /// run that is already executing is not preempted by the default backend,
    /// so cancellation is rejected and the run continues to completion.
    /// Cancelling an already-terminal run is a no-op.
    pub fn cancel(&self) -> Result<(), RunError> {
        let mut state = self.lock_state();
        match state.kind() {
            StateKind::Pending => {
                *state = State::cancelled();
                drop(state);
                self.shared.done.notify_all();
                debug!(id = %self.id, task = %self.task_name, "task run cancelled before start");
                Ok(())
            }
            StateKind::Running => Err(RunError::CancellationRejected),
            _ => Ok(()),
        }
    }
}

fn error_as_value(error: &RunError) -> Value {
    serde_json::to_value(error).unwrap_or_else(|_| Value::String(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn terminal_states_are_final_and_reads_idempotent() {
        let future = TaskFuture::pending("demo");
        assert!(future.transition(State::running()));
        assert!(future.transition(State::completed(json!(7))));
        assert!(!future.transition(State::failed(RunError::TaskFailed { message: "late".into() })));

        for _ in 0..3 {
            assert_eq!(future.state().kind(), StateKind::Completed);
            assert_eq!(future.result(true, None).expect("completed result"), json!(7));
        }
    }

    #[test]
    fn wait_times_out_without_touching_the_run() {
        let future = TaskFuture::pending("slow");
        let error = future.wait(Some(Duration::from_millis(10))).expect_err("pending run");
        assert!(matches!(error, RunError::Timeout { .. }));
        assert_eq!(future.state().kind(), StateKind::Pending);

        // The run can still finish and be waited on again.
        assert!(future.transition(State::completed(json!(null))));
        future.wait(Some(Duration::from_millis(10))).expect("terminal wait");
    }

    #[test]
    fn wait_returns_ok_for_failed_runs() {
        let future = TaskFuture::pending("broken");
        future.transition(State::failed(RunError::TaskFailed { message: "boom".into() }));
        future.wait(None).expect("wait never raises the task's error");
    }

    #[test]
    fn result_respects_raise_on_failure() {
        let future = TaskFuture::pending("broken");
        let captured = RunError::TaskFailed { message: "boom".into() };
        future.transition(State::failed(captured.clone()));

        assert_eq!(future.result(true, None).expect_err("raising flavor"), captured);

        let lenient = future.result(false, None).expect("error as value");
        assert_eq!(lenient["kind"], "task_failed");
        assert_eq!(lenient["message"], "boom");
    }

    #[test]
    fn cancelled_runs_error_regardless_of_flag() {
        let future = TaskFuture::pending("doomed");
        future.cancel().expect("cancel pending run");
        assert_eq!(future.state().kind(), StateKind::Cancelled);
        assert_eq!(future.result(true, None).expect_err("raising"), RunError::Cancelled);
        assert_eq!(future.result(false, None).expect_err("lenient"), RunError::Cancelled);
    }

    #[test]
    fn cancel_is_rejected_while_running_and_noop_after_terminal() {
        let future = TaskFuture::pending("busy");
        future.transition(State::running());
        assert_eq!(future.cancel().expect_err("running run"), RunError::CancellationRejected);

        future.transition(State::completed(json!(1)));
        future.cancel().expect("terminal cancel is a no-op");
        assert_eq!(future.state().kind(), StateKind::Completed);
    }

    #[test]
    fn cancel_wakes_blocked_waiters() {
        let future = TaskFuture::pending("queued");
        let waiter = {
            let future = future.clone();
            std::thread::spawn(move || future.wait(Some(Duration::from_secs(5))))
        };
        std::thread::sleep(Duration::from_millis(20));
        future.cancel().expect("cancel pending run");
        waiter.join().expect("waiter thread").expect("wait observes terminal state");
    }
}
