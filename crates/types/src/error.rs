//! Error taxonomy for task runs and blocking observers.
//!
//! A single enum covers both halves of the contract: errors that become part
//! of a run's terminal state (`TaskFailed`, `Crashed`, `FailedDependency`) and
//! errors raised synchronously to a caller (`Timeout`, `LengthMismatch`,
//! `NoIterableArgument`, `CancellationRejected`). Errors embedded in a state
//! are read back idempotently, so every variant is cheap to clone.

use std::time::Duration;

use serde::Serialize;

/// Error raised by the Gantry runtime or captured from a task run.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunError {
    /// The task body itself returned an error. This is the expected domain
    /// failure path and maps to the `Failed` state.
    #[error("task failed: {message}")]
    TaskFailed {
        /// Rendered message of the error returned by the task body.
        message: String,
    },
    /// The runtime or backend failed around the task (for example the body
    /// panicked or a worker died). Maps to the `Crashed` state so callers can
    /// tell "my logic failed" from "the platform failed me".
    #[error("task crashed: {message}")]
    Crashed {
        /// Rendered description of the infrastructure failure.
        message: String,
    },
    /// Cancellation took effect before or during execution.
    #[error("task run was cancelled")]
    Cancelled,
    /// Cancellation was requested while the run was already executing on a
    /// backend that does not preempt; the run continues to completion.
    #[error("cancellation rejected: run is already executing")]
    CancellationRejected,
    /// A blocking `wait`/`result` call expired. The underlying run is not
    /// cancelled and can be waited on again later.
    #[error("timed out after {waited:?} waiting for task run")]
    Timeout {
        /// The timeout the caller supplied.
        waited: Duration,
    },
    /// Two or more mapped arguments had different lengths. Raised before any
    /// submission is issued.
    #[error("mapped arguments have mismatched lengths: {lengths:?}")]
    LengthMismatch {
        /// Observed length of each mapped argument, in argument order.
        lengths: Vec<usize>,
    },
    /// `map` was called without any sequence argument to fan out over.
    #[error("map requires at least one sequence argument")]
    NoIterableArgument,
    /// One or more upstream dependencies finished in a state that cannot
    /// supply a value. The downstream run is placed in `Failed` with this
    /// error rather than silently skipped.
    #[error("upstream dependencies did not complete: {}", .runs.join(", "))]
    FailedDependency {
        /// Human-readable description of each offending upstream run.
        runs: Vec<String>,
    },
}

impl RunError {
    /// True for the variants that describe a run's own terminal failure
    /// rather than an observer-side condition.
    pub fn is_run_failure(&self) -> bool {
        matches!(
            self,
            RunError::TaskFailed { .. } | RunError::Crashed { .. } | RunError::FailedDependency { .. }
        )
    }
}
