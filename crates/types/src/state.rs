//! Lifecycle states for submitted task runs.
//!
//! A [`State`] is an immutable record of where a run is in its lifecycle and,
//! for terminal states, what it produced. Runs move `Pending -> Running ->
//! {Completed | Failed | Crashed}`, or are cancelled before they start; the
//! transition discipline itself (monotonic, terminal-is-final) is enforced by
//! the future that owns the state, not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RunError;

/// Lifecycle stage of a task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    /// Submitted and queued, not yet picked up by a worker.
    Pending,
    /// A worker is executing the task body.
    Running,
    /// The body returned a value.
    Completed,
    /// The body returned an error, or an upstream dependency failed.
    Failed,
    /// The runtime failed around the body (panic, dead worker).
    Crashed,
    /// Cancellation took effect before the body ran.
    Cancelled,
}

impl StateKind {
    /// True once a run can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StateKind::Completed | StateKind::Failed | StateKind::Crashed | StateKind::Cancelled
        )
    }

    /// True only for the two failure kinds; cancellation is not a failure.
    pub fn is_failed(self) -> bool {
        matches!(self, StateKind::Failed | StateKind::Crashed)
    }
}

impl std::fmt::Display for StateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StateKind::Pending => "pending",
            StateKind::Running => "running",
            StateKind::Completed => "completed",
            StateKind::Failed => "failed",
            StateKind::Crashed => "crashed",
            StateKind::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Terminal payload of a run: the produced value or the captured error.
#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    Value(Value),
    Error(RunError),
}

/// Immutable snapshot of a run's lifecycle stage and terminal payload.
///
/// The payload is populated if and only if the kind is terminal: `Completed`
/// carries the produced value, `Failed`/`Crashed` carry the captured error,
/// and `Cancelled` carries nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    kind: StateKind,
    outcome: Option<Outcome>,
    timestamp: DateTime<Utc>,
}

impl State {
    fn new(kind: StateKind, outcome: Option<Outcome>) -> Self {
        Self {
            kind,
            outcome,
            timestamp: Utc::now(),
        }
    }

    /// A freshly submitted run.
    pub fn pending() -> Self {
        Self::new(StateKind::Pending, None)
    }

    /// A run picked up by a worker.
    pub fn running() -> Self {
        Self::new(StateKind::Running, None)
    }

    /// A run whose body returned `value`.
    pub fn completed(value: Value) -> Self {
        Self::new(StateKind::Completed, Some(Outcome::Value(value)))
    }

    /// A run whose body (or an upstream dependency) failed with `error`.
    pub fn failed(error: RunError) -> Self {
        Self::new(StateKind::Failed, Some(Outcome::Error(error)))
    }

    /// A run the runtime failed around; `error` describes the infrastructure
    /// fault.
    pub fn crashed(error: RunError) -> Self {
        Self::new(StateKind::Crashed, Some(Outcome::Error(error)))
    }

    /// A run cancelled before its body executed.
    pub fn cancelled() -> Self {
        Self::new(StateKind::Cancelled, None)
    }

    /// Lifecycle stage of this snapshot.
    pub fn kind(&self) -> StateKind {
        self.kind
    }

    /// When this state was entered.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// True once the run can no longer change state.
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    /// True only for `Failed`/`Crashed`.
    pub fn is_failed(&self) -> bool {
        self.kind.is_failed()
    }

    /// The produced value, present only when `Completed`.
    pub fn value(&self) -> Option<&Value> {
        match &self.outcome {
            Some(Outcome::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// The captured error, present only when `Failed`/`Crashed`.
    pub fn error(&self) -> Option<&RunError> {
        match &self.outcome {
            Some(Outcome::Error(error)) => Some(error),
            _ => None,
        }
    }
}
