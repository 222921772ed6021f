//! Dependency resolution: replaces futures embedded in a call's arguments
//! with their produced values before the body executes.
//!
//! Resolution happens at invocation time inside the runner, not at
//! submission time. Every discovered future is waited on (never `result`ed)
//! so sibling arguments keep being checked and the failure report covers all
//! offending upstream runs, then values are substituted back into their
//! structural positions. A call is never invoked with partially resolved
//! arguments.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use gantry_types::{RunError, State, StateKind};

use crate::call::{ArgItem, Argument, TaskCall};
use crate::future::TaskFuture;
use crate::task::ResolvedArgs;

/// Resolve every future reachable in `call`'s arguments, returning the
/// concrete arguments for the task body.
///
/// Blocks until all discovered futures (and `wait_for` entries) are
/// terminal. Fails with [`RunError::FailedDependency`] naming every upstream
/// run that finished Failed/Crashed — or, for data dependencies, Cancelled,
/// since a cancelled run cannot supply a value. A cancelled `wait_for` entry
/// satisfies ordering: it is terminal and carries no data.
pub fn resolve_call(call: &TaskCall) -> Result<ResolvedArgs, RunError> {
    let mut futures: Vec<TaskFuture> = Vec::new();
    for argument in &call.args {
        collect_futures(argument, &mut futures);
    }
    for argument in call.kwargs.values() {
        collect_futures(argument, &mut futures);
    }

    if !futures.is_empty() || !call.wait_for.is_empty() {
        debug!(
            task = %call.task.name(),
            data_dependencies = futures.len(),
            ordering_dependencies = call.wait_for.len(),
            "resolving task call dependencies"
        );
    }

    let mut failures: Vec<String> = Vec::new();
    for future in &futures {
        future.wait(None)?;
        let state = future.state();
        match state.kind() {
            StateKind::Failed | StateKind::Crashed | StateKind::Cancelled => {
                failures.push(describe(future, &state));
            }
            _ => {}
        }
    }
    for future in &call.wait_for {
        future.wait(None)?;
        let state = future.state();
        if state.is_failed() {
            failures.push(describe(future, &state));
        }
    }
    if !failures.is_empty() {
        return Err(RunError::FailedDependency { runs: failures });
    }

    let mut positional = Vec::with_capacity(call.args.len());
    for argument in &call.args {
        positional.push(substitute(argument)?);
    }
    let mut keyword = IndexMap::with_capacity(call.kwargs.len());
    for (name, argument) in &call.kwargs {
        keyword.insert(name.clone(), substitute(argument)?);
    }
    Ok(ResolvedArgs { positional, keyword })
}

fn collect_futures(argument: &Argument, found: &mut Vec<TaskFuture>) {
    match argument {
        Argument::Item(ArgItem::Future(future)) => found.push(future.clone()),
        Argument::Item(ArgItem::Value(_)) => {}
        Argument::Sequence(items) => {
            for item in items {
                if let ArgItem::Future(future) = item {
                    found.push(future.clone());
                }
            }
        }
        Argument::Mapping(entries) => {
            for item in entries.values() {
                if let ArgItem::Future(future) = item {
                    found.push(future.clone());
                }
            }
        }
        Argument::Unmapped(inner) => collect_futures(inner, found),
    }
}

fn substitute(argument: &Argument) -> Result<Value, RunError> {
    match argument {
        Argument::Item(item) => item_value(item),
        Argument::Sequence(items) => {
            let values: Result<Vec<Value>, RunError> = items.iter().map(item_value).collect();
            Ok(Value::Array(values?))
        }
        Argument::Mapping(entries) => {
            let mut object = serde_json::Map::with_capacity(entries.len());
            for (key, item) in entries {
                object.insert(key.clone(), item_value(item)?);
            }
            Ok(Value::Object(object))
        }
        Argument::Unmapped(inner) => substitute(inner),
    }
}

fn item_value(item: &ArgItem) -> Result<Value, RunError> {
    match item {
        ArgItem::Value(value) => Ok(value.clone()),
        ArgItem::Future(future) => {
            let state = future.state();
            match state.value() {
                Some(value) => Ok(value.clone()),
                // Guarded by the failure sweep above; a terminal run without
                // a value cannot supply data.
                None => Err(RunError::FailedDependency {
                    runs: vec![describe(future, &state)],
                }),
            }
        }
    }
}

fn describe(future: &TaskFuture, state: &State) -> String {
    match state.error() {
        Some(error) => format!("{} ({}) {}: {}", future.task_name(), future.id(), state.kind(), error),
        None => format!("{} ({}) {}", future.task_name(), future.id(), state.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::unmapped;
    use crate::task::Task;
    use serde_json::json;

    fn completed(name: &str, value: Value) -> TaskFuture {
        let future = TaskFuture::pending(name);
        future.transition(State::completed(value));
        future
    }

    fn failed(name: &str, message: &str) -> TaskFuture {
        let future = TaskFuture::pending(name);
        future.transition(State::failed(RunError::TaskFailed { message: message.into() }));
        future
    }

    fn noop_task() -> Task {
        Task::new("noop", |_| Ok(json!(null)))
    }

    #[test]
    fn substitutes_direct_future_arguments() {
        let call = noop_task().call().arg(json!(1)).arg(completed("upstream", json!(41)));
        let resolved = resolve_call(&call).expect("resolve");
        assert_eq!(resolved.positional, vec![json!(1), json!(41)]);
    }

    #[test]
    fn substitutes_futures_one_level_inside_containers() {
        let call = noop_task()
            .call()
            .arg(Argument::sequence([
                ArgItem::from(json!(1)),
                ArgItem::from(completed("a", json!(2))),
            ]))
            .kwarg(
                "config",
                Argument::mapping([
                    ("base".to_string(), ArgItem::from(json!(10))),
                    ("extra".to_string(), ArgItem::from(completed("b", json!(20)))),
                ]),
            );

        let resolved = resolve_call(&call).expect("resolve");
        assert_eq!(resolved.positional, vec![json!([1, 2])]);
        assert_eq!(resolved.kw("config"), Some(&json!({"base": 10, "extra": 20})));
    }

    #[test]
    fn unmapped_wrappers_are_transparent() {
        let call = noop_task().call().arg(unmapped(completed("wrapped", json!(5))));
        let resolved = resolve_call(&call).expect("resolve");
        assert_eq!(resolved.positional, vec![json!(5)]);
    }

    #[test]
    fn reports_every_failed_dependency_at_once() {
        let call = noop_task()
            .call()
            .arg(failed("first", "bad input"))
            .arg(completed("fine", json!(1)))
            .arg(Argument::sequence([ArgItem::from(failed("second", "io error"))]));

        let error = resolve_call(&call).expect_err("two upstream failures");
        match error {
            RunError::FailedDependency { runs } => {
                assert_eq!(runs.len(), 2);
                assert!(runs[0].contains("first"));
                assert!(runs[0].contains("bad input"));
                assert!(runs[1].contains("second"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn cancelled_data_dependency_fails_the_call() {
        let cancelled = TaskFuture::pending("dropped");
        cancelled.cancel().expect("cancel pending run");

        let call = noop_task().call().arg(cancelled);
        let error = resolve_call(&call).expect_err("no value to substitute");
        assert!(matches!(error, RunError::FailedDependency { .. }));
    }

    #[test]
    fn wait_for_failure_blocks_the_call() {
        let call = noop_task().call().arg(json!(1)).wait_for(failed("guard", "boom"));
        let error = resolve_call(&call).expect_err("ordering dependency failed");
        match error {
            RunError::FailedDependency { runs } => assert!(runs[0].contains("guard")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn cancelled_wait_for_satisfies_ordering() {
        let cancelled = TaskFuture::pending("sequencing-only");
        cancelled.cancel().expect("cancel pending run");

        let call = noop_task().call().arg(json!(1)).wait_for(cancelled);
        let resolved = resolve_call(&call).expect("cancelled wait_for still sequences");
        assert_eq!(resolved.positional, vec![json!(1)]);
    }
}
