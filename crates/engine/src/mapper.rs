//! Fan-out engine: turns one call with sequence arguments into one
//! submission per element.
//!
//! Sequence arguments are "mapped" and contribute their i-th element to the
//! i-th submission; everything else — scalars, futures, mappings, and
//! [`unmapped`](crate::call::unmapped)-wrapped arguments — is "broadcast"
//! verbatim into every submission. Length and shape problems are raised
//! before anything is submitted, so a bad map call queues no partial work.

use tracing::debug;

use gantry_types::RunError;

use crate::call::{ArgItem, Argument, TaskCall};
use crate::future_list::FutureList;
use crate::runner::TaskRunner;

enum Slot {
    Mapped(Vec<ArgItem>),
    Broadcast(Argument),
}

fn classify(argument: Argument) -> Slot {
    match argument {
        Argument::Sequence(items) => Slot::Mapped(items),
        // Unwrapped here: the marker has done its job once mapping is decided.
        Argument::Unmapped(inner) => Slot::Broadcast(*inner),
        other => Slot::Broadcast(other),
    }
}

fn slot_argument(slot: &Slot, index: usize) -> Argument {
    match slot {
        Slot::Mapped(items) => Argument::Item(items[index].clone()),
        Slot::Broadcast(argument) => argument.clone(),
    }
}

/// Expand `call` into one submission per element of its mapped arguments and
/// submit each to `runner`.
///
/// Fails with [`RunError::NoIterableArgument`] when no argument is a
/// sequence, and with [`RunError::LengthMismatch`] when two or more mapped
/// arguments disagree on length. Both checks run before any submission.
pub fn map_call(call: TaskCall, runner: &dyn TaskRunner) -> Result<FutureList, RunError> {
    let TaskCall {
        task,
        args,
        kwargs,
        wait_for,
    } = call;

    let positional: Vec<Slot> = args.into_iter().map(classify).collect();
    let keyword: Vec<(String, Slot)> = kwargs.into_iter().map(|(name, argument)| (name, classify(argument))).collect();

    let lengths: Vec<usize> = positional
        .iter()
        .chain(keyword.iter().map(|(_, slot)| slot))
        .filter_map(|slot| match slot {
            Slot::Mapped(items) => Some(items.len()),
            Slot::Broadcast(_) => None,
        })
        .collect();

    if lengths.is_empty() {
        return Err(RunError::NoIterableArgument);
    }
    if lengths.windows(2).any(|pair| pair[0] != pair[1]) {
        return Err(RunError::LengthMismatch { lengths });
    }
    let count = lengths[0];

    let mut futures = Vec::with_capacity(count);
    for index in 0..count {
        let mut element = TaskCall::new(task.clone());
        for slot in &positional {
            element = element.arg(slot_argument(slot, index));
        }
        for (name, slot) in &keyword {
            element = element.kwarg(name.clone(), slot_argument(slot, index));
        }
        for future in &wait_for {
            element = element.wait_for(future.clone());
        }
        futures.push(runner.submit(element));
    }

    debug!(task = %task.name(), count, "mapped task call fanned out");
    Ok(FutureList::new(futures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::unmapped;
    use crate::future::TaskFuture;
    use crate::runner::{ImmediateRunner, drive_run};
    use crate::task::Task;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Inline runner that also counts submissions, so tests can assert that
    /// failed map calls queue nothing.
    #[derive(Default)]
    struct CountingRunner {
        submissions: AtomicUsize,
    }

    impl TaskRunner for CountingRunner {
        fn submit(&self, call: TaskCall) -> TaskFuture {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            let future = TaskFuture::pending(call.task.name());
            drive_run(&call, &future);
            future
        }

        fn wait_for_all_submissions(&self) {}
    }

    fn add_task() -> Task {
        Task::new("add", |args| {
            let x = args.get(0).and_then(Value::as_i64).unwrap_or(0);
            let y: i64 = args
                .get(1)
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(Value::as_i64).sum())
                .unwrap_or(0);
            Ok(json!(x + y))
        })
    }

    #[test]
    fn fans_out_with_broadcast_unmapped_argument() {
        let runner = ImmediateRunner;
        let list = add_task()
            .map(
                &runner,
                [
                    Argument::sequence([json!(1), json!(2), json!(3)]),
                    unmapped(Argument::sequence([json!(10), json!(20)])),
                ],
            )
            .expect("map");

        assert_eq!(list.len(), 3);
        let values = list.result(true, None).expect("all completed");
        assert_eq!(values, vec![json!(31), json!(32), json!(33)]);
    }

    #[test]
    fn length_mismatch_fails_before_any_submission() {
        let runner = CountingRunner::default();
        let error = add_task()
            .map(
                &runner,
                [
                    Argument::sequence([json!(1), json!(2), json!(3)]),
                    Argument::sequence([json!(1), json!(2)]),
                ],
            )
            .expect_err("unequal lengths");

        assert_eq!(error, RunError::LengthMismatch { lengths: vec![3, 2] });
        assert_eq!(runner.submissions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn map_without_sequences_fails_fast() {
        let runner = CountingRunner::default();
        let error = add_task()
            .map(&runner, [Argument::from(json!(1)), unmapped(Argument::sequence([json!(2)]))])
            .expect_err("nothing to map over");

        assert_eq!(error, RunError::NoIterableArgument);
        assert_eq!(runner.submissions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_sequence_maps_to_an_empty_list() {
        let runner = CountingRunner::default();
        let list = add_task()
            .map(&runner, [Argument::sequence(Vec::<Value>::new())])
            .expect("map of empty sequence");

        assert!(list.is_empty());
        assert_eq!(runner.submissions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn mapped_kwargs_take_their_element_per_index() {
        let runner = ImmediateRunner;
        let task = Task::new("shift", |args| {
            let base = args.kw("base").and_then(Value::as_i64).unwrap_or(0);
            let offset = args.kw("offset").and_then(Value::as_i64).unwrap_or(0);
            Ok(json!(base + offset))
        });

        let list = task
            .call()
            .kwarg("base", Argument::sequence([json!(100), json!(200)]))
            .kwarg("offset", json!(5))
            .map(&runner)
            .expect("map over kwarg");

        let values = list.result(true, None).expect("all completed");
        assert_eq!(values, vec![json!(105), json!(205)]);
    }

    #[test]
    fn futures_in_a_mapped_sequence_resolve_per_element() {
        let runner = ImmediateRunner;
        let seed = Task::new("seed", |args| Ok(args.get(0).cloned().unwrap_or(Value::Null)));
        let one = seed.submit(&runner, [json!(1).into()]);
        let two = seed.submit(&runner, [json!(2).into()]);

        let double = Task::new("double", |args| {
            let x = args.get(0).and_then(Value::as_i64).unwrap_or(0);
            Ok(json!(x * 2))
        });
        let list = double
            .map(&runner, [Argument::sequence([ArgItem::from(one), ArgItem::from(two)])])
            .expect("map over futures");

        let values = list.result(true, None).expect("all completed");
        assert_eq!(values, vec![json!(2), json!(4)]);
    }
}
