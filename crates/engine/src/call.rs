//! The argument model and the call payload handed to a runner.
//!
//! Arguments are explicit about where futures may appear: a leaf [`ArgItem`]
//! is either a concrete JSON value or a [`TaskFuture`], and containers hold
//! leaves only. That bounds structural future traversal to exactly one level
//! of sequence/mapping nesting by construction — a JSON array or object
//! stored as a plain [`ArgItem::Value`] is opaque data, never traversed.

use indexmap::IndexMap;
use serde_json::Value;

use gantry_types::RunError;

use crate::future::TaskFuture;
use crate::future_list::FutureList;
use crate::mapper;
use crate::runner::TaskRunner;
use crate::task::Task;

/// Leaf argument: a concrete value, or a future resolved before execution.
#[derive(Debug, Clone)]
pub enum ArgItem {
    /// A concrete JSON payload, passed through verbatim.
    Value(Value),
    /// A handle to an upstream run; the dependency resolver replaces it with
    /// the run's produced value before the downstream body executes.
    Future(TaskFuture),
}

impl From<Value> for ArgItem {
    fn from(value: Value) -> Self {
        ArgItem::Value(value)
    }
}

impl From<TaskFuture> for ArgItem {
    fn from(future: TaskFuture) -> Self {
        ArgItem::Future(future)
    }
}

/// One argument of a task call.
#[derive(Debug, Clone)]
pub enum Argument {
    /// A single value-or-future leaf.
    Item(ArgItem),
    /// Ordered container. Futures inside are resolved in place; the mapper
    /// fans out over the elements unless the sequence is wrapped in
    /// [`unmapped`].
    Sequence(Vec<ArgItem>),
    /// Keyed container, resolved to a JSON object. Never fanned out.
    Mapping(IndexMap<String, ArgItem>),
    /// Marker exempting the inner argument from map expansion. Transparent
    /// everywhere else: the resolver and the task body see the inner value.
    Unmapped(Box<Argument>),
}

impl Argument {
    /// Build an ordered container argument from anything leaf-convertible.
    pub fn sequence<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ArgItem>,
    {
        Argument::Sequence(items.into_iter().map(Into::into).collect())
    }

    /// Build a keyed container argument.
    pub fn mapping<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, ArgItem)>,
        K: Into<String>,
    {
        Argument::Mapping(entries.into_iter().map(|(key, item)| (key.into(), item)).collect())
    }
}

impl From<ArgItem> for Argument {
    fn from(item: ArgItem) -> Self {
        Argument::Item(item)
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Item(ArgItem::Value(value))
    }
}

impl From<TaskFuture> for Argument {
    fn from(future: TaskFuture) -> Self {
        Argument::Item(ArgItem::Future(future))
    }
}

/// Wrap an argument so the mapper broadcasts it verbatim instead of fanning
/// out over its elements.
pub fn unmapped(argument: impl Into<Argument>) -> Argument {
    Argument::Unmapped(Box::new(argument.into()))
}

/// A unit of work: the task plus its (possibly future-bearing) arguments.
///
/// Built fluently from [`Task::call`] and handed to a [`TaskRunner`]. The
/// runner resolves embedded futures at invocation time, not submission time,
/// which is what lets `b.submit(a.submit(..))`-style chains return
/// immediately.
#[derive(Debug, Clone)]
pub struct TaskCall {
    /// The registered callable to execute.
    pub task: Task,
    /// Ordered positional arguments.
    pub args: Vec<Argument>,
    /// Keyword arguments, in insertion order.
    pub kwargs: IndexMap<String, Argument>,
    /// Ordering-only dependencies: these runs must reach a terminal state
    /// before this call executes, but contribute no data.
    pub wait_for: Vec<TaskFuture>,
}

impl TaskCall {
    /// Start an empty call for `task`.
    pub fn new(task: Task) -> Self {
        Self {
            task,
            args: Vec::new(),
            kwargs: IndexMap::new(),
            wait_for: Vec::new(),
        }
    }

    /// Append a positional argument.
    pub fn arg(mut self, argument: impl Into<Argument>) -> Self {
        self.args.push(argument.into());
        self
    }

    /// Insert a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, argument: impl Into<Argument>) -> Self {
        self.kwargs.insert(name.into(), argument.into());
        self
    }

    /// Add an ordering-only dependency.
    pub fn wait_for(mut self, future: TaskFuture) -> Self {
        self.wait_for.push(future);
        self
    }

    /// Submit this call to `runner`, returning its future immediately.
    pub fn submit(self, runner: &dyn TaskRunner) -> TaskFuture {
        runner.submit(self)
    }

    /// Fan this call out over its sequence arguments, one submission per
    /// element, returning the index-aligned futures.
    pub fn map(self, runner: &dyn TaskRunner) -> Result<FutureList, RunError> {
        mapper::map_call(self, runner)
    }
}
