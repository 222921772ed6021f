//! Registered callables and the resolved arguments their bodies receive.
//!
//! A [`Task`] is the explicit registration step for a unit of work: a body
//! plus a name and optional metadata, constructed through [`TaskBuilder`].
//! The task object itself is inert; submitting it through a runner is what
//! creates a run.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use gantry_types::RunError;

use crate::call::{Argument, TaskCall};
use crate::future::TaskFuture;
use crate::future_list::FutureList;
use crate::runner::TaskRunner;

/// Signature every task body satisfies: resolved arguments in, JSON value or
/// domain error out. An `Err` marks the run `Failed`; a panic marks it
/// `Crashed`.
pub type TaskBody = dyn Fn(ResolvedArgs) -> anyhow::Result<Value> + Send + Sync;

/// Arguments handed to a task body after dependency resolution: every future
/// has been replaced by its produced value.
#[derive(Debug, Clone, Default)]
pub struct ResolvedArgs {
    /// Positional arguments, in call order.
    pub positional: Vec<Value>,
    /// Keyword arguments, in insertion order.
    pub keyword: IndexMap<String, Value>,
}

impl ResolvedArgs {
    /// Positional argument at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Keyword argument named `name`, if present.
    pub fn kw(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }
}

/// A registered callable with metadata, exposing `submit` and `map`.
///
/// Cloning is cheap; all clones share the same body. A `Task` carries no run
/// state of its own — it can be submitted any number of times, to any runner.
#[derive(Clone)]
pub struct Task {
    name: Arc<str>,
    description: Option<Arc<str>>,
    tags: Arc<[String]>,
    body: Arc<TaskBody>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .finish()
    }
}

impl Task {
    /// Start building a task named `name`.
    pub fn builder(name: impl Into<String>) -> TaskBuilder {
        TaskBuilder {
            name: name.into(),
            description: None,
            tags: Vec::new(),
        }
    }

    /// Shorthand for a task with no metadata beyond its name.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(ResolvedArgs) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::builder(name).build(body)
    }

    /// The task's registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Optional human-readable description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Tags attached at registration.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub(crate) fn invoke(&self, args: ResolvedArgs) -> anyhow::Result<Value> {
        (self.body)(args)
    }

    /// Start a fluent call against this task.
    pub fn call(&self) -> TaskCall {
        TaskCall::new(self.clone())
    }

    /// Submit one call with positional arguments, returning its future
    /// immediately. Use [`Task::call`] for keyword arguments or `wait_for`.
    pub fn submit(&self, runner: &dyn TaskRunner, args: impl IntoIterator<Item = Argument>) -> TaskFuture {
        let mut call = self.call();
        for argument in args {
            call = call.arg(argument);
        }
        call.submit(runner)
    }

    /// Fan one call out over its sequence arguments, one submission per
    /// element. Fails fast, submitting nothing, if the sequence lengths
    /// disagree or no argument is a sequence.
    pub fn map(&self, runner: &dyn TaskRunner, args: impl IntoIterator<Item = Argument>) -> Result<FutureList, RunError> {
        let mut call = self.call();
        for argument in args {
            call = call.arg(argument);
        }
        call.map(runner)
    }
}

/// Builder for [`Task`] — the explicit registration step that replaces
/// decorator-style task declaration.
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    name: String,
    description: Option<String>,
    tags: Vec<String>,
}

impl TaskBuilder {
    /// Attach a human-readable description.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Attach a tag; repeatable.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Finish registration by supplying the body.
    pub fn build<F>(self, body: F) -> Task
    where
        F: Fn(ResolvedArgs) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Task {
            name: Arc::from(self.name),
            description: self.description.map(Arc::from),
            tags: Arc::from(self.tags),
            body: Arc::new(body),
        }
    }
}
