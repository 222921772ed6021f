//! # Gantry Engine
//!
//! Gantry executes ordinary function calls ("tasks") on a pluggable backend
//! instead of inline. Submitting a task returns a [`TaskFuture`] immediately;
//! the caller observes progress and results through the future while workers
//! execute the body elsewhere. Futures can be passed as arguments to further
//! submissions, and the engine resolves them to concrete values just before
//! the downstream body runs, so pipelines chain without blocking the caller.
//!
//! ## Key pieces
//!
//! - **`task`**: [`Task`] and [`TaskBuilder`] — a registered callable plus
//!   metadata, exposing `submit` and `map`
//! - **`call`**: the argument model ([`Argument`], [`unmapped`]) and the
//!   [`TaskCall`] payload handed to a runner
//! - **`future`**: [`TaskFuture`] — blocking and non-blocking access to a
//!   run's [`State`]
//! - **`resolve`**: replaces embedded futures with their resolved values
//!   before a dependent call executes
//! - **`mapper`**: fans one call out into one submission per element of its
//!   sequence arguments, yielding a [`FutureList`]
//! - **`runner`**: the [`TaskRunner`] backend contract, the default
//!   [`ThreadPoolRunner`], and the inline [`ImmediateRunner`]
//!
//! ## Usage
//!
//! ```rust
//! use gantry_engine::{Task, TaskRunner, ThreadPoolRunner};
//! use serde_json::json;
//!
//! let double = Task::new("double", |args| {
//!     let x = args.get(0).and_then(|v| v.as_i64()).unwrap_or(0);
//!     Ok(json!(x * 2))
//! });
//!
//! let runner = ThreadPoolRunner::with_max_workers(2);
//! let future = double.submit(&runner, [json!(21).into()]);
//! assert_eq!(future.result(true, None)?, json!(42));
//! runner.wait_for_all_submissions();
//! # Ok::<(), gantry_engine::RunError>(())
//! ```

pub mod call;
pub mod future;
pub mod future_list;
pub mod mapper;
pub mod resolve;
pub mod runner;
pub mod task;

pub use call::{ArgItem, Argument, TaskCall, unmapped};
pub use future::{RunId, TaskFuture};
pub use future_list::FutureList;
pub use gantry_types::{RunError, State, StateKind};
pub use resolve::resolve_call;
pub use runner::{ImmediateRunner, TaskRunner, ThreadPoolRunner, thread_pool::PoolTelemetry};
pub use task::{ResolvedArgs, Task, TaskBuilder};
