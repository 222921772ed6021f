//! Shared type definitions for the Gantry task runtime.
//!
//! This crate carries the vocabulary that every other Gantry crate speaks:
//! the lifecycle [`State`] attached to a submitted task run, and the
//! [`RunError`] taxonomy surfaced by blocking calls and failed runs. It is
//! intentionally dependency-light so alternate runner backends can share it
//! without pulling in the execution engine.

pub mod error;
pub mod state;

pub use error::RunError;
pub use state::{State, StateKind};
