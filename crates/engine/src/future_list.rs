//! Ordered collections of futures produced by mapped submissions.

use std::ops::Index;
use std::time::{Duration, Instant};

use gantry_types::RunError;
use serde_json::Value;

use crate::future::TaskFuture;

/// The futures of one mapped submission, index-aligned with the sequence
/// argument that produced them.
#[derive(Debug, Clone)]
pub struct FutureList {
    futures: Vec<TaskFuture>,
}

impl FutureList {
    pub(crate) fn new(futures: Vec<TaskFuture>) -> Self {
        Self { futures }
    }

    /// Number of contained futures; equals the mapped sequence length.
    pub fn len(&self) -> usize {
        self.futures.len()
    }

    /// True when the mapped sequence was empty.
    pub fn is_empty(&self) -> bool {
        self.futures.is_empty()
    }

    /// Future at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&TaskFuture> {
        self.futures.get(index)
    }

    /// Iterate the contained futures in index order.
    pub fn iter(&self) -> std::slice::Iter<'_, TaskFuture> {
        self.futures.iter()
    }

    /// Wait on every contained future under one shared deadline.
    ///
    /// Fails fast with [`RunError::Timeout`] as soon as the deadline passes,
    /// leaving the remaining runs untouched and re-waitable.
    pub fn wait_all(&self, timeout: Option<Duration>) -> Result<(), RunError> {
        match timeout {
            None => {
                for future in &self.futures {
                    future.wait(None)?;
                }
                Ok(())
            }
            Some(total) => {
                let deadline = Instant::now() + total;
                for future in &self.futures {
                    let left = deadline.saturating_duration_since(Instant::now());
                    future.wait(Some(left)).map_err(|_| RunError::Timeout { waited: total })?;
                }
                Ok(())
            }
        }
    }

    /// Resolve every contained future in index order with the same flags as
    /// [`TaskFuture::result`].
    ///
    /// Every run is driven to a terminal state before any failure is
    /// reported, so no background work is left unobserved; with
    /// `raise_on_failure` set, the first failure in index order is then
    /// returned.
    pub fn result(&self, raise_on_failure: bool, timeout: Option<Duration>) -> Result<Vec<Value>, RunError> {
        self.wait_all(timeout)?;

        let mut values = Vec::with_capacity(self.futures.len());
        let mut first_failure = None;
        for future in &self.futures {
            match future.result(raise_on_failure, None) {
                Ok(value) => values.push(value),
                Err(error) => {
                    if first_failure.is_none() {
                        first_failure = Some(error);
                    }
                }
            }
        }
        match first_failure {
            Some(error) => Err(error),
            None => Ok(values),
        }
    }
}

impl Index<usize> for FutureList {
    type Output = TaskFuture;

    fn index(&self, index: usize) -> &TaskFuture {
        &self.futures[index]
    }
}

impl IntoIterator for FutureList {
    type Item = TaskFuture;
    type IntoIter = std::vec::IntoIter<TaskFuture>;

    fn into_iter(self) -> Self::IntoIter {
        self.futures.into_iter()
    }
}

impl<'a> IntoIterator for &'a FutureList {
    type Item = &'a TaskFuture;
    type IntoIter = std::slice::Iter<'a, TaskFuture>;

    fn into_iter(self) -> Self::IntoIter {
        self.futures.iter()
    }
}
