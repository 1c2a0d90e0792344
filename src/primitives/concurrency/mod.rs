#![forbid(unsafe_code)]
//! Single-shot completion tickets for asynchronous card requests.
//!
//! A request to the storage collaborator hands back a [`Pending`] ticket and
//! keeps the matching [`Completer`]. The collaborator delivers exactly one
//! outcome; the caller suspends in [`Pending::wait`] until it arrives. Only one
//! thread waits on a given ticket.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::types::{Result, SimError};

struct Slot<T> {
    result: Mutex<Option<Result<T>>>,
    cv: Condvar,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            cv: Condvar::new(),
        }
    }

    fn finish(&self, outcome: Result<T>) {
        let mut result = self.result.lock();
        if result.is_none() {
            *result = Some(outcome);
            self.cv.notify_one();
        }
    }
}

/// Creates a connected completer/ticket pair.
pub fn pending<T>() -> (Completer<T>, Pending<T>) {
    let slot = Arc::new(Slot::new());
    (
        Completer {
            slot: Some(Arc::clone(&slot)),
        },
        Pending { slot },
    )
}

/// Producer half: delivers the single outcome of a request.
///
/// Dropping a completer without calling [`Completer::complete`] fails the
/// request, so a waiter is never left suspended by a lost request.
pub struct Completer<T> {
    slot: Option<Arc<Slot<T>>>,
}

impl<T> Completer<T> {
    /// Delivers the outcome and wakes the waiter.
    pub fn complete(mut self, outcome: Result<T>) {
        if let Some(slot) = self.slot.take() {
            slot.finish(outcome);
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.finish(Err(SimError::Transport("request dropped".into())));
        }
    }
}

/// Consumer half: the caller's handle on an in-flight request.
pub struct Pending<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Pending<T> {
    /// A ticket that is already resolved with `outcome`.
    pub fn ready(outcome: Result<T>) -> Self {
        let slot = Arc::new(Slot::new());
        slot.finish(outcome);
        Self { slot }
    }

    /// Returns true once the outcome has been delivered.
    pub fn is_complete(&self) -> bool {
        self.slot.result.lock().is_some()
    }

    /// Blocks until the outcome is delivered.
    pub fn wait(self) -> Result<T> {
        let mut guard = self.slot.result.lock();
        loop {
            if let Some(result) = guard.take() {
                return result;
            }
            self.slot.cv.wait(&mut guard);
        }
    }
}
