//! Error state and the unraisable-exception channel.
//!
//! Rust code propagates `PyErr` through `Result`. The sentinel-style boundary
//! (the C ABI, host embedders) instead parks the error in an `ErrorState` and
//! checks `error_occurred`. Errors that have no caller to receive them, such
//! as failures inside `__del__` or weak reference callbacks, are written to the
//! unraisable channel: logged, kept in a bounded history and forwarded to any
//! subscriber.

use std::collections::VecDeque;

use crossbeam::channel::{self, Receiver, Sender};
use log::error;

use crate::error::{ErrorKind, PyErr};
use crate::runtime::Runtime;
use crate::PyResult;

/// An exception that was discarded because nobody could receive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnraisableReport {
    pub error: PyErr,
    /// What was running when the error was raised.
    pub context: String,
}

#[derive(Debug)]
pub struct ErrorState {
    current: Option<PyErr>,
    history: VecDeque<UnraisableReport>,
    capacity: usize,
    subscribers: Vec<Sender<UnraisableReport>>,
    total_unraisable: u64,
}

impl ErrorState {
    pub fn new(capacity: usize) -> Self {
        Self {
            current: None,
            history: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            subscribers: Vec::new(),
            total_unraisable: 0,
        }
    }

    pub fn set_error(&mut self, err: PyErr) {
        self.current = Some(err);
    }

    pub fn set(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.set_error(PyErr::new(kind, message));
    }

    /// Takes the pending error, leaving the state clear.
    pub fn fetch_error(&mut self) -> Option<PyErr> {
        self.current.take()
    }

    pub fn error_occurred(&self) -> bool {
        self.current.is_some()
    }

    pub fn peek(&self) -> Option<&PyErr> {
        self.current.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.current = None;
    }

    /// Puts back an error previously taken with `fetch_error`.
    pub fn restore_error(&mut self, err: PyErr) {
        self.current = Some(err);
    }

    fn report(&mut self, report: UnraisableReport) {
        self.total_unraisable += 1;
        self.subscribers
            .retain(|tx| tx.send(report.clone()).is_ok());

        if self.capacity == 0 {
            return;
        }
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(report);
    }

    fn subscribe(&mut self) -> Receiver<UnraisableReport> {
        let (tx, rx) = channel::unbounded();
        self.subscribers.push(tx);
        rx
    }
}

impl Runtime {
    pub fn set_error(&mut self, err: PyErr) {
        self.errors.set_error(err);
    }

    pub fn fetch_error(&mut self) -> Option<PyErr> {
        self.errors.fetch_error()
    }

    pub fn error_occurred(&self) -> bool {
        self.errors.error_occurred()
    }

    pub fn clear_error(&mut self) {
        self.errors.clear_error();
    }

    pub fn restore_error(&mut self, err: PyErr) {
        self.errors.restore_error(err);
    }

    /// Converts a `Result` to the sentinel convention: the error, if any, is
    /// parked in the error state and `None` is returned.
    pub fn take_result<T>(&mut self, result: PyResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.errors.set_error(err);
                None
            }
        }
    }

    /// Reports an exception that cannot be propagated.
    pub fn write_unraisable(&mut self, err: PyErr, context: &str) {
        error!("{context}: {err}");
        self.errors.report(UnraisableReport {
            error: err,
            context: context.to_string(),
        });
    }

    /// Most recent unraisable reports, oldest first.
    pub fn unraisable_history(&self) -> Vec<UnraisableReport> {
        self.errors.history.iter().cloned().collect()
    }

    pub fn unraisable_count(&self) -> u64 {
        self.errors.total_unraisable
    }

    /// Receives every unraisable report written after this call.
    pub fn subscribe_unraisable(&mut self) -> Receiver<UnraisableReport> {
        self.errors.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    #[test]
    fn test_set_fetch_restore() {
        let mut state = ErrorState::new(4);
        assert!(!state.error_occurred());

        state.set(ErrorKind::KeyError, "'spam'");
        assert!(state.error_occurred());
        let err = state.fetch_error().unwrap();
        assert_eq!(err.kind, ErrorKind::KeyError);
        assert!(!state.error_occurred());

        state.restore_error(err.clone());
        assert_eq!(state.peek(), Some(&err));
        state.clear_error();
        assert!(state.fetch_error().is_none());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut rt = Runtime::new(RuntimeConfig {
            unraisable_history: 2,
            ..RuntimeConfig::default()
        });
        for i in 0..5 {
            rt.write_unraisable(PyErr::value_error(format!("boom {i}")), "test");
        }
        let history = rt.unraisable_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].error.message, "boom 3");
        assert_eq!(rt.unraisable_count(), 5);
    }

    #[test]
    fn test_subscribers_receive_reports() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let rx = rt.subscribe_unraisable();
        rt.write_unraisable(PyErr::runtime_error("late"), "garbage collection");

        let report = rx.try_recv().unwrap();
        assert_eq!(report.context, "garbage collection");
        assert_eq!(report.error.message, "late");

        drop(rx);
        rt.write_unraisable(PyErr::runtime_error("nobody listens"), "test");
        assert_eq!(rt.unraisable_count(), 2);
    }

    #[test]
    fn test_take_result_parks_error() {
        let mut rt = Runtime::new(RuntimeConfig::default());
        let value: Option<u32> = rt.take_result(Err(PyErr::type_error("bad")));
        assert!(value.is_none());
        assert!(rt.error_occurred());
        assert_eq!(rt.fetch_error().unwrap().message, "bad");
    }
}
