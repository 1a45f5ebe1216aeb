//! Object runtime for a Python-like language.
//!
//! Every value is a reference-counted object living in a generation-tagged
//! arena and dispatched through its type's operation table. Types are built at
//! runtime with C3 method resolution order and descriptor installation, and a
//! generational trial-deletion collector reclaims the reference cycles that
//! counting alone cannot free.

pub mod collector;
pub mod config;
pub mod error;
pub mod errstate;
pub mod ffi;
pub mod gc;
pub mod generation;
pub mod global;
pub mod heap;
pub mod lifecycle;
pub mod object;
pub mod objects;
pub mod protocol;
pub mod runtime;
pub mod traversal;
pub mod types;
pub mod weakref;

#[cfg(test)]
pub(crate) mod testing;

pub use collector::CollectionOutcome;
pub use config::RuntimeConfig;
pub use error::{ErrorKind, PyErr, RuntimeError};
pub use errstate::UnraisableReport;
pub use gc::{GcStats, GenerationStats};
pub use object::ObjectId;
pub use runtime::{Code, Frame, FrameEvaluator, Runtime, ShutdownReport};
pub use types::{BinaryOp, BuiltinType, CompareOp, UnaryOp};

/// Result of an operation that may raise a language-level exception.
pub type PyResult<T> = Result<T, PyErr>;

/// Result of a runtime lifecycle or collector-control operation.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
