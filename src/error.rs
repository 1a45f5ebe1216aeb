use std::fmt;

use thiserror::Error;

/// Errors raised by the runtime's lifecycle and collector-control surface.
///
/// These never carry a language-level exception; they describe misuse of the
/// runtime itself (double initialisation, re-entrant collection, ...).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Runtime is already initialized")]
    AlreadyInitialized,

    #[error("Runtime is not initialized")]
    NotInitialized,

    #[error("Garbage collection already in progress")]
    CollectionInProgress,

    #[error("Invalid generation: {0}")]
    InvalidGeneration(usize),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PyErr> for RuntimeError {
    fn from(err: PyErr) -> Self {
        RuntimeError::Internal(err.to_string())
    }
}

/// The exception kinds the object core raises or observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TypeError,
    AttributeError,
    OverflowError,
    ZeroDivisionError,
    ValueError,
    KeyError,
    IndexError,
    StopIteration,
    RuntimeError,
    SystemError,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::TypeError => "TypeError",
            ErrorKind::AttributeError => "AttributeError",
            ErrorKind::OverflowError => "OverflowError",
            ErrorKind::ZeroDivisionError => "ZeroDivisionError",
            ErrorKind::ValueError => "ValueError",
            ErrorKind::KeyError => "KeyError",
            ErrorKind::IndexError => "IndexError",
            ErrorKind::StopIteration => "StopIteration",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::SystemError => "SystemError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A raised language-level exception.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct PyErr {
    pub kind: ErrorKind,
    pub message: String,
}

impl PyErr {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    pub fn attribute_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AttributeError, message)
    }

    pub fn overflow_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OverflowError, message)
    }

    pub fn zero_division(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ZeroDivisionError, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValueError, message)
    }

    pub fn key_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::KeyError, message)
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IndexError, message)
    }

    pub fn runtime_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RuntimeError, message)
    }

    pub fn system_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SystemError, message)
    }

    pub fn stop_iteration() -> Self {
        Self::new(ErrorKind::StopIteration, "")
    }

    /// The dedicated "too deep" failure of the recursion guard.
    pub fn recursion(context: &str) -> Self {
        Self::runtime_error(format!("maximum recursion depth exceeded{context}"))
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind() {
        let err = PyErr::attribute_error("'Foo' object has no attribute 'x'");
        assert_eq!(
            err.to_string(),
            "AttributeError: 'Foo' object has no attribute 'x'"
        );
        assert!(err.is(ErrorKind::AttributeError));
    }

    #[test]
    fn test_recursion_error_message() {
        let err = PyErr::recursion(" in comparison");
        assert_eq!(err.kind, ErrorKind::RuntimeError);
        assert!(err.message.contains("maximum recursion depth exceeded in comparison"));
    }
}
