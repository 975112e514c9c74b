//! Error types shared by the runtime and the compiler.
//!
//! [`ValueError`] covers misuse of the tagged encoding itself. [`RuntimeError`]
//! is what generated code reports through the runtime when a program misuses
//! an operator, a property or a call at execution time.

use crate::value::Tag;
use thiserror::Error;

/// Failure to encode or decode a [`Value`](crate::Value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValueError {
    /// An accessor was called on a value of another kind.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Tag the accessor requires
        expected: Tag,
        /// Tag the value actually carries
        found: Tag,
    },
    /// An object handle does not fit the 48-bit payload.
    #[error("object handle {raw:#x} does not fit the 48-bit payload")]
    PayloadOverflow {
        /// The offending raw handle word
        raw: u64,
    },
}

/// The kind of runtime error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// An operator was applied to operands it does not accept.
    DynamicType {
        /// Source spelling of the operator (`+`, `<`, `.`, ...)
        operator: String,
        /// Tags of the operands, left to right
        operands: Vec<Tag>,
    },
    /// A checked accessor met a value of the wrong kind.
    TypeMismatch {
        /// Tag that was required
        expected: Tag,
        /// Tag that was found
        found: Tag,
    },
    /// Read or assignment of a global that was never defined.
    UndefinedVariable {
        /// Variable name
        name: String,
    },
    /// Property read that matched neither a field nor a method.
    UndefinedProperty {
        /// Property name
        name: String,
    },
    /// Call of a value that is neither a function nor a class.
    NotCallable {
        /// Tag of the callee
        callee: Tag,
    },
    /// Call with the wrong number of arguments.
    Arity {
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        found: usize,
    },
    /// A class tried to inherit from something that is not a class.
    InvalidSuperclass,
    /// The call depth limit was exceeded.
    StackOverflow,
    /// The object heap ran out of handles.
    HeapExhausted,
}

/// A recoverable error raised while generated code runs.
///
/// # Examples
///
/// ```
/// use core_types::{ErrorKind, RuntimeError, Tag};
///
/// let error = RuntimeError::dynamic_type(
///     "-",
///     vec![Tag::Object],
///     "Operand must be a number.",
/// );
/// assert_eq!(error.to_string(), "Operand must be a number.");
/// assert!(matches!(error.kind, ErrorKind::DynamicType { .. }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RuntimeError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
}

impl RuntimeError {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        RuntimeError {
            kind,
            message: message.into(),
        }
    }

    /// Creates a [`ErrorKind::DynamicType`] error.
    pub fn dynamic_type(
        operator: impl Into<String>,
        operands: Vec<Tag>,
        message: impl Into<String>,
    ) -> Self {
        RuntimeError::new(
            ErrorKind::DynamicType {
                operator: operator.into(),
                operands,
            },
            message,
        )
    }
}

impl From<ValueError> for RuntimeError {
    fn from(err: ValueError) -> Self {
        match err {
            ValueError::TypeMismatch { expected, found } => RuntimeError::new(
                ErrorKind::TypeMismatch { expected, found },
                err.to_string(),
            ),
            ValueError::PayloadOverflow { .. } => {
                RuntimeError::new(ErrorKind::HeapExhausted, err.to_string())
            }
        }
    }
}
