//! Error types for code generation, compilation and sessions

use core_types::RuntimeError;
use memory_manager::HeapError;
use thiserror::Error;

/// Failure to lower a syntax tree.
///
/// These indicate a tree that violates the resolver's guarantees; a tree
/// produced by a correct resolver never triggers them.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// A local reference whose depth does not land on a scope declaring it.
    #[error("[line {line}] unresolved local '{name}' at depth {depth}")]
    UnresolvedLocal {
        /// Referenced name
        name: String,
        /// Depth carried by the reference
        depth: usize,
        /// Source line
        line: u32,
    },
    /// `this` or `super` outside of a method.
    #[error("[line {line}] '{keyword}' used outside of a method")]
    InvalidReceiver {
        /// `this` or `super`
        keyword: String,
        /// Source line
        line: u32,
    },
    /// More than 255 parameters or arguments.
    #[error("[line {line}] can't have more than 255 {what}")]
    TooManyArguments {
        /// `parameters` or `arguments`
        what: &'static str,
        /// Source line
        line: u32,
    },
    /// A captured variable was not found where capture analysis placed it.
    #[error("captured variable '{0}' has no boxed storage")]
    CaptureMismatch(String),
    /// The heap could not hold a constant.
    #[error(transparent)]
    Heap(#[from] HeapError),
}

/// Failure reported by the compilation engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The host target could not be detected or is unsupported.
    #[error("target detection failed: {0}")]
    TargetDetection(String),
    /// The code generator settings were rejected.
    #[error("invalid compiler setting: {0}")]
    Configuration(String),
    /// A unit failed verification or references undeclared functions.
    #[error("malformed compilation unit '{unit}': {reason}")]
    MalformedUnit {
        /// Unit name
        unit: String,
        /// What is wrong with it
        reason: String,
    },
    /// An exported name is already owned by another unit.
    #[error("duplicate symbol '{0}'")]
    DuplicateSymbol(String),
    /// No unit exports the requested name.
    #[error("unresolved symbol '{0}'")]
    UnresolvedSymbol(String),
    /// The owning unit failed to materialize.
    #[error("materializing unit '{unit}' failed: {reason}")]
    Materialization {
        /// Unit name
        unit: String,
        /// Backend error
        reason: String,
    },
    /// The worker pool is gone.
    #[error("compilation engine is shut down")]
    ShutDown,
}

/// Failure of a session submission.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The program could not be lowered.
    #[error(transparent)]
    Codegen(#[from] CodegenError),
    /// The engine rejected or failed to compile the unit.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The program raised a runtime error.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    /// A configuration document could not be parsed.
    #[error("invalid session configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
