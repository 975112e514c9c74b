//! JIT compilation of resolved programs over NaN-boxed values
//!
//! This crate provides:
//! - CodeGenerator: lowers resolved syntax trees into Cranelift IR units
//! - Engine: materializes units on background workers and resolves symbols
//! - Runtime: heap, globals and inline-cache sites shared with generated code
//! - Session: the host-facing pairing of one runtime with one engine
//!
//! # Example
//!
//! ```
//! use ast::{Expr, Stmt};
//! use jit_compiler::Session;
//!
//! let mut session = Session::new().unwrap();
//! let program = vec![
//!     Stmt::var("answer", Some(Expr::number(42.0))),
//!     Stmt::expression(Expr::global("answer")),
//! ];
//! let value = session.run(&program).unwrap();
//! assert_eq!(session.render(value), "42");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codegen;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod runtime;
pub mod runtime_support;
pub mod session;
pub mod unit;

// Re-export main types at crate root
pub use codegen::{CodeGenerator, Helper, MAX_ARITY};
pub use config::{EngineConfig, SessionConfig};
pub use engine::{Engine, EngineStats, EntryPoint, HostSymbols, TargetDescription, UnitId};
pub use error::{CodegenError, EngineError, SessionError, SessionResult};
pub use pipeline::{OptLevel, OptimizationPipeline};
pub use runtime::{ActiveRuntime, CacheStats, CallTarget, HotState, PropertySite, Runtime, SiteKind};
pub use session::Session;
pub use unit::{CompilationUnit, DeclIndex, Declaration, Definition, Linkage};
