//! Resolved syntax tree.
//!
//! The code generator consumes programs in this form. The tree is produced by
//! an external scanner, parser and resolver; by the time it reaches the core,
//! every variable-like node already says whether it names a local (and at
//! which lexical depth) or a global.
//!
//! # Scope depths
//!
//! Depths count lexical scopes outward from the innermost one, with these
//! scopes:
//!
//! - one per block
//! - one per function, shared by its parameters and body
//! - one `this` scope around each method
//! - one `super` scope around the methods of a subclass
//!
//! Top-level declarations are globals and never appear as locals.
//!
//! # Example
//!
//! ```
//! use ast::{BinaryOp, Expr, Stmt};
//!
//! // print 1 + 2;
//! let program = vec![Stmt::print(Expr::binary(
//!     BinaryOp::Add,
//!     Expr::number(1.0),
//!     Expr::number(2.0),
//! ))];
//! assert_eq!(program.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod build;
mod expr;
mod stmt;

pub use expr::{BinaryOp, Expr, Identifier, Literal, LogicalOp, Resolution, UnaryOp};
pub use stmt::{ClassDecl, FunctionDecl, Stmt};
