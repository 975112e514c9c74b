//! Core value types and error handling.
//!
//! This crate provides the foundational types shared by the runtime and the
//! just-in-time compiler: the one-word tagged value representation, the
//! handle type used to address heap objects, and the runtime error vocabulary.
//!
//! # Overview
//!
//! - [`Value`] - NaN-boxed representation of every runtime value
//! - [`Tag`] - The four value kinds a [`Value`] decodes to
//! - [`ObjectHandle`] - Index/generation handle into the object heap
//! - [`RuntimeError`] - Recoverable error raised while generated code runs
//! - [`ErrorKind`] - Classification of runtime errors
//!
//! # Examples
//!
//! ```
//! use core_types::{Tag, Value};
//!
//! let num = Value::from_number(42.0);
//! assert_eq!(num.tag(), Tag::Number);
//! assert_eq!(num.as_number(), Ok(42.0));
//!
//! // Zero is truthy; only nil and false are falsy.
//! assert!(Value::from_number(0.0).is_truthy());
//! assert!(!Value::nil().is_truthy());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod handle;
mod value;

pub use error::{ErrorKind, RuntimeError, ValueError};
pub use handle::ObjectHandle;
pub use value::{
    Tag, Value, BOXED_CHECK_MASK, FALSE_BITS, NIL_BITS, OBJECT_CHECK_MASK, OBJECT_TAG_BITS,
    PAYLOAD_MASK, QUIET_NAN, TAG_MASK, TAG_SELECT_MASK, TAG_SHIFT, TRUE_BITS,
};
