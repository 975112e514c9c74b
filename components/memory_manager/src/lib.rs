//! Memory Manager - object heap and hidden-class layouts
//!
//! This component provides:
//! - The shape lattice: hidden classes describing object field layouts
//! - Interning of field, method and variable names
//! - A handle-addressed heap arena holding every runtime object
//! - Instance storage laid out for direct access from generated code

pub mod heap;
pub mod object;
pub mod shape;
pub mod symbol;

// Re-export main types
pub use heap::{Heap, HeapError};
pub use object::{BoundMethod, Class, Closure, HeapObject, Instance, Native};
pub use shape::{ShapeId, ShapeLattice};
pub use symbol::{Interner, Symbol};
