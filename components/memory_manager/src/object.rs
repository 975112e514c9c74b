//! Runtime object representation
//!
//! Every object the language can reference lives in the [`Heap`](crate::Heap)
//! as a [`HeapObject`]. Instances keep their fields in shape-ordered slots and
//! expose their shape and slot array at fixed offsets so generated code can
//! run an inline-cache guard and load a field without calling the runtime.

use core_types::{ObjectHandle, Value};
use std::collections::HashMap;
use std::mem;

use crate::shape::{ShapeId, ShapeLattice};
use crate::symbol::Symbol;

/// Any object stored in the heap.
#[derive(Debug)]
pub enum HeapObject {
    /// Immutable string
    String(Box<str>),
    /// Function together with its captured cells
    Closure(Closure),
    /// Heap box for a local variable captured by a closure
    Cell(Value),
    /// Class with its method table
    Class(Class),
    /// Instance of a class
    Instance(Box<Instance>),
    /// Method closure bound to a receiver
    BoundMethod(BoundMethod),
    /// Function implemented by the host
    Native(Native),
}

impl HeapObject {
    /// Short kind name, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            HeapObject::String(_) => "string",
            HeapObject::Closure(_) => "function",
            HeapObject::Cell(_) => "cell",
            HeapObject::Class(_) => "class",
            HeapObject::Instance(_) => "instance",
            HeapObject::BoundMethod(_) => "bound method",
            HeapObject::Native(_) => "native function",
        }
    }
}

/// A compiled function and the cells it captured.
#[derive(Debug, Clone)]
pub struct Closure {
    /// Declared name
    pub name: Symbol,
    /// Declared parameter count
    pub arity: usize,
    /// Address of the native entry point
    pub entry: usize,
    /// Captured cells, in the order the function's code indexes them
    pub cells: Box<[Value]>,
}

/// A class and its methods.
///
/// Inherited methods are copied into the subclass when it is created, so a
/// lookup never has to walk a superclass chain.
#[derive(Debug, Clone)]
pub struct Class {
    /// Class name
    pub name: Symbol,
    /// Methods by name; every value references a [`Closure`]
    pub methods: HashMap<Symbol, Value>,
}

impl Class {
    /// Creates a class inheriting `inherited` methods.
    pub fn new(name: Symbol, inherited: HashMap<Symbol, Value>) -> Self {
        Class {
            name,
            methods: inherited,
        }
    }

    /// Looks up a method.
    pub fn method(&self, name: Symbol) -> Option<Value> {
        self.methods.get(&name).copied()
    }
}

/// A method closure bound to the receiver it was read from.
#[derive(Debug, Clone, Copy)]
pub struct BoundMethod {
    /// The object the method was read from
    pub receiver: Value,
    /// The method closure
    pub method: Value,
}

/// A host function callable from generated code.
#[derive(Debug, Clone)]
pub struct Native {
    /// Name it is bound to
    pub name: Symbol,
    /// Parameter count
    pub arity: usize,
    /// Address of the entry point, using the uniform calling convention
    pub entry: usize,
}

/// An instance with hidden-class field storage.
///
/// The first two words are read by generated code: the shape id at
/// [`Instance::SHAPE_OFFSET`] and a pointer to the slot array at
/// [`Instance::SLOTS_OFFSET`]. The slot count always equals the field count
/// of the current shape.
#[derive(Debug)]
#[repr(C)]
pub struct Instance {
    shape: u64,
    slots_ptr: *mut Value,
    class: ObjectHandle,
    slots: Vec<Value>,
}

impl Instance {
    /// Byte offset of the shape word.
    pub const SHAPE_OFFSET: usize = mem::offset_of!(Instance, shape);
    /// Byte offset of the slot array pointer.
    pub const SLOTS_OFFSET: usize = mem::offset_of!(Instance, slots_ptr);

    /// Creates an instance of `class` with the layout of `shape`, which must
    /// be field-less (normally the lattice root).
    pub fn new(class: ObjectHandle, shape: ShapeId) -> Self {
        let mut slots = Vec::new();
        Instance {
            shape: shape.as_u64(),
            slots_ptr: slots.as_mut_ptr(),
            class,
            slots,
        }
    }

    /// Current shape.
    pub fn shape(&self) -> ShapeId {
        ShapeId::from_u64(self.shape)
    }

    /// Handle of the instance's class.
    pub fn class(&self) -> ObjectHandle {
        self.class
    }

    /// Field values in slot order.
    pub fn slots(&self) -> &[Value] {
        &self.slots
    }

    /// Reads a field.
    pub fn get_field(&self, shapes: &ShapeLattice, field: Symbol) -> Option<Value> {
        shapes
            .try_get_slot(self.shape(), field)
            .and_then(|slot| self.slots.get(slot as usize).copied())
    }

    /// Writes a field, moving to a new shape when the field is new.
    ///
    /// Returns the slot the value was stored in.
    pub fn set_field(&mut self, shapes: &mut ShapeLattice, field: Symbol, value: Value) -> u32 {
        if let Some(slot) = shapes.try_get_slot(self.shape(), field) {
            self.slots[slot as usize] = value;
            return slot;
        }
        let next = shapes.ensure_transition(self.shape(), field);
        let slot = self.slots.len() as u32;
        debug_assert_eq!(shapes.try_get_slot(next, field), Some(slot));
        self.slots.push(value);
        self.slots_ptr = self.slots.as_mut_ptr();
        self.shape = next.as_u64();
        slot
    }
}
