//! Calls, closures, captured cells and classes.

use core_types::{ErrorKind, RuntimeError, Tag, Value, NIL_BITS};
use memory_manager::{BoundMethod, Class, Closure, HeapObject, Instance, Symbol};
use std::collections::HashMap;
use std::mem;

use super::Runtime;
use crate::runtime_support;

/// Closure and receiver words handed to a callee, written by
/// [`Runtime::prepare_call`] into a stack slot of the calling frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct CallTarget {
    /// First argument of the callee
    pub closure: u64,
    /// Second argument of the callee; nil for plain functions
    pub receiver: u64,
}

impl CallTarget {
    /// Offset of the closure word.
    pub const CLOSURE_OFFSET: i32 = mem::offset_of!(CallTarget, closure) as i32;
    /// Offset of the receiver word.
    pub const RECEIVER_OFFSET: i32 = mem::offset_of!(CallTarget, receiver) as i32;
    /// Size of the block.
    pub const SIZE: u32 = mem::size_of::<CallTarget>() as u32;
}

enum Callee {
    Function { arity: usize, entry: usize },
    Bound { receiver: Value, method: Value },
    Class { init: Option<Value> },
}

fn arity_error(expected: usize, found: usize) -> RuntimeError {
    RuntimeError::new(
        ErrorKind::Arity { expected, found },
        format!("Expected {} arguments but got {}.", expected, found),
    )
}

impl Runtime {
    /// Resolves what calling `callee` with `argc` arguments runs.
    ///
    /// Returns the entry address and the closure/receiver pair the callee
    /// receives ahead of its arguments. Calling a class allocates the new
    /// instance here.
    ///
    /// # Errors
    ///
    /// Fails when the callee is not callable or the argument count does not
    /// match its arity.
    pub fn prepare_call(&self, callee: Value, argc: usize) -> Result<(usize, CallTarget), RuntimeError> {
        let resolved = {
            let heap = self.heap.borrow();
            match heap.get_value(callee) {
                Some(HeapObject::Closure(closure)) => Callee::Function {
                    arity: closure.arity,
                    entry: closure.entry,
                },
                Some(HeapObject::Native(native)) => Callee::Function {
                    arity: native.arity,
                    entry: native.entry,
                },
                Some(HeapObject::BoundMethod(bound)) => Callee::Bound {
                    receiver: bound.receiver,
                    method: bound.method,
                },
                Some(HeapObject::Class(class)) => Callee::Class {
                    init: class.method(self.init),
                },
                _ => {
                    return Err(RuntimeError::new(
                        ErrorKind::NotCallable {
                            callee: callee.tag(),
                        },
                        "Can only call functions and classes.",
                    ))
                }
            }
        };

        match resolved {
            Callee::Function { arity, entry } => {
                if arity != argc {
                    return Err(arity_error(arity, argc));
                }
                Ok((
                    entry,
                    CallTarget {
                        closure: callee.to_bits(),
                        receiver: NIL_BITS,
                    },
                ))
            }
            Callee::Bound { receiver, method } => self.bind_call(method, receiver, argc),
            Callee::Class { init } => {
                if init.is_none() && argc != 0 {
                    return Err(arity_error(0, argc));
                }
                let class = callee.as_object_handle()?;
                let root = self.shapes.borrow().root();
                let instance = self.alloc(HeapObject::Instance(Box::new(Instance::new(class, root))))?;
                match init {
                    Some(init) => self.bind_call(init, instance, argc),
                    None => Ok((
                        runtime_support::construct_default as *const () as usize,
                        CallTarget {
                            closure: callee.to_bits(),
                            receiver: instance.to_bits(),
                        },
                    )),
                }
            }
        }
    }

    fn bind_call(&self, method: Value, receiver: Value, argc: usize) -> Result<(usize, CallTarget), RuntimeError> {
        let (arity, entry) = match self.heap.borrow().get_value(method) {
            Some(HeapObject::Closure(closure)) => (closure.arity, closure.entry),
            _ => {
                return Err(RuntimeError::new(
                    ErrorKind::NotCallable {
                        callee: method.tag(),
                    },
                    "Can only call functions and classes.",
                ))
            }
        };
        if arity != argc {
            return Err(arity_error(arity, argc));
        }
        Ok((
            entry,
            CallTarget {
                closure: method.to_bits(),
                receiver: receiver.to_bits(),
            },
        ))
    }

    pub(crate) fn stack_overflow(&self) -> RuntimeError {
        RuntimeError::new(ErrorKind::StackOverflow, "Stack overflow.")
    }

    /// Instantiates a closure of a registered prototype.
    pub(crate) fn make_closure(&self, prototype: u32, entry: usize, cells: &[Value]) -> Result<Value, RuntimeError> {
        let prototype = self.prototypes.borrow().get(prototype as usize).copied();
        let prototype = prototype.ok_or_else(|| {
            RuntimeError::new(
                ErrorKind::NotCallable { callee: Tag::Nil },
                "Unknown function prototype.",
            )
        })?;
        self.alloc(HeapObject::Closure(Closure {
            name: prototype.name,
            arity: prototype.arity,
            entry,
            cells: cells.into(),
        }))
    }

    pub(crate) fn new_cell(&self, value: Value) -> Result<Value, RuntimeError> {
        self.alloc(HeapObject::Cell(value))
    }

    pub(crate) fn cell_get(&self, cell: Value) -> Value {
        match self.heap.borrow().get_value(cell) {
            Some(HeapObject::Cell(value)) => *value,
            _ => Value::nil(),
        }
    }

    pub(crate) fn cell_set(&self, cell: Value, value: Value) {
        if let Some(HeapObject::Cell(slot)) = self.heap.borrow_mut().get_value_mut(cell) {
            *slot = value;
        }
    }

    /// Cell number `index` captured by `closure`.
    pub(crate) fn closure_cell(&self, closure: Value, index: usize) -> Value {
        match self.heap.borrow().get_value(closure) {
            Some(HeapObject::Closure(closure)) => closure.cells.get(index).copied().unwrap_or_default(),
            _ => Value::nil(),
        }
    }

    /// Creates a class, copying down the methods of `superclass`.
    ///
    /// # Errors
    ///
    /// Fails when `superclass` is not a class.
    pub(crate) fn new_class(&self, name: Symbol, superclass: Option<Value>) -> Result<Value, RuntimeError> {
        let inherited = match superclass {
            None => HashMap::new(),
            Some(superclass) => match self.heap.borrow().get_value(superclass) {
                Some(HeapObject::Class(class)) => class.methods.clone(),
                _ => {
                    return Err(RuntimeError::new(
                        ErrorKind::InvalidSuperclass,
                        "Superclass must be a class.",
                    ))
                }
            },
        };
        self.alloc(HeapObject::Class(Class::new(name, inherited)))
    }

    pub(crate) fn add_method(&self, class: Value, name: Symbol, method: Value) {
        if let Some(HeapObject::Class(class)) = self.heap.borrow_mut().get_value_mut(class) {
            class.methods.insert(name, method);
        }
    }

    /// `super.name` evaluated in a method of a subclass of `superclass`.
    pub(crate) fn get_super(&self, superclass: Value, receiver: Value, name: Symbol) -> Result<Value, RuntimeError> {
        let method = match self.heap.borrow().get_value(superclass) {
            Some(HeapObject::Class(class)) => class.method(name),
            _ => None,
        };
        match method {
            Some(method) => self.alloc(HeapObject::BoundMethod(BoundMethod { receiver, method })),
            None => Err(self.undefined_property(name)),
        }
    }
}
