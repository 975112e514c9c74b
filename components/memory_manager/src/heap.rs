//! Handle-addressed object heap.
//!
//! Objects live in a slot arena and are referenced by [`ObjectHandle`]s
//! (index plus generation) rather than raw addresses, so every reference fits
//! the 48-bit payload of a tagged value. No collector runs; objects stay alive
//! for the lifetime of the heap.
//!
//! The heap also maintains an *instance table*: one pointer per arena slot,
//! pointing at the slot's [`Instance`] or null for any other object kind.
//! Generated code indexes it with a handle's index to reach instance storage
//! directly.

use core_types::{ObjectHandle, Value};
use std::collections::HashMap;
use std::ptr;
use thiserror::Error;

use crate::object::{HeapObject, Instance};

/// Heap failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapError {
    /// Every handle index is in use.
    #[error("object heap exhausted after {0} allocations")]
    Exhausted(usize),
}

#[derive(Debug)]
struct Entry {
    generation: u16,
    object: HeapObject,
}

/// Arena of runtime objects.
///
/// # Example
///
/// ```
/// use memory_manager::{Heap, HeapObject};
///
/// let mut heap = Heap::new();
/// let handle = heap.allocate(HeapObject::String("hi".into())).unwrap();
/// assert!(matches!(heap.get(handle), Some(HeapObject::String(s)) if &**s == "hi"));
/// ```
#[derive(Debug)]
pub struct Heap {
    entries: Vec<Entry>,
    instances: Vec<*const Instance>,
    interned: HashMap<Box<str>, ObjectHandle>,
    limit: usize,
}

impl Heap {
    /// Creates an empty heap that may hand out every 32-bit index.
    pub fn new() -> Self {
        Self::with_limit(u32::MAX as usize)
    }

    /// Creates an empty heap holding at most `limit` objects.
    pub fn with_limit(limit: usize) -> Self {
        Heap {
            entries: Vec::new(),
            instances: Vec::new(),
            interned: HashMap::new(),
            limit: limit.min(u32::MAX as usize),
        }
    }

    /// Stores `object` and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`HeapError::Exhausted`] once the limit is reached.
    pub fn allocate(&mut self, object: HeapObject) -> Result<ObjectHandle, HeapError> {
        if self.entries.len() >= self.limit {
            return Err(HeapError::Exhausted(self.entries.len()));
        }
        let index = self.entries.len() as u32;
        let instance = match &object {
            HeapObject::Instance(instance) => &**instance as *const Instance,
            _ => ptr::null(),
        };
        self.entries.push(Entry {
            generation: 0,
            object,
        });
        self.instances.push(instance);
        Ok(ObjectHandle::new(index, 0))
    }

    /// Stores `object` and returns a tagged reference to it.
    ///
    /// # Errors
    ///
    /// Returns [`HeapError::Exhausted`] once the limit is reached.
    pub fn allocate_value(&mut self, object: HeapObject) -> Result<Value, HeapError> {
        let handle = self.allocate(object)?;
        // Every issued handle fits the payload.
        Value::from_object_handle(handle).map_err(|_| HeapError::Exhausted(self.entries.len()))
    }

    /// Returns the string object for `text`, allocating it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`HeapError::Exhausted`] once the limit is reached.
    pub fn intern_string(&mut self, text: &str) -> Result<ObjectHandle, HeapError> {
        if let Some(&handle) = self.interned.get(text) {
            return Ok(handle);
        }
        let handle = self.allocate(HeapObject::String(text.into()))?;
        self.interned.insert(text.into(), handle);
        Ok(handle)
    }

    /// Looks up the object behind `handle`.
    pub fn get(&self, handle: ObjectHandle) -> Option<&HeapObject> {
        self.entries
            .get(handle.index() as usize)
            .filter(|entry| entry.generation == handle.generation())
            .map(|entry| &entry.object)
    }

    /// Mutable variant of [`Heap::get`].
    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut HeapObject> {
        self.entries
            .get_mut(handle.index() as usize)
            .filter(|entry| entry.generation == handle.generation())
            .map(|entry| &mut entry.object)
    }

    /// Looks up the object referenced by a tagged value.
    pub fn get_value(&self, value: Value) -> Option<&HeapObject> {
        value.as_object_handle().ok().and_then(|h| self.get(h))
    }

    /// Mutable variant of [`Heap::get_value`].
    pub fn get_value_mut(&mut self, value: Value) -> Option<&mut HeapObject> {
        match value.as_object_handle() {
            Ok(handle) => self.get_mut(handle),
            Err(_) => None,
        }
    }

    /// Contents of `value` if it references a string.
    pub fn as_str(&self, value: Value) -> Option<&str> {
        match self.get_value(value) {
            Some(HeapObject::String(text)) => Some(text),
            _ => None,
        }
    }

    /// Base address of the instance table.
    ///
    /// The address changes whenever the table grows, so it must be re-read
    /// after every allocation.
    pub fn instance_table(&self) -> *const *const Instance {
        self.instances.as_ptr()
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was allocated yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
