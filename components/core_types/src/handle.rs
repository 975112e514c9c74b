//! Handles addressing objects in the heap arena.

use std::fmt;

/// Handle to an object stored in the heap arena.
///
/// A handle packs a 32-bit arena index and a 16-bit generation into the low
/// 48 bits of a word, so every handle built with [`ObjectHandle::new`] fits
/// the object payload of a [`Value`](crate::Value). Handles read back from
/// foreign sources can be rebuilt with [`ObjectHandle::from_raw`], which
/// accepts any word; [`Value::from_object_handle`](crate::Value::from_object_handle)
/// rejects the ones that do not fit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(u64);

impl ObjectHandle {
    /// Number of bits occupied by the arena index.
    pub const INDEX_BITS: u32 = 32;

    /// Creates a handle from an arena index and generation.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::ObjectHandle;
    ///
    /// let handle = ObjectHandle::new(7, 2);
    /// assert_eq!(handle.index(), 7);
    /// assert_eq!(handle.generation(), 2);
    /// ```
    pub const fn new(index: u32, generation: u16) -> Self {
        ObjectHandle(((generation as u64) << Self::INDEX_BITS) | index as u64)
    }

    /// Rebuilds a handle from its raw word.
    pub const fn from_raw(raw: u64) -> Self {
        ObjectHandle(raw)
    }

    /// Returns the raw word of this handle.
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// Arena index of the object.
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Generation of the arena slot at the time the handle was issued.
    pub const fn generation(self) -> u16 {
        (self.0 >> Self::INDEX_BITS) as u16
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index())?;
        if self.generation() != 0 {
            write!(f, "@{}", self.generation())?;
        }
        Ok(())
    }
}
