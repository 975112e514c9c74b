//! Property access and the inline-cache sites generated code guards on.
//!
//! Every `Get` and `Set` node compiled against a runtime owns one
//! [`PropertySite`]. Generated code compares the receiver's shape with the
//! site's cached shape and, on a match, accesses the cached slot directly. On
//! a mismatch it calls into this module, which performs the lattice lookup
//! (or transition) and refreshes the site. Sites are monomorphic: a refresh
//! replaces whatever shape was cached before.

use core_types::{ErrorKind, RuntimeError, Value};
use memory_manager::{BoundMethod, HeapObject, Symbol};
use serde::Serialize;
use std::cell::Cell;
use std::mem;

use super::Runtime;

/// Shape word of a site that has never been refreshed; no shape has this id.
const EMPTY_SHAPE: u64 = u64::MAX;

/// Whether a site reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteKind {
    /// Property read
    Get,
    /// Property write
    Set,
}

/// One monomorphic inline cache.
///
/// The first three words are read and written by generated code.
#[derive(Debug)]
#[repr(C)]
pub struct PropertySite {
    shape: Cell<u64>,
    slot: Cell<u64>,
    hits: Cell<u64>,
    misses: Cell<u64>,
    updates: Cell<u64>,
    kind: SiteKind,
}

impl PropertySite {
    /// Offset of the cached shape id.
    pub const SHAPE_OFFSET: i32 = mem::offset_of!(PropertySite, shape) as i32;
    /// Offset of the cached slot index.
    pub const SLOT_OFFSET: i32 = mem::offset_of!(PropertySite, slot) as i32;
    /// Offset of the hit counter.
    pub const HITS_OFFSET: i32 = mem::offset_of!(PropertySite, hits) as i32;

    fn new(kind: SiteKind) -> Self {
        PropertySite {
            shape: Cell::new(EMPTY_SHAPE),
            slot: Cell::new(0),
            hits: Cell::new(0),
            misses: Cell::new(0),
            updates: Cell::new(0),
            kind,
        }
    }

    /// Read or write.
    pub fn kind(&self) -> SiteKind {
        self.kind
    }

    /// Accesses served by the inline fast path.
    pub fn hits(&self) -> u64 {
        self.hits.get()
    }

    /// Accesses that went through the runtime.
    pub fn misses(&self) -> u64 {
        self.misses.get()
    }

    /// Times the cached shape or slot changed.
    pub fn updates(&self) -> u64 {
        self.updates.get()
    }

    /// Cached shape id, if the site was ever refreshed.
    pub fn cached_shape(&self) -> Option<u64> {
        Some(self.shape.get()).filter(|&shape| shape != EMPTY_SHAPE)
    }

    fn refresh(&self, shape: u64, slot: u32) {
        if self.shape.get() != shape || self.slot.get() != slot as u64 {
            self.shape.set(shape);
            self.slot.set(slot as u64);
            self.updates.set(self.updates.get() + 1);
        }
    }
}

/// Aggregated inline-cache counters of a runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Property sites created
    pub sites: usize,
    /// Reads served by the fast path
    pub get_hits: u64,
    /// Reads served by the runtime
    pub get_misses: u64,
    /// Writes served by the fast path
    pub set_hits: u64,
    /// Writes served by the runtime
    pub set_misses: u64,
    /// Site refreshes
    pub cache_updates: u64,
}

impl CacheStats {
    /// Fraction of accesses served by the fast path.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.get_hits + self.set_hits;
        let total = hits + self.get_misses + self.set_misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

impl Runtime {
    /// Creates a site and returns its index and address.
    pub(crate) fn new_property_site(&self, kind: SiteKind) -> (u32, i64) {
        let site = Box::new(PropertySite::new(kind));
        let address = &*site as *const PropertySite as i64;
        let mut sites = self.sites.borrow_mut();
        sites.push(site);
        ((sites.len() - 1) as u32, address)
    }

    /// Counters of one site.
    pub fn with_site<R>(&self, index: u32, f: impl FnOnce(&PropertySite) -> R) -> Option<R> {
        self.sites.borrow().get(index as usize).map(|site| f(site))
    }

    /// Counters summed over every site.
    pub fn cache_stats(&self) -> CacheStats {
        let sites = self.sites.borrow();
        let mut stats = CacheStats {
            sites: sites.len(),
            ..CacheStats::default()
        };
        for site in sites.iter() {
            match site.kind {
                SiteKind::Get => {
                    stats.get_hits += site.hits();
                    stats.get_misses += site.misses();
                }
                SiteKind::Set => {
                    stats.set_hits += site.hits();
                    stats.set_misses += site.misses();
                }
            }
            stats.cache_updates += site.updates();
        }
        stats
    }

    /// Reads a property: a field if the instance has one, otherwise a method
    /// of its class bound to the instance.
    ///
    /// # Errors
    ///
    /// Fails on non-instances and on names that are neither a field nor a
    /// method.
    pub fn get_property(&self, object: Value, name: Symbol, site: u32) -> Result<Value, RuntimeError> {
        let sites = self.sites.borrow();
        let site = sites.get(site as usize);
        if let Some(site) = site {
            site.misses.set(site.misses.get() + 1);
        }

        let method = {
            let heap = self.heap.borrow();
            let instance = match heap.get_value(object) {
                Some(HeapObject::Instance(instance)) => instance,
                _ => {
                    return Err(RuntimeError::dynamic_type(
                        ".",
                        vec![object.tag()],
                        "Only instances have properties.",
                    ))
                }
            };
            let shape = instance.shape();
            if let Some(slot) = self.shapes.borrow().try_get_slot(shape, name) {
                if let Some(site) = site {
                    site.refresh(shape.as_u64(), slot);
                }
                return Ok(instance.slots()[slot as usize]);
            }
            match heap.get(instance.class()) {
                Some(HeapObject::Class(class)) => class.method(name),
                _ => None,
            }
        };

        match method {
            Some(method) => self.alloc(HeapObject::BoundMethod(BoundMethod {
                receiver: object,
                method,
            })),
            None => Err(self.undefined_property(name)),
        }
    }

    /// Writes a field, adding it (and moving the instance to a new shape)
    /// when it is new. Only writes to existing fields refresh the site.
    ///
    /// # Errors
    ///
    /// Fails on non-instances.
    pub fn set_property(
        &self,
        object: Value,
        name: Symbol,
        value: Value,
        site: u32,
    ) -> Result<Value, RuntimeError> {
        let mut heap = self.heap.borrow_mut();
        let instance = match heap.get_value_mut(object) {
            Some(HeapObject::Instance(instance)) => instance,
            _ => {
                return Err(RuntimeError::dynamic_type(
                    ".",
                    vec![object.tag()],
                    "Only instances have fields.",
                ))
            }
        };
        let before = instance.shape();
        let slot = instance.set_field(&mut self.shapes.borrow_mut(), name, value);

        if let Some(site) = self.sites.borrow().get(site as usize) {
            site.misses.set(site.misses.get() + 1);
            if instance.shape() == before {
                site.refresh(before.as_u64(), slot);
            }
        }
        Ok(value)
    }

    pub(crate) fn undefined_property(&self, name: Symbol) -> RuntimeError {
        let name = self.symbol_name(name);
        RuntimeError::new(
            ErrorKind::UndefinedProperty { name: name.clone() },
            format!("Undefined property '{}'.", name),
        )
    }
}
