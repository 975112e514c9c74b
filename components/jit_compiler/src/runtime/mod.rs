//! Runtime state shared between the host and generated code.
//!
//! A [`Runtime`] owns the object heap, the shape lattice, the global table and
//! the inline-cache sites of every unit generated against it. Generated code
//! reaches it two ways:
//!
//! - directly, through the [`HotState`] block and [`PropertySite`]s whose
//!   addresses are baked into the code as constants
//! - through the `extern "C"` helpers in [`runtime_support`](crate::runtime_support),
//!   which find the runtime via the thread-local activation installed by
//!   [`Runtime::activate`]
//!
//! The runtime is single-threaded: object construction, shape transitions and
//! cache updates all happen on the thread that activated it.

mod call;
mod ops;
mod property;
mod render;

pub use call::CallTarget;
pub use property::{CacheStats, PropertySite, SiteKind};

use core_types::{ErrorKind, RuntimeError, Value, NIL_BITS};
use memory_manager::{Heap, HeapObject, Interner, Native, ShapeLattice, Symbol};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::mem;
use std::ptr;

use crate::runtime_support;

/// Words generated code reads and writes on every call and property access.
///
/// Lives in a `Box` so its address is stable for the runtime's lifetime.
#[derive(Debug)]
#[repr(C)]
pub struct HotState {
    pending_error: Cell<u64>,
    call_depth: Cell<u64>,
    max_call_depth: Cell<u64>,
    instance_table: Cell<u64>,
}

impl HotState {
    /// Non-zero while a runtime error is unwinding.
    pub const PENDING_ERROR_OFFSET: i32 = mem::offset_of!(HotState, pending_error) as i32;
    /// Current call nesting.
    pub const CALL_DEPTH_OFFSET: i32 = mem::offset_of!(HotState, call_depth) as i32;
    /// Nesting limit.
    pub const MAX_CALL_DEPTH_OFFSET: i32 = mem::offset_of!(HotState, max_call_depth) as i32;
    /// Base address of the heap's instance table.
    pub const INSTANCE_TABLE_OFFSET: i32 = mem::offset_of!(HotState, instance_table) as i32;

    /// True while an error is pending.
    pub fn has_pending_error(&self) -> bool {
        self.pending_error.get() != 0
    }

    /// Current call nesting.
    pub fn call_depth(&self) -> u64 {
        self.call_depth.get()
    }
}

/// Name and arity of a function compiled against this runtime; closures are
/// instantiated from it at run time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Prototype {
    name: Symbol,
    arity: usize,
}

#[derive(Debug, Default)]
struct Globals {
    slots: HashMap<Symbol, u32>,
    names: Vec<Symbol>,
    values: Vec<Option<Value>>,
}

thread_local! {
    static ACTIVE: Cell<*const Runtime> = const { Cell::new(ptr::null()) };
}

/// Guard returned by [`Runtime::activate`]; restores the previously active
/// runtime when dropped.
#[derive(Debug)]
pub struct ActiveRuntime<'rt> {
    previous: *const Runtime,
    _runtime: PhantomData<&'rt Runtime>,
}

impl Drop for ActiveRuntime<'_> {
    fn drop(&mut self) {
        ACTIVE.with(|active| active.set(self.previous));
    }
}

/// Runs `f` against the runtime active on this thread.
pub(crate) fn with_active<R>(f: impl FnOnce(&Runtime) -> R) -> Option<R> {
    let runtime = ACTIVE.with(Cell::get);
    if runtime.is_null() {
        return None;
    }
    // SAFETY: the pointer was installed by `activate`, whose guard borrows
    // the runtime and clears the pointer before the borrow ends.
    Some(f(unsafe { &*runtime }))
}

/// Execution state for generated code.
pub struct Runtime {
    hot: Box<HotState>,
    heap: RefCell<Heap>,
    shapes: RefCell<ShapeLattice>,
    symbols: RefCell<Interner>,
    globals: RefCell<Globals>,
    prototypes: RefCell<Vec<Prototype>>,
    sites: RefCell<Vec<Box<PropertySite>>>,
    error: RefCell<Option<RuntimeError>>,
    output: RefCell<Box<dyn Write>>,
    init: Symbol,
}

impl Runtime {
    /// Creates a runtime with the native `clock` function bound as a global.
    ///
    /// # Errors
    ///
    /// Fails only if the heap cannot hold the built-in objects.
    pub fn new(max_call_depth: usize) -> Result<Self, RuntimeError> {
        Self::with_heap(Heap::new(), max_call_depth)
    }

    /// Creates a runtime over a caller-provided heap, for example one built
    /// with [`Heap::with_limit`].
    ///
    /// # Errors
    ///
    /// Fails only if the heap cannot hold the built-in objects.
    pub fn with_heap(heap: Heap, max_call_depth: usize) -> Result<Self, RuntimeError> {
        let mut symbols = Interner::new();
        let init = symbols.intern("init");
        let runtime = Runtime {
            hot: Box::new(HotState {
                pending_error: Cell::new(0),
                call_depth: Cell::new(0),
                max_call_depth: Cell::new(max_call_depth as u64),
                instance_table: Cell::new(heap.instance_table() as u64),
            }),
            heap: RefCell::new(heap),
            shapes: RefCell::new(ShapeLattice::new()),
            symbols: RefCell::new(symbols),
            globals: RefCell::new(Globals::default()),
            prototypes: RefCell::new(Vec::new()),
            sites: RefCell::new(Vec::new()),
            error: RefCell::new(None),
            output: RefCell::new(Box::new(io::stdout())),
            init,
        };

        let clock = runtime.intern_symbol("clock");
        let native = runtime.alloc(HeapObject::Native(Native {
            name: clock,
            arity: 0,
            entry: runtime_support::native_clock as *const () as usize,
        }))?;
        runtime.define_global("clock", native);
        Ok(runtime)
    }

    /// Makes this runtime the one generated code on this thread talks to.
    pub fn activate(&self) -> ActiveRuntime<'_> {
        let previous = ACTIVE.with(|active| active.replace(self as *const Runtime));
        ActiveRuntime {
            previous,
            _runtime: PhantomData,
        }
    }

    /// The hot state block.
    pub fn hot_state(&self) -> &HotState {
        &self.hot
    }

    pub(crate) fn hot_state_address(&self) -> i64 {
        &*self.hot as *const HotState as i64
    }

    /// Replaces the sink `print` writes to.
    pub fn set_output(&self, output: Box<dyn Write>) {
        *self.output.borrow_mut() = output;
    }

    /// Nesting limit for calls.
    pub fn max_call_depth(&self) -> u64 {
        self.hot.max_call_depth.get()
    }

    /// Number of objects allocated so far.
    pub fn heap_len(&self) -> usize {
        self.heap.borrow().len()
    }

    /// Number of shapes created so far.
    pub fn shape_count(&self) -> usize {
        self.shapes.borrow().len()
    }

    // ----- errors -----

    /// Records `error` and flags it for generated code. The first error of a
    /// run wins; later ones raised while unwinding are dropped.
    pub(crate) fn raise(&self, error: RuntimeError) -> u64 {
        let mut slot = self.error.borrow_mut();
        if slot.is_none() {
            *slot = Some(error);
        }
        self.hot.pending_error.set(1);
        NIL_BITS
    }

    /// Takes the pending error, if any, and clears the flag.
    pub fn take_error(&self) -> Option<RuntimeError> {
        self.hot.pending_error.set(0);
        self.error.borrow_mut().take()
    }

    // ----- heap -----

    /// Allocates an object and republishes the instance table.
    pub(crate) fn alloc(&self, object: HeapObject) -> Result<Value, RuntimeError> {
        let mut heap = self.heap.borrow_mut();
        let value = heap.allocate_value(object).map_err(|e| {
            RuntimeError::new(ErrorKind::HeapExhausted, e.to_string())
        })?;
        self.hot.instance_table.set(heap.instance_table() as u64);
        Ok(value)
    }

    /// Interned string constant.
    pub(crate) fn intern_string(&self, text: &str) -> Result<Value, memory_manager::HeapError> {
        let mut heap = self.heap.borrow_mut();
        let handle = heap.intern_string(text)?;
        self.hot.instance_table.set(heap.instance_table() as u64);
        Value::from_object_handle(handle).map_err(|_| memory_manager::HeapError::Exhausted(heap.len()))
    }

    /// Contents of a string value.
    pub fn string_value(&self, value: Value) -> Option<String> {
        self.heap.borrow().as_str(value).map(str::to_string)
    }

    // ----- symbols and prototypes -----

    pub(crate) fn intern_symbol(&self, name: &str) -> Symbol {
        self.symbols.borrow_mut().intern(name)
    }

    pub(crate) fn symbol_name(&self, symbol: Symbol) -> String {
        self.symbols
            .borrow()
            .resolve(symbol)
            .unwrap_or("?")
            .to_string()
    }

    pub(crate) fn register_prototype(&self, name: &str, arity: usize) -> u32 {
        let name = self.intern_symbol(name);
        let mut prototypes = self.prototypes.borrow_mut();
        prototypes.push(Prototype { name, arity });
        (prototypes.len() - 1) as u32
    }

    // ----- globals -----

    /// Slot of a global, allocated on first use.
    pub(crate) fn global_slot(&self, name: &str) -> u32 {
        let symbol = self.intern_symbol(name);
        let mut globals = self.globals.borrow_mut();
        if let Some(&slot) = globals.slots.get(&symbol) {
            return slot;
        }
        let slot = globals.values.len() as u32;
        globals.slots.insert(symbol, slot);
        globals.names.push(symbol);
        globals.values.push(None);
        slot
    }

    pub(crate) fn global_get(&self, slot: u32) -> Result<Value, RuntimeError> {
        let value = self.globals.borrow().values.get(slot as usize).copied().flatten();
        value.ok_or_else(|| self.undefined_global(slot))
    }

    pub(crate) fn global_set(&self, slot: u32, value: Value) -> Result<Value, RuntimeError> {
        let assigned = match self.globals.borrow_mut().values.get_mut(slot as usize) {
            Some(entry) if entry.is_some() => {
                *entry = Some(value);
                true
            }
            _ => false,
        };
        if assigned {
            Ok(value)
        } else {
            Err(self.undefined_global(slot))
        }
    }

    pub(crate) fn global_define(&self, slot: u32, value: Value) {
        if let Some(entry) = self.globals.borrow_mut().values.get_mut(slot as usize) {
            *entry = Some(value);
        }
    }

    /// Defines or redefines a global from the host.
    pub fn define_global(&self, name: &str, value: Value) {
        let slot = self.global_slot(name);
        self.global_define(slot, value);
    }

    /// Current value of a global.
    pub fn global(&self, name: &str) -> Option<Value> {
        let symbol = self.symbols.borrow().get(name)?;
        let globals = self.globals.borrow();
        let slot = *globals.slots.get(&symbol)?;
        globals.values[slot as usize]
    }

    fn undefined_global(&self, slot: u32) -> RuntimeError {
        let symbol = self.globals.borrow().names.get(slot as usize).copied();
        let name = symbol.map_or_else(|| "?".to_string(), |s| self.symbol_name(s));
        RuntimeError::new(
            ErrorKind::UndefinedVariable { name: name.clone() },
            format!("Undefined variable '{}'.", name),
        )
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("objects", &self.heap.borrow().len())
            .field("shapes", &self.shapes.borrow().len())
            .field("sites", &self.sites.borrow().len())
            .field("pending_error", &self.hot.has_pending_error())
            .finish()
    }
}
