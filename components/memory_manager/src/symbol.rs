//! Interning of names used as field, method and global keys.

use std::collections::HashMap;

/// An interned name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    /// Returns the raw index of the symbol.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Rebuilds a symbol from a raw index produced by [`Symbol::as_u32`].
    pub fn from_u32(raw: u32) -> Self {
        Symbol(raw)
    }
}

/// Maps names to dense [`Symbol`]s and back.
///
/// # Example
///
/// ```
/// use memory_manager::Interner;
///
/// let mut names = Interner::new();
/// let x = names.intern("x");
/// assert_eq!(names.intern("x"), x);
/// assert_eq!(names.resolve(x), Some("x"));
/// ```
#[derive(Debug, Default)]
pub struct Interner {
    ids: HashMap<Box<str>, Symbol>,
    names: Vec<Box<str>>,
}

impl Interner {
    /// Creates an empty interner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the symbol for `name`, creating it on first use.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(&symbol) = self.ids.get(name) {
            return symbol;
        }
        let symbol = Symbol(self.names.len() as u32);
        self.names.push(name.into());
        self.ids.insert(name.into(), symbol);
        symbol
    }

    /// Returns the symbol for `name` if it was interned before.
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.ids.get(name).copied()
    }

    /// Returns the name of `symbol`.
    pub fn resolve(&self, symbol: Symbol) -> Option<&str> {
        self.names.get(symbol.0 as usize).map(|name| &**name)
    }

    /// Number of interned names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
