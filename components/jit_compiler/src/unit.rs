//! Compilation units: the closed bundles handed from the code generator to
//! the engine.
//!
//! A unit is a declaration table plus one IR function per defined entry.
//! Inside the IR, every function reference is a user external name in
//! namespace 0 whose index is a position in the declaration table; the engine
//! maps those positions to backend function ids when it materializes the
//! unit.

use cranelift_codegen::ir::{Function, Signature};
use cranelift_module::Linkage as ModuleLinkage;

/// Index of a declaration within its unit.
pub type DeclIndex = u32;

/// Visibility of a declared function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    /// Provided by the host; resolved through the engine's symbol table
    Import,
    /// Defined by this unit and visible only inside it
    Local,
    /// Defined by this unit and resolvable through [`Engine::lookup`](crate::Engine::lookup)
    Export,
}

impl From<Linkage> for ModuleLinkage {
    fn from(linkage: Linkage) -> Self {
        match linkage {
            Linkage::Import => ModuleLinkage::Import,
            Linkage::Local => ModuleLinkage::Local,
            Linkage::Export => ModuleLinkage::Export,
        }
    }
}

/// One entry of a unit's declaration table.
#[derive(Debug, Clone)]
pub struct Declaration {
    /// Symbol name
    pub name: String,
    /// Visibility
    pub linkage: Linkage,
    /// Calling signature
    pub signature: Signature,
}

/// Body of a declared function.
#[derive(Debug, Clone)]
pub struct Definition {
    /// Declaration this body belongs to
    pub declaration: DeclIndex,
    /// The IR
    pub function: Function,
}

/// A closed, self-contained bundle of generated code.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    name: String,
    declarations: Vec<Declaration>,
    definitions: Vec<Definition>,
}

impl CompilationUnit {
    /// Creates an empty unit.
    pub fn new(name: impl Into<String>) -> Self {
        CompilationUnit {
            name: name.into(),
            declarations: Vec::new(),
            definitions: Vec::new(),
        }
    }

    /// Unit name, used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a declaration and returns its index.
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        linkage: Linkage,
        signature: Signature,
    ) -> DeclIndex {
        self.declarations.push(Declaration {
            name: name.into(),
            linkage,
            signature,
        });
        (self.declarations.len() - 1) as DeclIndex
    }

    /// Attaches the body of a declaration.
    pub fn define(&mut self, declaration: DeclIndex, function: Function) {
        self.definitions.push(Definition {
            declaration,
            function,
        });
    }

    /// The declaration table.
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// The function bodies.
    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    /// Names of the exported declarations.
    pub fn exports(&self) -> impl Iterator<Item = &str> + '_ {
        self.declarations
            .iter()
            .filter(|d| d.linkage == Linkage::Export)
            .map(|d| d.name.as_str())
    }

    pub(crate) fn into_parts(self) -> (String, Vec<Declaration>, Vec<Definition>) {
        (self.name, self.declarations, self.definitions)
    }
}
