//! Lexical scope stack shared by capture analysis and lowering.

use ast::{ClassDecl, FunctionDecl, Identifier};

/// Identity of one declaration, taken from the address of the tree node that
/// introduces it. Both passes walk the same tree, so keys agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum DeclKey {
    /// Variable, parameter, function or class name
    Name(usize),
    /// Receiver of a method
    This(usize),
    /// Superclass seen by the methods of a subclass
    Super(usize),
}

impl DeclKey {
    pub(crate) fn name(identifier: &Identifier) -> Self {
        DeclKey::Name(identifier as *const Identifier as usize)
    }

    pub(crate) fn this(method: &FunctionDecl) -> Self {
        DeclKey::This(method as *const FunctionDecl as usize)
    }

    pub(crate) fn superclass(class: &ClassDecl) -> Self {
        DeclKey::Super(class as *const ClassDecl as usize)
    }
}

#[derive(Debug)]
struct Scope {
    frame: usize,
    entries: Vec<(String, DeclKey)>,
}

/// Scopes from outermost to innermost. Each scope belongs to the function
/// (frame) that was being compiled when it was pushed.
#[derive(Debug, Default)]
pub(crate) struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub(crate) fn push(&mut self, frame: usize) {
        self.scopes.push(Scope {
            frame,
            entries: Vec::new(),
        });
    }

    pub(crate) fn pop(&mut self) {
        self.scopes.pop();
    }

    /// True at top level, where declarations are globals.
    pub(crate) fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub(crate) fn declare(&mut self, name: &str, key: DeclKey) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.entries.push((name.to_string(), key));
        }
    }

    /// The declaration `name` names when it sits `depth` scopes out, and the
    /// frame owning that scope.
    pub(crate) fn resolve(&self, name: &str, depth: usize) -> Option<(usize, DeclKey)> {
        let index = self.scopes.len().checked_sub(depth + 1)?;
        let scope = &self.scopes[index];
        scope
            .entries
            .iter()
            .rev()
            .find(|(declared, _)| declared == name)
            .map(|&(_, key)| (scope.frame, key))
    }
}
