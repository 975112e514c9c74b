//! Statement nodes.

use crate::expr::{Expr, Identifier};

/// A function or method declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// Function name
    pub name: Identifier,
    /// Parameter names
    pub params: Vec<Identifier>,
    /// Body statements; they share the parameters' scope
    pub body: Vec<Stmt>,
}

/// A class declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    /// Class name
    pub name: Identifier,
    /// Superclass reference, always an [`Expr::Variable`]
    pub superclass: Option<Expr>,
    /// Methods; one named `init` is the initializer
    pub methods: Vec<FunctionDecl>,
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Expression evaluated for effect
    Expression(Expr),
    /// `print expr;`
    Print(Expr),
    /// `var name = initializer;`
    Var {
        /// Declared name
        name: Identifier,
        /// Initial value; nil when absent
        initializer: Option<Expr>,
    },
    /// `{ ... }`
    Block(Vec<Stmt>),
    /// `if (condition) then else otherwise`
    If {
        /// Condition
        condition: Expr,
        /// Taken when the condition is truthy
        then_branch: Box<Stmt>,
        /// Taken otherwise
        else_branch: Option<Box<Stmt>>,
    },
    /// `while (condition) body`; `for` loops arrive desugared into this form
    While {
        /// Condition, re-evaluated before every iteration
        condition: Expr,
        /// Loop body
        body: Box<Stmt>,
    },
    /// `fun name(params) { body }`
    Function(FunctionDecl),
    /// `return value;`
    Return {
        /// The keyword
        keyword: Identifier,
        /// Returned value; nil when absent
        value: Option<Expr>,
    },
    /// `class Name < Superclass { methods }`
    Class(ClassDecl),
}
