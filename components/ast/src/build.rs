//! Convenience constructors for hosts and tests that assemble trees by hand.
//!
//! Identifiers created here carry line 1.

use crate::expr::{BinaryOp, Expr, Identifier, Literal, LogicalOp, Resolution, UnaryOp};
use crate::stmt::{ClassDecl, FunctionDecl, Stmt};

fn ident(name: &str) -> Identifier {
    Identifier::new(name, 1)
}

impl Expr {
    /// `nil`
    pub fn nil() -> Expr {
        Expr::Literal(Literal::Nil)
    }

    /// Boolean literal.
    pub fn boolean(value: bool) -> Expr {
        Expr::Literal(Literal::Bool(value))
    }

    /// Number literal.
    pub fn number(value: f64) -> Expr {
        Expr::Literal(Literal::Number(value))
    }

    /// String literal.
    pub fn string(value: &str) -> Expr {
        Expr::Literal(Literal::String(value.to_string()))
    }

    /// Parenthesised expression.
    pub fn grouping(inner: Expr) -> Expr {
        Expr::Grouping(Box::new(inner))
    }

    /// Prefix operator.
    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Infix operator.
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `and` / `or`.
    pub fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
        Expr::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Read of a global.
    pub fn global(name: &str) -> Expr {
        Expr::Variable {
            name: ident(name),
            resolution: Resolution::Global,
        }
    }

    /// Read of a local declared `depth` scopes out.
    pub fn local(name: &str, depth: usize) -> Expr {
        Expr::Variable {
            name: ident(name),
            resolution: Resolution::Local { depth },
        }
    }

    /// Assignment to a global.
    pub fn assign_global(name: &str, value: Expr) -> Expr {
        Expr::Assign {
            name: ident(name),
            value: Box::new(value),
            resolution: Resolution::Global,
        }
    }

    /// Assignment to a local declared `depth` scopes out.
    pub fn assign_local(name: &str, depth: usize, value: Expr) -> Expr {
        Expr::Assign {
            name: ident(name),
            value: Box::new(value),
            resolution: Resolution::Local { depth },
        }
    }

    /// Call.
    pub fn call(callee: Expr, arguments: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: Box::new(callee),
            arguments,
            line: 1,
        }
    }

    /// Property read.
    pub fn get(object: Expr, name: &str) -> Expr {
        Expr::Get {
            object: Box::new(object),
            name: ident(name),
        }
    }

    /// Property write.
    pub fn set(object: Expr, name: &str, value: Expr) -> Expr {
        Expr::Set {
            object: Box::new(object),
            name: ident(name),
            value: Box::new(value),
        }
    }

    /// `this`, declared `depth` scopes out.
    pub fn this(depth: usize) -> Expr {
        Expr::This {
            keyword: ident("this"),
            resolution: Resolution::Local { depth },
        }
    }

    /// `super.method`, with `super` declared `depth` scopes out.
    pub fn super_method(method: &str, depth: usize) -> Expr {
        Expr::Super {
            keyword: ident("super"),
            method: ident(method),
            resolution: Resolution::Local { depth },
        }
    }
}

impl FunctionDecl {
    /// Creates a function declaration.
    pub fn new(name: &str, params: &[&str], body: Vec<Stmt>) -> Self {
        FunctionDecl {
            name: ident(name),
            params: params.iter().map(|p| ident(p)).collect(),
            body,
        }
    }
}

impl Stmt {
    /// Expression statement.
    pub fn expression(expr: Expr) -> Stmt {
        Stmt::Expression(expr)
    }

    /// `print`.
    pub fn print(expr: Expr) -> Stmt {
        Stmt::Print(expr)
    }

    /// `var`.
    pub fn var(name: &str, initializer: Option<Expr>) -> Stmt {
        Stmt::Var {
            name: ident(name),
            initializer,
        }
    }

    /// Block.
    pub fn block(statements: Vec<Stmt>) -> Stmt {
        Stmt::Block(statements)
    }

    /// `if` with an optional `else`.
    pub fn if_else(condition: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Stmt {
        Stmt::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        }
    }

    /// `while`.
    pub fn while_loop(condition: Expr, body: Stmt) -> Stmt {
        Stmt::While {
            condition,
            body: Box::new(body),
        }
    }

    /// Function declaration.
    pub fn function(name: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
        Stmt::Function(FunctionDecl::new(name, params, body))
    }

    /// `return`.
    pub fn ret(value: Option<Expr>) -> Stmt {
        Stmt::Return {
            keyword: ident("return"),
            value,
        }
    }

    /// Class declaration.
    pub fn class(name: &str, superclass: Option<Expr>, methods: Vec<FunctionDecl>) -> Stmt {
        Stmt::Class(ClassDecl {
            name: ident(name),
            superclass,
            methods,
        })
    }
}
