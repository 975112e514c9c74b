//! Capture analysis: finds the locals some inner function refers to.
//!
//! Those locals are boxed in heap cells so the declaring function and every
//! closure share one mutable location. The walk pushes and pops scopes in
//! exactly the order lowering does.

use ast::{ClassDecl, Expr, FunctionDecl, Resolution, Stmt};
use std::collections::HashSet;

use super::scope::{DeclKey, ScopeStack};

/// Declarations referenced from a function other than the declaring one.
pub(crate) fn analyze(program: &[Stmt]) -> HashSet<DeclKey> {
    let mut walker = CaptureWalker {
        scopes: ScopeStack::default(),
        frame: 0,
        next_frame: 1,
        captured: HashSet::new(),
    };
    walker.statements(program);
    walker.captured
}

struct CaptureWalker {
    scopes: ScopeStack,
    frame: usize,
    next_frame: usize,
    captured: HashSet<DeclKey>,
}

impl CaptureWalker {
    fn statements(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.statement(statement);
        }
    }

    fn statement(&mut self, statement: &Stmt) {
        match statement {
            Stmt::Expression(expr) | Stmt::Print(expr) => self.expr(expr),
            Stmt::Var { name, initializer } => {
                if let Some(initializer) = initializer {
                    self.expr(initializer);
                }
                self.scopes.declare(&name.name, DeclKey::name(name));
            }
            Stmt::Block(statements) => {
                self.scopes.push(self.frame);
                self.statements(statements);
                self.scopes.pop();
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expr(condition);
                self.statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.statement(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.expr(condition);
                self.statement(body);
            }
            Stmt::Function(decl) => {
                self.scopes.declare(&decl.name.name, DeclKey::name(&decl.name));
                self.function(decl, false);
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            Stmt::Class(class) => self.class(class),
        }
    }

    fn class(&mut self, class: &ClassDecl) {
        self.scopes.declare(&class.name.name, DeclKey::name(&class.name));
        if let Some(superclass) = &class.superclass {
            self.expr(superclass);
            self.scopes.push(self.frame);
            self.scopes.declare("super", DeclKey::superclass(class));
        }
        for method in &class.methods {
            self.function(method, true);
        }
        if class.superclass.is_some() {
            self.scopes.pop();
        }
    }

    fn function(&mut self, decl: &FunctionDecl, method: bool) {
        let enclosing = self.frame;
        self.frame = self.next_frame;
        self.next_frame += 1;

        if method {
            self.scopes.push(self.frame);
            self.scopes.declare("this", DeclKey::this(decl));
        }
        self.scopes.push(self.frame);
        for param in &decl.params {
            self.scopes.declare(&param.name, DeclKey::name(param));
        }
        self.statements(&decl.body);
        self.scopes.pop();
        if method {
            self.scopes.pop();
        }

        self.frame = enclosing;
    }

    fn reference(&mut self, name: &str, resolution: Resolution) {
        if let Resolution::Local { depth } = resolution {
            if let Some((frame, key)) = self.scopes.resolve(name, depth) {
                if frame != self.frame {
                    self.captured.insert(key);
                }
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}
            Expr::Grouping(inner) => self.expr(inner),
            Expr::Unary { operand, .. } => self.expr(operand),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::Variable { name, resolution } => self.reference(&name.name, *resolution),
            Expr::Assign {
                name,
                value,
                resolution,
            } => {
                self.expr(value);
                self.reference(&name.name, *resolution);
            }
            Expr::Call {
                callee, arguments, ..
            } => {
                self.expr(callee);
                for argument in arguments {
                    self.expr(argument);
                }
            }
            Expr::Get { object, .. } => self.expr(object),
            Expr::Set { object, value, .. } => {
                self.expr(object);
                self.expr(value);
            }
            Expr::This { resolution, .. } => self.reference("this", *resolution),
            Expr::Super { resolution, .. } => {
                self.reference("super", *resolution);
                if let Resolution::Local { depth } = *resolution {
                    if depth > 0 {
                        self.reference("this", Resolution::Local { depth: depth - 1 });
                    }
                }
            }
        }
    }
}
