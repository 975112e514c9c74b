//! Expression nodes.

use std::fmt;

/// A name as written in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    /// The name
    pub name: String,
    /// Source line
    pub line: u32,
}

impl Identifier {
    /// Creates an identifier.
    pub fn new(name: impl Into<String>, line: u32) -> Self {
        Identifier {
            name: name.into(),
            line,
        }
    }
}

/// Where a variable reference resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Declared in the scope `depth` levels out from the reference
    Local {
        /// Number of scopes between the reference and the declaration
        depth: usize,
    },
    /// Not found in any enclosing scope
    Global,
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `nil`
    Nil,
    /// `true` / `false`
    Bool(bool),
    /// Number literal
    Number(f64),
    /// String literal, without quotes
    String(String),
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-`
    Negate,
    /// `!`
    Not,
}

/// Infix operators that evaluate both operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
}

impl BinaryOp {
    /// Every operator, in a fixed order usable as a numbering.
    pub const ALL: [BinaryOp; 10] = [
        BinaryOp::Add,
        BinaryOp::Subtract,
        BinaryOp::Multiply,
        BinaryOp::Divide,
        BinaryOp::Equal,
        BinaryOp::NotEqual,
        BinaryOp::Less,
        BinaryOp::LessEqual,
        BinaryOp::Greater,
        BinaryOp::GreaterEqual,
    ];

    /// Position of the operator in [`BinaryOp::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Source spelling.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
        }
    }

    /// True for `<`, `<=`, `>` and `>=`.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Short-circuiting operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// `and`
    And,
    /// `or`
    Or,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    Literal(Literal),
    /// Parenthesised expression
    Grouping(Box<Expr>),
    /// Prefix operator application
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// Infix operator application
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// `and` / `or`
    Logical {
        /// Operator
        op: LogicalOp,
        /// Left operand, always evaluated
        left: Box<Expr>,
        /// Right operand, evaluated only when the left does not decide
        right: Box<Expr>,
    },
    /// Variable read
    Variable {
        /// Variable name
        name: Identifier,
        /// Where the name resolves
        resolution: Resolution,
    },
    /// Variable assignment
    Assign {
        /// Variable name
        name: Identifier,
        /// Assigned value
        value: Box<Expr>,
        /// Where the name resolves
        resolution: Resolution,
    },
    /// Call
    Call {
        /// The called value
        callee: Box<Expr>,
        /// Arguments, left to right
        arguments: Vec<Expr>,
        /// Line of the closing parenthesis
        line: u32,
    },
    /// Property read
    Get {
        /// Object read from
        object: Box<Expr>,
        /// Property name
        name: Identifier,
    },
    /// Property write
    Set {
        /// Object written to
        object: Box<Expr>,
        /// Property name
        name: Identifier,
        /// Stored value
        value: Box<Expr>,
    },
    /// `this`
    This {
        /// The keyword
        keyword: Identifier,
        /// Where `this` resolves
        resolution: Resolution,
    },
    /// `super.method`
    Super {
        /// The keyword
        keyword: Identifier,
        /// Method name
        method: Identifier,
        /// Where `super` resolves; `this` sits one scope further in
        resolution: Resolution,
    },
}
