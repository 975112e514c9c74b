//! Operator semantics for operands the inline fast paths do not handle.

use ast::BinaryOp;
use core_types::{RuntimeError, Value};
use memory_manager::HeapObject;

use super::Runtime;

fn arithmetic(op: BinaryOp, a: f64, b: f64) -> Value {
    match op {
        BinaryOp::Add => Value::from_number(a + b),
        BinaryOp::Subtract => Value::from_number(a - b),
        BinaryOp::Multiply => Value::from_number(a * b),
        BinaryOp::Divide => Value::from_number(a / b),
        BinaryOp::Equal => Value::from_bool(a == b),
        BinaryOp::NotEqual => Value::from_bool(a != b),
        BinaryOp::Less => Value::from_bool(a < b),
        BinaryOp::LessEqual => Value::from_bool(a <= b),
        BinaryOp::Greater => Value::from_bool(a > b),
        BinaryOp::GreaterEqual => Value::from_bool(a >= b),
    }
}

impl Runtime {
    /// Applies a binary operator with full dynamic semantics.
    ///
    /// # Errors
    ///
    /// Returns a dynamic type error naming the operator and operand tags when
    /// the operands are not accepted.
    pub fn binary(&self, op: BinaryOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
        match op {
            BinaryOp::Equal => return Ok(Value::from_bool(self.values_equal(left, right))),
            BinaryOp::NotEqual => return Ok(Value::from_bool(!self.values_equal(left, right))),
            _ => {}
        }
        if let (Ok(a), Ok(b)) = (left.as_number(), right.as_number()) {
            return Ok(arithmetic(op, a, b));
        }
        let operands = vec![left.tag(), right.tag()];
        if op != BinaryOp::Add {
            return Err(RuntimeError::dynamic_type(
                op.symbol(),
                operands,
                "Operands must be numbers.",
            ));
        }

        let concatenates = {
            let heap = self.heap.borrow();
            heap.as_str(left).is_some() || heap.as_str(right).is_some()
        };
        if !concatenates {
            return Err(RuntimeError::dynamic_type(
                "+",
                operands,
                "Operands must be numbers or strings for +.",
            ));
        }
        let text = format!("{}{}", self.render(left), self.render(right));
        self.alloc(HeapObject::String(text.into_boxed_str()))
    }

    /// Unary minus.
    ///
    /// # Errors
    ///
    /// Returns a dynamic type error for non-numbers.
    pub fn negate(&self, operand: Value) -> Result<Value, RuntimeError> {
        operand.as_number().map(|n| Value::from_number(-n)).map_err(|_| {
            RuntimeError::dynamic_type("-", vec![operand.tag()], "Operand must be a number.")
        })
    }

    /// Language equality: numbers by IEEE value, strings by contents,
    /// everything else by identity.
    pub fn values_equal(&self, left: Value, right: Value) -> bool {
        if let (Ok(a), Ok(b)) = (left.as_number(), right.as_number()) {
            return a == b;
        }
        if left == right {
            return true;
        }
        let heap = self.heap.borrow();
        match (heap.as_str(left), heap.as_str(right)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}
