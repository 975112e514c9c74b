//! Unit tests for the runtime's public operations

use ast::{BinaryOp, Expr, FunctionDecl, Stmt};
use core_types::{ErrorKind, Tag, Value};
use jit_compiler::{Runtime, Session};
use memory_manager::{Heap, HeapObject};

/// A runtime whose heap already holds the string `text`.
fn runtime_with_string(text: &str) -> (Runtime, Value) {
    let mut heap = Heap::new();
    let string = heap.allocate_value(HeapObject::String(text.into())).unwrap();
    (Runtime::with_heap(heap, 16).unwrap(), string)
}

#[test]
fn test_mixed_addition() {
    let (runtime, label) = runtime_with_string("x = ");
    let third = runtime
        .binary(BinaryOp::Add, Value::from_number(0.1), Value::from_number(0.2))
        .unwrap();
    let joined = runtime.binary(BinaryOp::Add, label, third).unwrap();
    assert_eq!(runtime.string_value(joined).as_deref(), Some("x = 0.3"));

    let joined = runtime.binary(BinaryOp::Add, label, Value::nil()).unwrap();
    assert_eq!(runtime.string_value(joined).as_deref(), Some("x = nil"));

    let error = runtime
        .binary(BinaryOp::Add, Value::FALSE, Value::from_number(1.0))
        .unwrap_err();
    assert_eq!(error.message, "Operands must be numbers or strings for +.");
    assert!(matches!(
        error.kind,
        ErrorKind::DynamicType { ref operands, .. } if operands == &[Tag::Bool, Tag::Number]
    ));
}

#[test]
fn test_strings_only_add() {
    let (runtime, text) = runtime_with_string("abc");
    let error = runtime
        .binary(BinaryOp::Subtract, text, Value::from_number(1.0))
        .unwrap_err();
    assert_eq!(error.message, "Operands must be numbers.");
    match error.kind {
        ErrorKind::DynamicType { operator, operands } => {
            assert_eq!(operator, "-");
            assert_eq!(operands, vec![Tag::Object, Tag::Number]);
        }
        other => panic!("unexpected kind {other:?}"),
    }
    assert_eq!(runtime.negate(text).unwrap_err().message, "Operand must be a number.");
}

#[test]
fn test_comparison_rejects_non_numbers() {
    let runtime = Runtime::new(16).unwrap();
    let error = runtime
        .binary(BinaryOp::Less, Value::nil(), Value::from_number(2.0))
        .unwrap_err();
    assert_eq!(error.message, "Operands must be numbers.");
    match error.kind {
        ErrorKind::DynamicType { operator, operands } => {
            assert_eq!(operator, "<");
            assert_eq!(operands, vec![Tag::Nil, Tag::Number]);
        }
        other => panic!("unexpected kind {other:?}"),
    }
}

#[test]
fn test_equality_never_fails() {
    let runtime = Runtime::new(16).unwrap();
    assert!(runtime.values_equal(Value::nil(), Value::nil()));
    assert!(!runtime.values_equal(Value::nil(), Value::FALSE));
    assert!(!runtime.values_equal(Value::from_number(f64::NAN), Value::from_number(f64::NAN)));
}

#[test]
fn test_prepare_call_checks_arity() {
    let runtime = Runtime::new(16).unwrap();
    let clock = runtime.global("clock").unwrap();
    let (entry, target) = runtime.prepare_call(clock, 0).unwrap();
    assert_ne!(entry, 0);
    assert_eq!(target.closure, clock.to_bits());
    assert_eq!(target.receiver, Value::nil().to_bits());

    let error = runtime.prepare_call(clock, 2).unwrap_err();
    assert_eq!(error.message, "Expected 0 arguments but got 2.");
}

#[test]
fn test_prepare_call_rejects_non_callables() {
    let runtime = Runtime::new(16).unwrap();
    let error = runtime.prepare_call(Value::from_number(3.0), 0).unwrap_err();
    assert_eq!(error.message, "Can only call functions and classes.");
    assert!(matches!(error.kind, ErrorKind::NotCallable { callee: Tag::Number }));
}

#[test]
fn test_render_callables_and_instances() {
    // class Shape { area() { return 0; } }
    let mut session = Session::new().unwrap();
    session
        .run(&[Stmt::class(
            "Shape",
            None,
            vec![FunctionDecl::new("area", &[], vec![Stmt::ret(Some(Expr::number(0.0)))])],
        )])
        .unwrap();

    let class = session.evaluate(&Expr::global("Shape")).unwrap();
    assert_eq!(session.render(class), "Shape");
    let instance = session
        .evaluate(&Expr::call(Expr::global("Shape"), vec![]))
        .unwrap();
    assert_eq!(session.render(instance), "Shape instance");
    let bound = session
        .evaluate(&Expr::get(Expr::call(Expr::global("Shape"), vec![]), "area"))
        .unwrap();
    assert_eq!(session.render(bound), "<fn area>");
    let native = session.evaluate(&Expr::global("clock")).unwrap();
    assert_eq!(session.render(native), "<native fn>");
}
