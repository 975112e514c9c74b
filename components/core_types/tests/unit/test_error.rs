//! Unit tests for the runtime error vocabulary

use core_types::{ErrorKind, RuntimeError, Tag};

#[test]
fn test_runtime_error_displays_message() {
    let error = RuntimeError::new(
        ErrorKind::UndefinedVariable {
            name: "x".to_string(),
        },
        "Undefined variable 'x'.",
    );
    assert_eq!(error.to_string(), "Undefined variable 'x'.");
}

#[test]
fn test_dynamic_type_error_carries_context() {
    let error = RuntimeError::dynamic_type(
        "+",
        vec![Tag::Number, Tag::Nil],
        "Operands must be numbers or strings for +.",
    );
    match error.kind {
        ErrorKind::DynamicType { operator, operands } => {
            assert_eq!(operator, "+");
            assert_eq!(operands, vec![Tag::Number, Tag::Nil]);
        }
        other => panic!("unexpected kind {:?}", other),
    }
}

#[test]
fn test_runtime_error_is_std_error() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    let error = RuntimeError::new(ErrorKind::StackOverflow, "Stack overflow.");
    assert_error(&error);
}

#[test]
fn test_arity_kind() {
    let kind = ErrorKind::Arity {
        expected: 2,
        found: 1,
    };
    assert!(matches!(kind, ErrorKind::Arity { expected: 2, found: 1 }));
}
