//! End-to-end execution tests
//!
//! Tests the complete stack: resolved tree -> CodeGenerator -> Engine ->
//! generated code -> runtime helpers. Covers:
//! - Literals, arithmetic and string concatenation
//! - Control flow (if/else, while, logical operators)
//! - Functions, recursion and closures
//! - Globals persisting across submissions
//! - Runtime errors and the call depth limit

use ast::{BinaryOp, Expr, LogicalOp, Stmt, UnaryOp};
use core_types::ErrorKind;
use integration_tests::{session, session_with_depth};
use jit_compiler::SessionError;

fn add(left: Expr, right: Expr) -> Expr {
    Expr::binary(BinaryOp::Add, left, right)
}

fn sub(left: Expr, right: Expr) -> Expr {
    Expr::binary(BinaryOp::Subtract, left, right)
}

fn less(left: Expr, right: Expr) -> Expr {
    Expr::binary(BinaryOp::Less, left, right)
}

fn call(callee: Expr, arguments: Vec<Expr>) -> Expr {
    Expr::call(callee, arguments)
}

/// Runs `program` in a fresh session and returns the printed lines.
fn output_of(program: &[Stmt]) -> Vec<String> {
    let (mut session, output) = session();
    session.run(program).expect("program runs");
    output.lines()
}

fn runtime_error(result: Result<core_types::Value, SessionError>) -> core_types::RuntimeError {
    match result {
        Err(SessionError::Runtime(error)) => error,
        other => panic!("expected a runtime error, got {:?}", other.map(|v| v.to_bits())),
    }
}

#[test]
fn test_print_hello() {
    assert_eq!(output_of(&[Stmt::print(Expr::string("hello"))]), ["hello"]);
}

#[test]
fn test_print_sum() {
    let program = [Stmt::print(add(Expr::number(1.0), Expr::number(2.0)))];
    assert_eq!(output_of(&program), ["3"]);
}

#[test]
fn test_number_plus_string_concatenates() {
    let program = [Stmt::print(add(Expr::number(1.0), Expr::string("2")))];
    assert_eq!(output_of(&program), ["12"]);
}

#[test]
fn test_arithmetic_precedence_from_tree_shape() {
    // print (1 + 2) * 4 - 6 / 3;
    let product = Expr::binary(
        BinaryOp::Multiply,
        Expr::grouping(add(Expr::number(1.0), Expr::number(2.0))),
        Expr::number(4.0),
    );
    let quotient = Expr::binary(BinaryOp::Divide, Expr::number(6.0), Expr::number(3.0));
    let program = [Stmt::print(sub(product, quotient))];
    assert_eq!(output_of(&program), ["10"]);
}

#[test]
fn test_number_formatting_keeps_six_significant_digits() {
    // print 1000000; print 0.1 + 0.2; print 1e21; print 0 / 0;
    let program = [
        Stmt::print(Expr::number(1_000_000.0)),
        Stmt::print(add(Expr::number(0.1), Expr::number(0.2))),
        Stmt::print(Expr::number(1e21)),
        Stmt::print(Expr::binary(BinaryOp::Divide, Expr::number(0.0), Expr::number(0.0))),
    ];
    let lines = output_of(&program);
    assert_eq!(lines[..3], ["1e+06", "0.3", "1e+21"]);
    // The sign of a NaN produced by the hardware is not fixed.
    assert!(lines[3] == "nan" || lines[3] == "-nan", "got {}", lines[3]);
}

#[test]
fn test_fractions_and_negation() {
    let program = [
        Stmt::print(Expr::binary(BinaryOp::Divide, Expr::number(5.0), Expr::number(2.0))),
        Stmt::print(Expr::unary(UnaryOp::Negate, Expr::number(0.5))),
        Stmt::print(Expr::unary(UnaryOp::Not, Expr::nil())),
    ];
    assert_eq!(output_of(&program), ["2.5", "-0.5", "true"]);
}

#[test]
fn test_string_equality_by_contents() {
    // print "a" + "b" == "ab"; print "a" != "a";
    let program = [
        Stmt::print(Expr::binary(
            BinaryOp::Equal,
            add(Expr::string("a"), Expr::string("b")),
            Expr::string("ab"),
        )),
        Stmt::print(Expr::binary(
            BinaryOp::NotEqual,
            Expr::string("a"),
            Expr::string("a"),
        )),
    ];
    assert_eq!(output_of(&program), ["true", "false"]);
}

#[test]
fn test_if_else_and_logical_operators() {
    // if (1 < 2 and nil) print "then"; else print "else";
    // print false or "fallback";
    let program = [
        Stmt::if_else(
            Expr::logical(
                LogicalOp::And,
                less(Expr::number(1.0), Expr::number(2.0)),
                Expr::nil(),
            ),
            Stmt::print(Expr::string("then")),
            Some(Stmt::print(Expr::string("else"))),
        ),
        Stmt::print(Expr::logical(
            LogicalOp::Or,
            Expr::boolean(false),
            Expr::string("fallback"),
        )),
    ];
    assert_eq!(output_of(&program), ["else", "fallback"]);
}

#[test]
fn test_while_loop_over_global() {
    // var i = 0; while (i < 3) { print i; i = i + 1; }
    let program = [
        Stmt::var("i", Some(Expr::number(0.0))),
        Stmt::while_loop(
            less(Expr::global("i"), Expr::number(3.0)),
            Stmt::block(vec![
                Stmt::print(Expr::global("i")),
                Stmt::expression(Expr::assign_global(
                    "i",
                    add(Expr::global("i"), Expr::number(1.0)),
                )),
            ]),
        ),
    ];
    assert_eq!(output_of(&program), ["0", "1", "2"]);
}

#[test]
fn test_recursive_fibonacci() {
    // fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }
    // print fib(15);
    let body = vec![
        Stmt::if_else(
            less(Expr::local("n", 0), Expr::number(2.0)),
            Stmt::ret(Some(Expr::local("n", 0))),
            None,
        ),
        Stmt::ret(Some(add(
            call(Expr::global("fib"), vec![sub(Expr::local("n", 0), Expr::number(1.0))]),
            call(Expr::global("fib"), vec![sub(Expr::local("n", 0), Expr::number(2.0))]),
        ))),
    ];
    let program = [
        Stmt::function("fib", &["n"], body),
        Stmt::print(call(Expr::global("fib"), vec![Expr::number(15.0)])),
    ];
    assert_eq!(output_of(&program), ["610"]);
}

fn make_counter() -> Stmt {
    // fun makeCounter() {
    //   var count = 0;
    //   fun increment() { count = count + 1; return count; }
    //   return increment;
    // }
    Stmt::function(
        "makeCounter",
        &[],
        vec![
            Stmt::var("count", Some(Expr::number(0.0))),
            Stmt::function(
                "increment",
                &[],
                vec![
                    Stmt::expression(Expr::assign_local(
                        "count",
                        1,
                        add(Expr::local("count", 1), Expr::number(1.0)),
                    )),
                    Stmt::ret(Some(Expr::local("count", 1))),
                ],
            ),
            Stmt::ret(Some(Expr::local("increment", 0))),
        ],
    )
}

#[test]
fn test_closures_keep_independent_state() {
    let program = [
        make_counter(),
        Stmt::var("a", Some(call(Expr::global("makeCounter"), vec![]))),
        Stmt::var("b", Some(call(Expr::global("makeCounter"), vec![]))),
        Stmt::print(call(Expr::global("a"), vec![])),
        Stmt::print(call(Expr::global("a"), vec![])),
        Stmt::print(call(Expr::global("b"), vec![])),
        Stmt::print(Expr::global("a")),
    ];
    assert_eq!(output_of(&program), ["1", "2", "1", "<fn increment>"]);
}

#[test]
fn test_local_function_calls_itself() {
    // { fun fact(n) { if (n <= 1) return 1; return n * fact(n - 1); } print fact(5); }
    let fact = Stmt::function(
        "fact",
        &["n"],
        vec![
            Stmt::if_else(
                Expr::binary(BinaryOp::LessEqual, Expr::local("n", 0), Expr::number(1.0)),
                Stmt::ret(Some(Expr::number(1.0))),
                None,
            ),
            Stmt::ret(Some(Expr::binary(
                BinaryOp::Multiply,
                Expr::local("n", 0),
                call(Expr::local("fact", 1), vec![sub(Expr::local("n", 0), Expr::number(1.0))]),
            ))),
        ],
    );
    let program = [Stmt::block(vec![
        fact,
        Stmt::print(call(Expr::local("fact", 0), vec![Expr::number(5.0)])),
    ])];
    assert_eq!(output_of(&program), ["120"]);
}

#[test]
fn test_closure_sees_later_assignment() {
    // { var x = "before"; fun show() { print x; } x = "after"; show(); }
    let program = [Stmt::block(vec![
        Stmt::var("x", Some(Expr::string("before"))),
        Stmt::function("show", &[], vec![Stmt::print(Expr::local("x", 1))]),
        Stmt::expression(Expr::assign_local("x", 0, Expr::string("after"))),
        Stmt::expression(call(Expr::local("show", 0), vec![])),
    ])];
    assert_eq!(output_of(&program), ["after"]);
}

#[test]
fn test_script_returns_last_expression_value() {
    let (mut session, _) = session();
    let value = session
        .run(&[
            Stmt::expression(Expr::number(1.0)),
            Stmt::expression(Expr::number(2.0)),
        ])
        .unwrap();
    assert_eq!(value.as_number().unwrap(), 2.0);

    let value = session.run(&[Stmt::print(Expr::number(3.0))]).unwrap();
    assert!(value.is_nil());
}

#[test]
fn test_globals_persist_between_submissions() {
    let (mut session, output) = session();
    session
        .run(&[Stmt::var("x", Some(Expr::number(10.0)))])
        .unwrap();
    session
        .run(&[Stmt::print(Expr::binary(
            BinaryOp::Multiply,
            Expr::global("x"),
            Expr::number(2.0),
        ))])
        .unwrap();
    assert_eq!(output.lines(), ["20"]);
}

#[test]
fn test_clock_native() {
    let program = [
        Stmt::print(Expr::binary(
            BinaryOp::Greater,
            call(Expr::global("clock"), vec![]),
            Expr::number(0.0),
        )),
        Stmt::print(Expr::global("clock")),
    ];
    assert_eq!(output_of(&program), ["true", "<native fn>"]);
}

#[test]
fn test_undefined_variable() {
    let (mut session, output) = session();
    let error = runtime_error(session.run(&[
        Stmt::print(Expr::string("first")),
        Stmt::print(Expr::global("ghost")),
        Stmt::print(Expr::string("never")),
    ]));
    assert_eq!(error.message, "Undefined variable 'ghost'.");
    assert!(matches!(error.kind, ErrorKind::UndefinedVariable { .. }));
    assert_eq!(output.lines(), ["first"]);
}

#[test]
fn test_assignment_to_undefined_global() {
    let (mut session, _) = session();
    let error = runtime_error(session.run(&[Stmt::expression(Expr::assign_global(
        "nope",
        Expr::number(1.0),
    ))]));
    assert_eq!(error.message, "Undefined variable 'nope'.");
}

#[test]
fn test_operand_type_errors() {
    let (mut session, _) = session();
    let error = runtime_error(session.evaluate(&sub(Expr::string("a"), Expr::number(1.0))));
    assert_eq!(error.message, "Operands must be numbers.");

    let error = runtime_error(session.evaluate(&add(Expr::nil(), Expr::boolean(true))));
    assert_eq!(error.message, "Operands must be numbers or strings for +.");

    let error = runtime_error(session.evaluate(&Expr::unary(UnaryOp::Negate, Expr::nil())));
    assert_eq!(error.message, "Operand must be a number.");
}

#[test]
fn test_call_errors() {
    let (mut session, _) = session();
    let error = runtime_error(session.evaluate(&call(Expr::number(1.0), vec![])));
    assert_eq!(error.message, "Can only call functions and classes.");

    session
        .run(&[Stmt::function("one", &["a"], vec![])])
        .unwrap();
    let error = runtime_error(session.evaluate(&call(Expr::global("one"), vec![])));
    assert_eq!(error.message, "Expected 1 arguments but got 0.");
    assert!(matches!(
        error.kind,
        ErrorKind::Arity {
            expected: 1,
            found: 0
        }
    ));
}

#[test]
fn test_runaway_recursion_overflows() {
    // fun f() { return f(); } f();
    let (mut session, _) = session_with_depth(200);
    let program = [
        Stmt::function(
            "f",
            &[],
            vec![Stmt::ret(Some(call(Expr::global("f"), vec![])))],
        ),
        Stmt::expression(call(Expr::global("f"), vec![])),
    ];
    let error = runtime_error(session.run(&program));
    assert_eq!(error.message, "Stack overflow.");
    assert!(matches!(error.kind, ErrorKind::StackOverflow));
    assert_eq!(session.runtime().hot_state().call_depth(), 0);

    // The session keeps working after unwinding.
    let value = session.evaluate(&Expr::number(5.0)).unwrap();
    assert_eq!(value.as_number().unwrap(), 5.0);
}

#[test]
fn test_error_inside_nested_call_unwinds() {
    // fun inner() { return nil + 1; } fun outer() { inner(); print "unreachable"; } outer();
    let (mut session, output) = session();
    let program = [
        Stmt::function(
            "inner",
            &[],
            vec![Stmt::ret(Some(add(Expr::nil(), Expr::number(1.0))))],
        ),
        Stmt::function(
            "outer",
            &[],
            vec![
                Stmt::expression(call(Expr::global("inner"), vec![])),
                Stmt::print(Expr::string("unreachable")),
            ],
        ),
        Stmt::expression(call(Expr::global("outer"), vec![])),
    ];
    let error = runtime_error(session.run(&program));
    assert_eq!(error.message, "Operands must be numbers or strings for +.");
    assert!(output.contents().is_empty());
    assert_eq!(session.runtime().hot_state().call_depth(), 0);
}
