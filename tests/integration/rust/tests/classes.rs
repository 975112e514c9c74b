//! Classes, instances, methods and inheritance

use ast::{BinaryOp, Expr, FunctionDecl, Stmt};
use integration_tests::session;
use jit_compiler::SessionError;

fn call(callee: Expr, arguments: Vec<Expr>) -> Expr {
    Expr::call(callee, arguments)
}

fn method_call(object: Expr, name: &str, arguments: Vec<Expr>) -> Expr {
    call(Expr::get(object, name), arguments)
}

fn returns(expr: Expr) -> Vec<Stmt> {
    vec![Stmt::ret(Some(expr))]
}

/// class Point {
///   init(x, y) { this.x = x; this.y = y; }
///   sum() { return this.x + this.y; }
/// }
fn point_class() -> Stmt {
    let init = FunctionDecl::new(
        "init",
        &["x", "y"],
        vec![
            Stmt::expression(Expr::set(Expr::this(1), "x", Expr::local("x", 0))),
            Stmt::expression(Expr::set(Expr::this(1), "y", Expr::local("y", 0))),
        ],
    );
    let sum = FunctionDecl::new(
        "sum",
        &[],
        returns(Expr::binary(
            BinaryOp::Add,
            Expr::get(Expr::this(1), "x"),
            Expr::get(Expr::this(1), "y"),
        )),
    );
    Stmt::class("Point", None, vec![init, sum])
}

#[test]
fn test_initializer_and_methods() {
    let (mut session, output) = session();
    let program = [
        point_class(),
        Stmt::var(
            "p",
            Some(call(
                Expr::global("Point"),
                vec![Expr::number(1.0), Expr::number(2.0)],
            )),
        ),
        Stmt::print(method_call(Expr::global("p"), "sum", vec![])),
        Stmt::print(Expr::global("p")),
        Stmt::print(Expr::global("Point")),
        Stmt::print(Expr::get(Expr::global("p"), "sum")),
    ];
    session.run(&program).unwrap();
    assert_eq!(
        output.lines(),
        ["3", "Point instance", "Point", "<fn sum>"]
    );
}

#[test]
fn test_bound_method_remembers_receiver() {
    let (mut session, output) = session();
    let program = [
        point_class(),
        Stmt::var(
            "p",
            Some(call(
                Expr::global("Point"),
                vec![Expr::number(10.0), Expr::number(5.0)],
            )),
        ),
        Stmt::var("m", Some(Expr::get(Expr::global("p"), "sum"))),
        Stmt::print(call(Expr::global("m"), vec![])),
    ];
    session.run(&program).unwrap();
    assert_eq!(output.lines(), ["15"]);
}

#[test]
fn test_fields_shadow_methods() {
    let (mut session, output) = session();
    let program = [
        point_class(),
        Stmt::var(
            "p",
            Some(call(
                Expr::global("Point"),
                vec![Expr::number(1.0), Expr::number(1.0)],
            )),
        ),
        Stmt::expression(Expr::set(Expr::global("p"), "sum", Expr::string("field"))),
        Stmt::print(Expr::get(Expr::global("p"), "sum")),
    ];
    session.run(&program).unwrap();
    assert_eq!(output.lines(), ["field"]);
}

#[test]
fn test_inheritance_and_super() {
    // class A { method() { return "A"; } greet() { return "hi " + this.method(); } }
    // class B < A { method() { return "B"; } test() { return super.method(); } }
    let a = Stmt::class(
        "A",
        None,
        vec![
            FunctionDecl::new("method", &[], returns(Expr::string("A"))),
            FunctionDecl::new(
                "greet",
                &[],
                returns(Expr::binary(
                    BinaryOp::Add,
                    Expr::string("hi "),
                    method_call(Expr::this(1), "method", vec![]),
                )),
            ),
        ],
    );
    let b = Stmt::class(
        "B",
        Some(Expr::global("A")),
        vec![
            FunctionDecl::new("method", &[], returns(Expr::string("B"))),
            FunctionDecl::new(
                "test",
                &[],
                returns(call(Expr::super_method("method", 2), vec![])),
            ),
        ],
    );
    let (mut session, output) = session();
    let program = [
        a,
        b,
        Stmt::var("b", Some(call(Expr::global("B"), vec![]))),
        Stmt::print(method_call(Expr::global("b"), "greet", vec![])),
        Stmt::print(method_call(Expr::global("b"), "test", vec![])),
    ];
    session.run(&program).unwrap();
    assert_eq!(output.lines(), ["hi B", "A"]);
}

#[test]
fn test_subclass_inherits_initializer() {
    let (mut session, output) = session();
    let program = [
        point_class(),
        Stmt::class("Point3", Some(Expr::global("Point")), vec![]),
        Stmt::print(method_call(
            call(
                Expr::global("Point3"),
                vec![Expr::number(3.0), Expr::number(4.0)],
            ),
            "sum",
            vec![],
        )),
    ];
    session.run(&program).unwrap();
    assert_eq!(output.lines(), ["7"]);
}

#[test]
fn test_nested_function_captures_this() {
    // class Counter {
    //   init() { this.n = 0; }
    //   make() { fun inc() { this.n = this.n + 1; return this.n; } return inc; }
    // }
    // var f = Counter().make(); f(); print f();
    let init = FunctionDecl::new(
        "init",
        &[],
        vec![Stmt::expression(Expr::set(Expr::this(1), "n", Expr::number(0.0)))],
    );
    let make = FunctionDecl::new(
        "make",
        &[],
        vec![
            Stmt::function(
                "inc",
                &[],
                vec![
                    Stmt::expression(Expr::set(
                        Expr::this(2),
                        "n",
                        Expr::binary(
                            BinaryOp::Add,
                            Expr::get(Expr::this(2), "n"),
                            Expr::number(1.0),
                        ),
                    )),
                    Stmt::ret(Some(Expr::get(Expr::this(2), "n"))),
                ],
            ),
            Stmt::ret(Some(Expr::local("inc", 0))),
        ],
    );
    let (mut session, output) = session();
    let program = [
        Stmt::class("Counter", None, vec![init, make]),
        Stmt::var(
            "f",
            Some(method_call(
                call(Expr::global("Counter"), vec![]),
                "make",
                vec![],
            )),
        ),
        Stmt::expression(call(Expr::global("f"), vec![])),
        Stmt::print(call(Expr::global("f"), vec![])),
    ];
    session.run(&program).unwrap();
    assert_eq!(output.lines(), ["2"]);
}

#[test]
fn test_class_declared_inside_function() {
    // fun build() { class Local { get() { return 42; } } return Local(); }
    let build = Stmt::function(
        "build",
        &[],
        vec![
            Stmt::class(
                "Local",
                None,
                vec![FunctionDecl::new("get", &[], returns(Expr::number(42.0)))],
            ),
            Stmt::ret(Some(call(Expr::local("Local", 0), vec![]))),
        ],
    );
    let (mut session, output) = session();
    let program = [
        build,
        Stmt::print(method_call(call(Expr::global("build"), vec![]), "get", vec![])),
        Stmt::print(call(Expr::global("build"), vec![])),
    ];
    session.run(&program).unwrap();
    assert_eq!(output.lines(), ["42", "Local instance"]);
}

#[test]
fn test_invalid_superclass() {
    let (mut session, _) = session();
    let program = [
        Stmt::var("NotAClass", Some(Expr::string("nope"))),
        Stmt::class("D", Some(Expr::global("NotAClass")), vec![]),
    ];
    match session.run(&program) {
        Err(SessionError::Runtime(error)) => {
            assert_eq!(error.message, "Superclass must be a class.")
        }
        other => panic!("expected a runtime error, got {:?}", other),
    }
}

#[test]
fn test_class_without_initializer_takes_no_arguments() {
    let (mut session, _) = session();
    session
        .run(&[Stmt::class("Empty", None, vec![])])
        .unwrap();
    let error = session
        .evaluate(&call(Expr::global("Empty"), vec![Expr::number(1.0)]))
        .unwrap_err();
    assert_eq!(error.to_string(), "Expected 0 arguments but got 1.");
}
