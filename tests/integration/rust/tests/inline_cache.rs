//! Hidden classes and property inline caches observed end to end
//!
//! Checks that objects built with the same field order share a shape, that
//! different orders produce different shapes, and that a property site keeps
//! returning correct values while the shapes flowing through it change.

use ast::{BinaryOp, Expr, Stmt};
use integration_tests::session;

fn call(callee: &str, arguments: Vec<Expr>) -> Expr {
    Expr::call(Expr::global(callee), arguments)
}

fn set(object: &str, field: &str, value: f64) -> Stmt {
    Stmt::expression(Expr::set(Expr::global(object), field, Expr::number(value)))
}

/// class P {} plus `a` built as (x, y) and `b` built as (y, x).
fn two_layouts() -> Vec<Stmt> {
    vec![
        Stmt::class("P", None, vec![]),
        Stmt::var("a", Some(call("P", vec![]))),
        set("a", "x", 1.0),
        set("a", "y", 2.0),
        Stmt::var("b", Some(call("P", vec![]))),
        set("b", "y", 3.0),
        set("b", "x", 4.0),
    ]
}

#[test]
fn test_field_order_determines_shape() {
    let (mut session, _) = session();
    let before = session.runtime().shape_count();
    session.run(&two_layouts()).unwrap();
    // root -> x -> xy and root -> y -> yx
    assert_eq!(session.runtime().shape_count(), before + 4);

    // A third object built as (x, y) reuses the existing transitions.
    session
        .run(&[
            Stmt::var("c", Some(call("P", vec![]))),
            set("c", "x", 5.0),
            set("c", "y", 6.0),
        ])
        .unwrap();
    assert_eq!(session.runtime().shape_count(), before + 4);
}

#[test]
fn test_site_survives_shape_changes() {
    // fun getx(o) { return o.x; }
    // print getx(a); print getx(a); print getx(b); print getx(a);
    let (mut session, output) = session();
    let mut program = two_layouts();
    program.push(Stmt::function(
        "getx",
        &["o"],
        vec![Stmt::ret(Some(Expr::get(Expr::local("o", 0), "x")))],
    ));
    for object in ["a", "a", "b", "a"] {
        program.push(Stmt::print(call("getx", vec![Expr::global(object)])));
    }
    session.run(&program).unwrap();
    assert_eq!(output.lines(), ["1", "1", "4", "1"]);

    let stats = session.cache_stats();
    assert_eq!(stats.get_hits, 1);
    assert_eq!(stats.get_misses, 3);
    // Refreshed on the first miss and on every shape switch after it.
    assert_eq!(stats.cache_updates, 3);
}

#[test]
fn test_monomorphic_loop_hits_after_first_iteration() {
    // var i = 0; var total = 0;
    // while (i < 10) { total = total + a.y; a.x = i; i = i + 1; }
    let (mut session, _) = session();
    let mut program = two_layouts();
    program.extend([
        Stmt::var("i", Some(Expr::number(0.0))),
        Stmt::var("total", Some(Expr::number(0.0))),
        Stmt::while_loop(
            Expr::binary(BinaryOp::Less, Expr::global("i"), Expr::number(10.0)),
            Stmt::block(vec![
                Stmt::expression(Expr::assign_global(
                    "total",
                    Expr::binary(
                        BinaryOp::Add,
                        Expr::global("total"),
                        Expr::get(Expr::global("a"), "y"),
                    ),
                )),
                Stmt::expression(Expr::set(Expr::global("a"), "x", Expr::global("i"))),
                Stmt::expression(Expr::assign_global(
                    "i",
                    Expr::binary(BinaryOp::Add, Expr::global("i"), Expr::number(1.0)),
                )),
            ]),
        ),
        Stmt::expression(Expr::get(Expr::global("a"), "x")),
    ]);
    let value = session.run(&program).unwrap();
    assert_eq!(value.as_number().unwrap(), 9.0);
    assert_eq!(
        session.global("total").unwrap().as_number().unwrap(),
        20.0
    );

    let stats = session.cache_stats();
    // Loop read: one miss then nine hits. Final read: one miss.
    assert_eq!(stats.get_hits, 9);
    assert_eq!(stats.get_misses, 2);
    // Loop write to an existing field: one miss then nine hits. The four
    // writes that added fields all missed.
    assert_eq!(stats.set_hits, 9);
    assert_eq!(stats.set_misses, 5);
    assert!(stats.hit_rate() > 0.5);
}

#[test]
fn test_reads_of_missing_fields_fail() {
    let (mut session, _) = session();
    session.run(&two_layouts()).unwrap();
    let error = session
        .evaluate(&Expr::get(Expr::global("a"), "z"))
        .unwrap_err();
    assert_eq!(error.to_string(), "Undefined property 'z'.");

    let error = session
        .evaluate(&Expr::get(Expr::number(1.0), "x"))
        .unwrap_err();
    assert_eq!(error.to_string(), "Only instances have properties.");

    let error = session
        .run(&[Stmt::expression(Expr::set(
            Expr::string("text"),
            "x",
            Expr::nil(),
        ))])
        .unwrap_err();
    assert_eq!(error.to_string(), "Only instances have fields.");
}
