//! language.rs — expression, statement, and scoping behavior
//!
//! End-to-end programs through the full pipeline, asserting on what they
//! print. Each case is a small self-contained script.

mod common;

use common::{run_expect, Harness};
use pretty_assertions::assert_eq;
use rstest::rstest;

// ============================================================================
// Expressions
// ============================================================================

#[rstest]
#[case("print 1 + 2 * 3;", "7\n")]
#[case("print (1 + 2) * 3;", "9\n")]
#[case("print 10 - 4 / 2;", "8\n")]
#[case("print -3 + 5;", "2\n")]
#[case("print 1 + 2 < 4;", "true\n")]
#[case("print 2 * 3 == 6;", "true\n")]
#[case("print 1 <= 1;", "true\n")]
#[case("print 2 >= 3;", "false\n")]
#[case("print 1 != 2;", "true\n")]
#[case("print !true;", "false\n")]
#[case("print !nil;", "true\n")]
fn operator_precedence_and_arithmetic(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(run_expect(source), expected);
}

#[test]
fn numbers_print_like_the_language_expects() {
    assert_eq!(run_expect("print 2.5;"), "2.5\n");
    assert_eq!(run_expect("print 4 / 2;"), "2\n");
    assert_eq!(run_expect("print 1 / 3;"), "0.3333333333333333\n");
}

#[test]
fn string_concatenation() {
    assert_eq!(run_expect("print \"foo\" + \"bar\";"), "foobar\n");
    assert_eq!(
        run_expect("var a = \"one\"; print a + \" \" + \"two\";"),
        "one two\n"
    );
}

#[test]
fn equality_semantics() {
    assert_eq!(run_expect("print nil == nil;"), "true\n");
    assert_eq!(run_expect("print 1 == true;"), "false\n");
    assert_eq!(run_expect("print \"a\" + \"b\" == \"ab\";"), "true\n");
    assert_eq!(run_expect("print nil == false;"), "false\n");
}

#[rstest]
#[case("print true and 7;", "7\n")]
#[case("print false and 7;", "false\n")]
#[case("print nil or \"fallback\";", "fallback\n")]
#[case("print 1 or 2;", "1\n")]
fn logical_operators_short_circuit_to_operand_values(
    #[case] source: &str,
    #[case] expected: &str,
) {
    assert_eq!(run_expect(source), expected);
}

#[test]
fn short_circuit_skips_side_effects() {
    let source = r#"
        fun shout() { print "called"; return true; }
        false and shout();
        true or shout();
        print "done";
    "#;
    assert_eq!(run_expect(source), "done\n");
}

// ============================================================================
// Control flow
// ============================================================================

#[test]
fn if_else_branches() {
    assert_eq!(
        run_expect("if (1 < 2) print \"yes\"; else print \"no\";"),
        "yes\n"
    );
    assert_eq!(
        run_expect("if (1 > 2) print \"yes\"; else print \"no\";"),
        "no\n"
    );
}

#[test]
fn while_loop_counts() {
    let source = r#"
        var i = 0;
        while (i < 3) {
            print i;
            i = i + 1;
        }
    "#;
    assert_eq!(run_expect(source), "0\n1\n2\n");
}

#[test]
fn for_loop_accumulates() {
    let source = "var x = 0; for (var i = 0; i < 3; i = i + 1) x = x + i; print x;";
    assert_eq!(run_expect(source), "3\n");
}

#[test]
fn for_loop_clauses_are_optional() {
    let source = r#"
        var i = 0;
        for (; i < 2;) {
            print i;
            i = i + 1;
        }
    "#;
    assert_eq!(run_expect(source), "0\n1\n");
}

// ============================================================================
// Variables and scope
// ============================================================================

#[test]
fn block_scoping_shadows_and_restores() {
    let source = r#"
        var a = "outer";
        {
            var a = "inner";
            print a;
        }
        print a;
    "#;
    assert_eq!(run_expect(source), "inner\nouter\n");
}

#[test]
fn uninitialized_variables_are_nil() {
    assert_eq!(run_expect("var a; print a;"), "nil\n");
}

#[test]
fn assignment_is_an_expression() {
    assert_eq!(run_expect("var a = 1; print a = 2;"), "2\n");
}

#[test]
fn globals_persist_across_interpret_calls() {
    let mut harness = Harness::new();
    harness.run("var counter = 10;").unwrap();
    harness.run("counter = counter + 1;").unwrap();
    harness.run("print counter;").unwrap();
    assert_eq!(harness.output(), "11\n");
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn functions_return_values() {
    let source = r#"
        fun add(a, b) { return a + b; }
        print add(1, 2);
    "#;
    assert_eq!(run_expect(source), "3\n");
}

#[test]
fn functions_without_return_produce_nil() {
    let source = r#"
        fun noop() {}
        print noop();
    "#;
    assert_eq!(run_expect(source), "nil\n");
}

#[test]
fn recursion_works() {
    let source = r#"
        fun fib(n) {
            if (n < 2) return n;
            return fib(n - 2) + fib(n - 1);
        }
        print fib(10);
    "#;
    assert_eq!(run_expect(source), "55\n");
}

#[test]
fn functions_print_by_name() {
    let source = r#"
        fun greet() {}
        print greet;
        print clock;
    "#;
    assert_eq!(run_expect(source), "<fn greet>\n<native fn>\n");
}

#[test]
fn clock_native_returns_a_number() {
    let source = r#"
        var t = clock();
        print t >= 0;
    "#;
    assert_eq!(run_expect(source), "true\n");
}

// ============================================================================
// Machine invariants
// ============================================================================

#[test]
fn stack_is_empty_after_a_successful_program() {
    let mut harness = Harness::new();
    harness
        .run("fun f(n) { if (n < 1) return 0; return f(n - 1); } print f(30);")
        .unwrap();
    assert_eq!(harness.laurel.vm().stack_depth(), 0);
    assert_eq!(harness.laurel.vm().frame_depth(), 0);
}

#[test]
fn runtime_errors_leave_no_frames_behind() {
    let mut harness = Harness::new();
    assert!(harness.run("fun f() { return 1 + nil; } f();").is_err());
    assert_eq!(harness.laurel.vm().frame_depth(), 0);
    assert_eq!(harness.laurel.vm().stack_depth(), 0);

    // The same instance keeps working
    harness.run("print \"recovered\";").unwrap();
    assert_eq!(harness.output(), "recovered\n");
}
