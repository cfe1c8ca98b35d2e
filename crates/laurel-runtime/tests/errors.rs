//! errors.rs — compile and runtime error reporting

mod common;

use common::{error_report, run_err, Harness};
use laurel_runtime::{LaurelError, RuntimeError};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn compile_messages(source: &str) -> Vec<String> {
    match run_err(source) {
        LaurelError::Compile(diagnostics) => {
            diagnostics.iter().map(|d| d.message.clone()).collect()
        }
        LaurelError::Runtime { error, .. } => {
            panic!("expected compile error, got runtime error: {error}")
        }
    }
}

fn runtime_error(source: &str) -> RuntimeError {
    match run_err(source) {
        LaurelError::Runtime { error, .. } => error,
        LaurelError::Compile(diagnostics) => {
            panic!("expected runtime error, got compile errors: {diagnostics:?}")
        }
    }
}

// ============================================================================
// Compile errors
// ============================================================================

#[rstest]
#[case("return 1;", "Can't return from top-level code.")]
#[case("a * b = c;", "Invalid assignment target.")]
#[case("print 1", "Expect ';' after value.")]
#[case("var 3 = 4;", "Expect variable name.")]
#[case("{ var a = a; }", "Can't read local variable in its own initializer.")]
#[case("{ var a = 1; var a = 2; }", "Already a variable with this name in this scope.")]
#[case("print this;", "Can't use 'this' outside of a class.")]
#[case("print super.m;", "Can't use 'super' outside of a class.")]
#[case(
    "class A { m() { return super.m(); } }",
    "Can't use 'super' in a class with no superclass."
)]
#[case("class A < A {}", "A class can't inherit from itself.")]
#[case(
    "class P { init() { return 1; } }",
    "Can't return a value from an initializer."
)]
#[case("print;", "Expect expression.")]
fn compile_errors_are_reported(#[case] source: &str, #[case] expected: &str) {
    let messages = compile_messages(source);
    assert!(
        messages.iter().any(|m| m == expected),
        "wanted {expected:?} in {messages:?}"
    );
}

#[test]
fn diagnostics_carry_line_and_token() {
    let report = error_report("var a = 1;\nreturn a;");
    assert_eq!(report, "[line 2] Error at 'return': Can't return from top-level code.");
}

#[test]
fn errors_at_end_of_input_say_so() {
    let report = error_report("print 1");
    assert_eq!(report, "[line 1] Error at end: Expect ';' after value.");
}

#[test]
fn panic_mode_recovers_at_statement_boundaries() {
    // Both statements are bad; synchronization lets both get reported
    let messages = compile_messages("var 1 = 2;\nprint;");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0], "Expect variable name.");
    assert_eq!(messages[1], "Expect expression.");
}

#[test]
fn lexical_errors_surface_without_token_context() {
    let report = error_report("var a = @;");
    assert!(report.contains("Error: Unexpected character."));
}

// ============================================================================
// Runtime errors
// ============================================================================

#[test]
fn calling_a_non_callable_value() {
    assert_eq!(runtime_error("var a; a();"), RuntimeError::NotCallable);
    assert_eq!(runtime_error("\"text\"();"), RuntimeError::NotCallable);
    assert_eq!(runtime_error("123();"), RuntimeError::NotCallable);
}

#[test]
fn arity_is_checked() {
    let source = r#"
        fun two(a, b) {}
        two(1);
    "#;
    assert_eq!(
        runtime_error(source),
        RuntimeError::ArityMismatch { expected: 2, got: 1 }
    );
}

#[test]
fn argumentless_class_rejects_arguments() {
    assert_eq!(
        runtime_error("class Empty {} Empty(1);"),
        RuntimeError::ArityMismatch { expected: 0, got: 1 }
    );
}

#[rstest]
#[case("print 1 + nil;", RuntimeError::BadAddOperands)]
#[case("print \"a\" + 1;", RuntimeError::BadAddOperands)]
#[case("print 1 - \"a\";", RuntimeError::OperandsMustBeNumbers)]
#[case("print true < false;", RuntimeError::OperandsMustBeNumbers)]
#[case("print -\"oops\";", RuntimeError::OperandMustBeNumber)]
fn operand_type_errors(#[case] source: &str, #[case] expected: RuntimeError) {
    assert_eq!(runtime_error(source), expected);
}

#[test]
fn undefined_globals_are_runtime_errors() {
    assert_eq!(
        runtime_error("print missing;"),
        RuntimeError::UndefinedVariable("missing".to_string())
    );
    assert_eq!(
        runtime_error("missing = 1;"),
        RuntimeError::UndefinedVariable("missing".to_string())
    );
}

#[test]
fn undefined_properties_are_runtime_errors() {
    let source = r#"
        class Empty {}
        Empty().missing;
    "#;
    assert_eq!(
        runtime_error(source),
        RuntimeError::UndefinedProperty("missing".to_string())
    );
}

#[rstest]
#[case("true.field;", RuntimeError::PropertyOnNonInstance)]
#[case("123.field = 1;", RuntimeError::FieldOnNonInstance)]
#[case("\"text\".method();", RuntimeError::MethodOnNonInstance)]
fn property_access_requires_instances(#[case] source: &str, #[case] expected: RuntimeError) {
    assert_eq!(runtime_error(source), expected);
}

#[test]
fn inheriting_from_a_non_class_fails() {
    assert_eq!(
        runtime_error("var NotAClass = 7; class Sub < NotAClass {}"),
        RuntimeError::SuperclassNotClass
    );
}

#[test]
fn runaway_recursion_overflows_the_frame_stack() {
    assert_eq!(
        runtime_error("fun loop() { loop(); } loop();"),
        RuntimeError::StackOverflow
    );
}

#[test]
fn stack_traces_walk_frames_innermost_first() {
    let source = "fun inner() { return 1 + nil; }\nfun outer() { inner(); }\nouter();";
    let report = error_report(source);
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines[0], "Operands must be two numbers or two strings.");
    assert_eq!(lines[1], "[line 1] in inner()");
    assert_eq!(lines[2], "[line 2] in outer()");
    assert_eq!(lines[3], "[line 3] in script");
}

#[test]
fn output_before_the_error_is_kept() {
    let mut harness = Harness::new();
    let result = harness.run("print \"first\"; print 1 + nil;");
    assert!(result.is_err());
    assert_eq!(harness.output(), "first\n");
}
