//! End-to-end CLI tests

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn script(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".lr")
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write script");
    file
}

#[test]
fn runs_a_script_and_prints() {
    let file = script("print 1 + 2 * 3;");
    Command::cargo_bin("laurel")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout("7\n");
}

#[test]
fn compile_errors_exit_65() {
    let file = script("return 1;");
    Command::cargo_bin("laurel")
        .unwrap()
        .arg(file.path())
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Can't return from top-level code."));
}

#[test]
fn runtime_errors_exit_70_with_a_trace() {
    let file = script("var a; a();");
    Command::cargo_bin("laurel")
        .unwrap()
        .arg(file.path())
        .assert()
        .code(70)
        .stderr(predicate::str::contains("Can only call functions and classes."))
        .stderr(predicate::str::contains("in script"));
}

#[test]
fn missing_files_are_reported() {
    Command::cargo_bin("laurel")
        .unwrap()
        .arg("definitely/not/here.lr")
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not read"));
}

#[test]
fn disasm_dumps_bytecode_instead_of_running() {
    let file = script("fun twice(n) { return n * 2; } print twice(21);");
    Command::cargo_bin("laurel")
        .unwrap()
        .arg(file.path())
        .arg("--disasm")
        .assert()
        .success()
        .stdout(predicate::str::contains("== <script> =="))
        .stdout(predicate::str::contains("== <fn twice> =="))
        .stdout(predicate::str::contains("Multiply"))
        .stdout(predicate::str::contains("42").not());
}
