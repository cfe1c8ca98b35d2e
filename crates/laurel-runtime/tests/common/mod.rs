//! Test helpers shared by the integration suites

use std::cell::RefCell;
use std::rc::Rc;

use laurel_runtime::vm::OutputHandle;
use laurel_runtime::{Laurel, LaurelError};

/// An interpreter whose `print` output lands in a buffer we can read back
pub struct Harness {
    pub laurel: Laurel,
    buffer: Rc<RefCell<Vec<u8>>>,
}

impl Harness {
    pub fn new() -> Self {
        let buffer = Rc::new(RefCell::new(Vec::new()));
        let output: OutputHandle = buffer.clone();
        Self {
            laurel: Laurel::with_output(output),
            buffer,
        }
    }

    pub fn run(&mut self, source: &str) -> Result<(), LaurelError> {
        self.laurel.interpret(source)
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.borrow()).into_owned()
    }
}

/// Run a program and return everything it printed; panics on any error.
pub fn run_expect(source: &str) -> String {
    let mut harness = Harness::new();
    if let Err(err) = harness.run(source) {
        panic!("program failed:\n{err}\nsource:\n{source}");
    }
    harness.output()
}

/// Run a program that must fail; returns the error.
pub fn run_err(source: &str) -> LaurelError {
    let mut harness = Harness::new();
    match harness.run(source) {
        Ok(()) => panic!("program unexpectedly succeeded:\n{source}"),
        Err(err) => err,
    }
}

/// The lines a failing program reports, rendered the way the CLI prints them
pub fn error_report(source: &str) -> String {
    run_err(source).to_string()
}
