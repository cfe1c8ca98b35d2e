//! REPL core logic (UI-agnostic)
//!
//! Maintains persistent state across eval calls: globals and interned
//! strings survive, and errors do not reset declarations made earlier.
//! The CLI wraps this in a line editor; tests drive it directly.

use std::cell::RefCell;
use std::rc::Rc;

use crate::runtime::Laurel;
use crate::vm::OutputHandle;

/// Result of evaluating one REPL input
pub struct ReplResult {
    /// Everything the program printed
    pub stdout: String,
    /// Rendered error report, if the input failed
    pub error: Option<String>,
}

impl ReplResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// REPL core state
pub struct ReplCore {
    laurel: Laurel,
    buffer: Rc<RefCell<Vec<u8>>>,
}

impl ReplCore {
    pub fn new() -> Self {
        let buffer = Rc::new(RefCell::new(Vec::new()));
        let output: OutputHandle = buffer.clone();
        Self {
            laurel: Laurel::with_output(output),
            buffer,
        }
    }

    /// Evaluate one input line (or block) and capture what it printed
    pub fn eval(&mut self, source: &str) -> ReplResult {
        let status = self.laurel.interpret(source);
        let stdout = String::from_utf8_lossy(&self.buffer.borrow()).into_owned();
        self.buffer.borrow_mut().clear();
        ReplResult {
            stdout,
            error: status.err().map(|error| error.to_string()),
        }
    }
}

impl Default for ReplCore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globals_persist_across_inputs() {
        let mut repl = ReplCore::new();
        assert!(repl.eval("var greeting = \"hi\";").is_ok());
        let result = repl.eval("print greeting;");
        assert_eq!(result.stdout, "hi\n");
    }

    #[test]
    fn errors_do_not_reset_state() {
        let mut repl = ReplCore::new();
        repl.eval("var x = 1;");
        let failed = repl.eval("undefined_thing;");
        assert!(failed.error.is_some());
        let result = repl.eval("print x;");
        assert_eq!(result.stdout, "1\n");
    }

    #[test]
    fn compile_errors_are_rendered() {
        let mut repl = ReplCore::new();
        let result = repl.eval("var = 3;");
        let error = result.error.expect("compile error expected");
        assert!(error.contains("Expect variable name."));
    }
}
