//! Embedding facade
//!
//! [`Laurel`] owns one VM and drives the compile-then-execute pipeline.
//! Globals persist across `interpret` calls, so a REPL session is just
//! repeated calls on one instance; tests construct as many independent
//! instances as they need.

use std::cell::RefCell;
use std::fmt;
use std::io;
use std::rc::Rc;
use std::time::Instant;

use crate::compiler::compile;
use crate::diagnostic::Diagnostic;
use crate::object::ObjRef;
use crate::value::Value;
use crate::vm::{OutputHandle, RuntimeError, Vm};

/// Why a program failed
#[derive(Debug, Clone, PartialEq)]
pub enum LaurelError {
    /// One or more compile errors; nothing was executed
    Compile(Vec<Diagnostic>),
    /// Execution failed; carries the rendered stack trace, innermost frame
    /// first
    Runtime {
        error: RuntimeError,
        trace: Vec<String>,
    },
}

impl LaurelError {
    /// Conventional sysexits code: 65 for compile errors, 70 for runtime
    /// errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            LaurelError::Compile(_) => 65,
            LaurelError::Runtime { .. } => 70,
        }
    }
}

impl fmt::Display for LaurelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaurelError::Compile(diagnostics) => {
                let mut first = true;
                for diagnostic in diagnostics {
                    if !first {
                        writeln!(f)?;
                    }
                    write!(f, "{}", diagnostic)?;
                    first = false;
                }
                Ok(())
            }
            LaurelError::Runtime { error, trace } => {
                write!(f, "{}", error)?;
                for line in trace {
                    write!(f, "\n{}", line)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for LaurelError {}

/// An interpreter instance: VM state plus the standard natives
pub struct Laurel {
    vm: Vm,
}

impl Laurel {
    /// Create an interpreter printing to stdout
    pub fn new() -> Self {
        Self::with_output(Rc::new(RefCell::new(io::stdout())))
    }

    /// Create an interpreter printing to the given writer
    pub fn with_output(output: OutputHandle) -> Self {
        let mut vm = Vm::new(output);
        let start = Instant::now();
        vm.define_native("clock", 0, move |_args| {
            Ok(Value::Number(start.elapsed().as_secs_f64()))
        })
        .expect("registering natives on an empty stack cannot overflow");
        Self { vm }
    }

    /// Compile and execute `source`. Globals survive into the next call;
    /// after a runtime error the execution state is reset but globals and
    /// the heap are kept.
    pub fn interpret(&mut self, source: &str) -> Result<(), LaurelError> {
        let script = compile(source, self.vm.heap_mut()).map_err(LaurelError::Compile)?;
        match self.vm.run_script(script) {
            Ok(()) => Ok(()),
            Err(error) => {
                let trace = self.vm.stack_trace();
                self.vm.reset();
                Err(LaurelError::Runtime { error, trace })
            }
        }
    }

    /// Compile without executing; returns the top-level script function
    /// (used by `--disasm`).
    pub fn compile_only(&mut self, source: &str) -> Result<ObjRef, LaurelError> {
        compile(source, self.vm.heap_mut()).map_err(LaurelError::Compile)
    }

    /// Register a host function callable from the language
    pub fn define_native(
        &mut self,
        name: &str,
        arity: u8,
        function: impl Fn(&[Value]) -> Result<Value, String> + 'static,
    ) {
        self.vm
            .define_native(name, arity, function)
            .expect("registering natives on an empty stack cannot overflow");
    }

    /// The underlying VM, for inspection
    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    pub fn vm_mut(&mut self) -> &mut Vm {
        &mut self.vm
    }
}

impl Default for Laurel {
    fn default() -> Self {
        Self::new()
    }
}
