//! Run a script file

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use laurel_runtime::{disassemble_program, Laurel};

/// Execute (or with `disasm`, just compile and dump) a script file.
///
/// Error reports go to stderr; the returned exit code distinguishes compile
/// errors (65) from runtime errors (70).
pub fn run_file(path: &Path, disasm: bool) -> anyhow::Result<ExitCode> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;

    let mut laurel = Laurel::new();

    if disasm {
        return match laurel.compile_only(&source) {
            Ok(script) => {
                print!("{}", disassemble_program(script, laurel.vm().heap()));
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => {
                eprintln!("{err}");
                Ok(ExitCode::from(err.exit_code() as u8))
            }
        };
    }

    match laurel.interpret(&source) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            eprintln!("{err}");
            Ok(ExitCode::from(err.exit_code() as u8))
        }
    }
}
