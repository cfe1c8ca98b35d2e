//! Laurel command-line interface
//!
//! `laurel` with no arguments starts the REPL; with a script path it runs
//! the file. Exit codes follow sysexits: 65 for compile errors, 70 for
//! runtime errors.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "laurel",
    version,
    about = "The Laurel scripting language",
    long_about = None
)]
struct Cli {
    /// Script to run; omit to start the REPL
    script: Option<PathBuf>,

    /// Print the compiled bytecode instead of executing
    #[arg(long)]
    disasm: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.script {
        Some(path) => commands::run::run_file(&path, cli.disasm),
        None => commands::repl::run_repl(),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
