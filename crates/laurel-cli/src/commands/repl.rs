//! Interactive REPL
//!
//! rustyline wraps the runtime's `ReplCore`; history persists in the user's
//! data directory.

use std::path::PathBuf;
use std::process::ExitCode;

use colored::Colorize;
use laurel_runtime::{ReplCore, VERSION};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// Run the interactive loop until EOF or `exit`
pub fn run_repl() -> anyhow::Result<ExitCode> {
    println!("Laurel {} — type 'exit' or Ctrl-D to quit", VERSION);

    let mut editor = DefaultEditor::new()?;
    let history_path = history_file();
    if let Some(ref path) = history_path {
        // Missing history is fine on first run
        let _ = editor.load_history(path);
    }

    let mut core = ReplCore::new();

    loop {
        match editor.readline("laurel> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input == "exit" {
                    break;
                }
                let _ = editor.add_history_entry(input);

                let result = core.eval(input);
                print!("{}", result.stdout);
                if let Some(error) = result.error {
                    eprintln!("{}", error.red());
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }

    if let Some(path) = history_path {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = editor.save_history(&path);
    }

    Ok(ExitCode::SUCCESS)
}

fn history_file() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("laurel").join("history.txt"))
}
