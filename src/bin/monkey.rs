//! Monkey interpreter command-line.
//!
//! When called without argument it greets the user and drops into an
//! interactive read-evaluate-print loop.
//!
//! When called with arguments, it evaluates the corresponding files in a
//! single interpreter session (so definitions are shared between files).

use std::env;
use std::fs;
use std::io;

use anyhow::Context;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use monkey::interpreter::Interpreter;

const PROMPT: &str = ">> ";

fn main() -> Result<(), anyhow::Error> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if !args.is_empty() {
        run_all_files(args)?;
    } else {
        run_prompt()?;
    }
    Ok(())
}

fn run_all_files(paths: Vec<String>) -> Result<(), anyhow::Error> {
    let mut interp_stdout = io::stdout();
    let mut interp = Interpreter::new(&mut interp_stdout);

    for p in &paths {
        let source = fs::read_to_string(p).with_context(|| format!("failed to read {}", p))?;
        interp.eval(&source)?;
    }

    Ok(())
}

fn run_prompt() -> Result<(), anyhow::Error> {
    let user = env::var("USER").unwrap_or_else(|_| "there".to_string());
    println!("Hello {}! This is the Monkey programming language!", user);
    println!("Feel free to type in commands");

    let mut rl = DefaultEditor::new()?;
    let mut interp_stdout = io::stdout();
    let mut interp = Interpreter::new(&mut interp_stdout);

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());
                match interp.eval(&line) {
                    Ok(obj) => println!("{}", obj),
                    Err(e) => println!("{}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
