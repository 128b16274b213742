// Iskra REPL - Read-Eval-Print Driver
//
// Surfaced conditions are described with their class and slots. An
// escape reaching the driver has no live establisher, which is a
// control-error by definition.

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use iskra::conditions::Signal;
use iskra::env::Environment;
use iskra::eval::Interpreter;
use iskra::primitives::register_primitives;
use iskra::printer::{describe_condition, print_to_string};
use iskra::reader;

fn main() -> rustyline::Result<()> {
    env_logger::init();

    let mut interp = Interpreter::new();
    register_primitives(&mut interp);
    let env = Environment::new();

    // With file arguments, evaluate them instead of entering the REPL
    let files: Vec<String> = std::env::args().skip(1).collect();
    if !files.is_empty() {
        for path in files {
            let source = std::fs::read_to_string(&path)?;
            run_source(&mut interp, &env, &source);
        }
        return Ok(());
    }

    println!("Iskra 0.1.0 - an ISLISP-style evaluation core");
    println!("Type Ctrl-D to exit");
    println!();

    let mut rl = DefaultEditor::new()?;
    loop {
        match rl.readline("iskra> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());
                run_source(&mut interp, &env, &line);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("error: {}", err);
                break;
            }
        }
    }
    Ok(())
}

fn run_source(interp: &mut Interpreter, env: &Environment, source: &str) {
    let forms = match reader::read_all(interp, source) {
        Ok(forms) => forms,
        Err(err) => {
            eprintln!("parse error: {}", err);
            return;
        }
    };
    for form in forms {
        match interp.eval(env, form) {
            Ok(value) => println!("{}", print_to_string(interp, value)),
            Err(Signal::Condition(c)) => {
                eprintln!("condition: {}", describe_condition(interp, c));
            }
            Err(Signal::Escape { .. }) => {
                if let Signal::Condition(c) = interp.control_error() {
                    eprintln!("condition: {}", describe_condition(interp, c));
                }
            }
        }
    }
}
