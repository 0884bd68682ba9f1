//! File-runner and line-buffered REPL over `seejs`, the two modes
//! `libsee/shell/shell.c` provides, grounded in the teacher's
//! `ouros-cli`/`ouros-repl` pair but folded into a single binary since
//! this engine's embedding shell is a demonstration, not a product.

use std::{
    env,
    io::{self, Write},
    process::ExitCode,
};

use seejs::{Interpreter, LimitedTracker, NoopTracer, Value};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let mut interp = new_interpreter();

    if let Some(path) = args.get(1) {
        run_file(&mut interp, path)
    } else {
        run_repl(&mut interp)
    }
}

fn new_interpreter() -> Interpreter {
    let mut interp = Interpreter::new(Box::new(LimitedTracker::default()), Box::new(NoopTracer));
    let _ = interp.install_global_function("print", 1, |interp, _this, args| {
        let mut out = String::new();
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(arg.to_js_string(interp)?.as_str());
        }
        println!("{out}");
        Ok(Value::Undefined)
    });
    interp
}

fn run_file(interp: &mut Interpreter, path: &str) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error reading {path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    match interp.global_eval(&source, path) {
        Ok(_) => ExitCode::SUCCESS,
        Err(exc) => {
            eprintln!("uncaught exception: {exc}");
            ExitCode::FAILURE
        }
    }
}

fn run_repl(interp: &mut Interpreter) -> ExitCode {
    let mut source = String::new();

    loop {
        let prompt = if source.is_empty() { "seejs> " } else { "...... " };
        let Some(line) = read_line(prompt) else {
            println!();
            return ExitCode::SUCCESS;
        };

        if source.is_empty() && line.trim().is_empty() {
            continue;
        }

        if !source.is_empty() {
            source.push('\n');
        }
        source.push_str(&line);

        if needs_more_input(&source) {
            continue;
        }

        match interp.global_eval(&source, "<stdin>") {
            Ok(value) => {
                if !matches!(value, Value::Undefined) {
                    println!("{value:?}");
                }
            }
            Err(exc) => eprintln!("{exc}"),
        }
        source.clear();
    }
}

/// Heuristic multiline detector: keeps reading while brackets are
/// unbalanced or the line ends with a continuation backslash. Exact ASI
/// disambiguation is the parser's job (spec §4.5) -- this is only meant to
/// avoid a confusing half-statement prompt in the common case.
fn needs_more_input(source: &str) -> bool {
    let trimmed = source.trim_end();
    if trimmed.ends_with('\\') {
        return true;
    }
    let mut balance = 0i32;
    for ch in trimmed.chars() {
        match ch {
            '(' | '[' | '{' => balance += 1,
            ')' | ']' | '}' => balance -= 1,
            _ => {}
        }
    }
    balance > 0
}

fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    if io::stdout().flush().is_err() {
        return None;
    }
    let mut input = String::new();
    let read = io::stdin().read_line(&mut input).ok()?;
    if read == 0 {
        return None;
    }
    Some(input.trim_end_matches(['\r', '\n']).to_owned())
}
