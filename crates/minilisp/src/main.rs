use std::fs::File;
use std::io::{self, BufReader, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use minilisp::{Interpreter, LispError, Value, DEFAULT_MAX_EVAL_DEPTH};

#[derive(Parser)]
#[command(name = "minilisp", version, about = "minilisp: a small Lisp with an eval/apply core")]
struct Cli {
    /// File to execute (`-` reads standard input)
    file: Option<PathBuf>,

    /// Evaluate an expression and print its result
    #[arg(short, long)]
    eval: Option<String>,

    /// Maximum nested evaluations before an expression is aborted
    #[arg(long, default_value_t = DEFAULT_MAX_EVAL_DEPTH)]
    max_depth: usize,

    /// Do not print results
    #[arg(short, long)]
    quiet: bool,

    /// Extra arguments, bound to `argv`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let interpreter = Interpreter::builder()
        .with_args(cli.args.iter().cloned())
        .with_max_depth(cli.max_depth)
        .build();

    if let Some(expr) = &cli.eval {
        return match interpreter.eval_str(expr) {
            Ok(val) => {
                show_result(&val, cli.quiet);
                ExitCode::SUCCESS
            }
            Err(e) => {
                report(&e);
                ExitCode::FAILURE
            }
        };
    }

    match cli.file.as_deref() {
        Some(path) if path != Path::new("-") => run_file(&interpreter, path),
        _ if io::stdin().is_terminal() => {
            repl(&interpreter, cli.quiet);
            ExitCode::SUCCESS
        }
        _ => run_stdin(&interpreter, cli.quiet),
    }
}

/// Log filter comes from `MINILISP_LOG`; warnings only by default.
fn init_logging() {
    let filter = EnvFilter::try_from_env("MINILISP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_file(interpreter: &Interpreter, path: &Path) -> ExitCode {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Error reading {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };
    match interpreter.run(BufReader::new(file), |_| {}) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprint!("In {}: ", path.display());
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn run_stdin(interpreter: &Interpreter, quiet: bool) -> ExitCode {
    let result = interpreter.run(io::stdin().lock(), |val| show_result(val, quiet));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

/// Every result is echoed, `()` included, unless `--quiet` was given.
fn result_line(val: &Value, quiet: bool) -> Option<String> {
    (!quiet).then(|| val.to_string())
}

fn show_result(val: &Value, quiet: bool) {
    if let Some(line) = result_line(val, quiet) {
        println!("{line}");
    }
}

fn report(e: &LispError) {
    eprintln!("Error: {e}");
    if let Some(hint) = e.hint() {
        eprintln!("  hint: {hint}");
    }
    if let Some(trace) = e.stack_trace() {
        eprint!("{trace}");
    }
}

fn repl(interpreter: &Interpreter, quiet: bool) {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Error: could not start line editor: {e}");
            return;
        }
    };
    let history_path = history_path();
    let _ = rl.load_history(&history_path);

    println!("minilisp {}", env!("CARGO_PKG_VERSION"));
    println!("Type ,help for help, ,quit to exit\n");

    let mut buffer = String::new();
    let mut in_multiline = false;

    loop {
        let prompt = if in_multiline { "     ... " } else { "minilisp> " };
        match rl.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();

                if !in_multiline {
                    match trimmed {
                        ",quit" | ",exit" | ",q" => break,
                        ",help" | ",h" => {
                            print_help();
                            continue;
                        }
                        ",env" => {
                            print_env(interpreter);
                            continue;
                        }
                        _ => {}
                    }
                }

                if in_multiline {
                    buffer.push('\n');
                    buffer.push_str(&line);
                } else {
                    buffer = line.clone();
                }

                if !is_balanced(&buffer) {
                    in_multiline = true;
                    continue;
                }

                in_multiline = false;
                let input = buffer.trim().to_string();
                buffer.clear();

                if input.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(&input);

                match interpreter.eval_str(&input) {
                    Ok(val) => show_result(&val, quiet),
                    Err(e) => report(&e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                if in_multiline {
                    buffer.clear();
                    in_multiline = false;
                    println!("^C");
                    continue;
                }
                break;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {e}");
                break;
            }
        }
    }

    if let Err(e) = rl.save_history(&history_path) {
        tracing::warn!(path = %history_path.display(), error = %e, "could not save history");
    }
}

/// True once every `(` outside a string literal has been closed. A backslash
/// only escapes inside strings, as in the reader.
fn is_balanced(input: &str) -> bool {
    let mut depth = 0usize;
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => loop {
                match chars.next() {
                    None => return false,
                    Some('"') => break,
                    Some('\\') => {
                        if chars.next().is_none() {
                            return false;
                        }
                    }
                    Some(_) => {}
                }
            },
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth == 0
}

fn print_help() {
    println!("minilisp REPL commands:");
    println!("  ,quit / ,q    Exit the REPL");
    println!("  ,help / ,h    Show this help");
    println!("  ,env          Show user-defined bindings");
    println!();
    println!("Built-ins:");
    println!("  {}", minilisp_eval::BUILTIN_NAMES.join(" "));
}

fn print_env(interpreter: &Interpreter) {
    let mut seen: Vec<String> = Vec::new();
    let mut bindings: Vec<(String, Value)> = Vec::new();
    for binding in interpreter.global_env().vars().iter() {
        let Some(cell) = binding.as_pair() else {
            continue;
        };
        let Some(name) = cell.head().as_symbol() else {
            continue;
        };
        let name = minilisp::resolve(name);
        if seen.contains(&name) {
            continue;
        }
        seen.push(name.clone());
        let builtin = minilisp_eval::BUILTIN_NAMES.contains(&name.as_str()) || name == "argv";
        if !builtin {
            bindings.push((name, cell.tail()));
        }
    }
    bindings.sort_by(|(a, _), (b, _)| a.cmp(b));
    if bindings.is_empty() {
        println!("(no user-defined bindings)");
    } else {
        for (name, val) in bindings {
            println!("  {name} = {val}");
        }
    }
}

fn history_path() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".minilisp_history")
}
