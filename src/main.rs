use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::collections::HashMap;
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use termscript::{Engine, EngineOptions, ExecResult, ExecutionLimits, Value, WritebackMode};

const HISTORY_FILE: &str = ".termscript_history";

#[derive(Parser)]
#[command(name = "termscript")]
#[command(about = "A shell-flavoured command language for the terminal")]
#[command(version)]
struct Cli {
    /// Execute the script from command line argument
    #[arg(short = 'c')]
    script: Option<String>,

    /// Output results as JSON (stdout, stderr, exitCode, value)
    #[arg(long = "json")]
    json: bool,

    /// Every binary operator writes its result back into a variable left operand
    #[arg(long = "legacy-writeback")]
    legacy_writeback: bool,

    /// Maximum nesting depth of function calls
    #[arg(long = "max-call-depth")]
    max_call_depth: Option<u32>,

    /// Trace evaluation on stderr
    #[arg(long = "trace")]
    trace: bool,

    /// Bind a variable before running (NAME=VALUE, repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE")]
    set: Vec<String>,

    /// Script file to execute
    #[arg()]
    script_file: Option<String>,
}

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("+ [{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(trace: bool) {
    let level = match std::env::var("TERMSCRIPT_LOG") {
        Ok(value) => value.parse().unwrap_or(log::LevelFilter::Debug),
        Err(_) if trace => log::LevelFilter::Trace,
        Err(_) => return,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn parse_assignments(pairs: &[String]) -> Result<HashMap<String, String>, String> {
    let mut env = HashMap::new();
    for pair in pairs {
        match pair.split_once('=') {
            Some((name, value)) if !name.is_empty() => {
                env.insert(name.to_string(), value.to_string());
            }
            _ => return Err(format!("--set expects NAME=VALUE, got \"{}\"", pair)),
        }
    }
    Ok(env)
}

fn report(result: &ExecResult, json: bool, show_value: bool) {
    if json {
        match serde_json::to_string(result) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("termscript: cannot serialize result: {}", e),
        }
        return;
    }
    if !result.stdout.is_empty() {
        print!("{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        eprint!("{}", result.stderr);
    }
    if show_value && !matches!(result.value, Value::Null) {
        println!("{}", result.value);
    }
}

/// Run one input line; blank lines yield no exit code.
fn run_line(engine: &mut Engine, line: &str, json: bool, show_value: bool) -> Option<i32> {
    if line.trim().is_empty() {
        return None;
    }
    let result = engine.exec(line);
    report(&result, json, show_value);
    Some(result.exit_code)
}

fn history_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(HISTORY_FILE))
}

/// Interactive prompt with line editing and history.
fn run_repl(engine: &mut Engine, json: bool) -> i32 {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("termscript: cannot start line editor: {}", e);
            return 1;
        }
    };
    let history = history_path();
    if let Some(path) = &history {
        let _ = editor.load_history(path);
    }

    let mut exit_code = 0;
    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = editor.add_history_entry(line.as_str());
                }
                if let Some(code) = run_line(engine, &line, json, true) {
                    exit_code = code;
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("termscript: cannot read input: {}", e);
                exit_code = 1;
                break;
            }
        }
    }

    if let Some(path) = &history {
        if let Err(e) = editor.save_history(path) {
            log::debug!("history not saved path={} error={}", path.display(), e);
        }
    }
    exit_code
}

/// Read piped stdin line by line, running each in the same engine.
fn run_lines(engine: &mut Engine, json: bool) -> i32 {
    if std::io::stdin().is_terminal() {
        return run_repl(engine, json);
    }
    let mut exit_code = 0;
    for line in std::io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("termscript: cannot read input: {}", e);
                return 1;
            }
        };
        if let Some(code) = run_line(engine, &line, json, false) {
            exit_code = code;
        }
    }
    exit_code
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.trace);

    let env = match parse_assignments(&cli.set) {
        Ok(env) => env,
        Err(message) => {
            eprintln!("Error: {}", message);
            std::process::exit(2);
        }
    };

    let mut engine = Engine::new(EngineOptions {
        env: Some(env),
        limits: cli.max_call_depth.map(|max_call_depth| ExecutionLimits { max_call_depth }),
        writeback: if cli.legacy_writeback {
            WritebackMode::AllOperators
        } else {
            WritebackMode::AssignmentOnly
        },
        builtins: true,
    });

    // Determine script source: -c, file, or stdin lines
    let exit_code = if let Some(script) = cli.script {
        let result = engine.exec(&script);
        report(&result, cli.json, true);
        result.exit_code
    } else if let Some(ref file) = cli.script_file {
        match std::fs::read_to_string(file) {
            Ok(content) => {
                let result = engine.exec(&content);
                report(&result, cli.json, false);
                result.exit_code
            }
            Err(e) => {
                eprintln!("Error: Cannot read script file: {}: {}", file, e);
                1
            }
        }
    } else {
        run_lines(&mut engine, cli.json)
    };

    std::process::exit(exit_code);
}
