#[cfg(test)]
mod ast_printer;
mod expr;
mod interpreter;
mod lox_callable;
mod lox_class;
mod lox_function;
mod lox_instance;
mod native;
mod object;
mod parser;
mod scanner;
mod stmt;
mod token;
mod token_type;

use std::{env, fs::File, path::Path};

use interpreter::{Interpreter, resolver::Resolver};
use object::Object;
use parser::Parser;
use scanner::Scanner;
use snafu::prelude::*;
use tracing::{instrument, level_filters::LevelFilter, trace};
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{token::Token, token_type::TokenType};

fn main() {
    init_tracing();
    let args: Vec<String> = env::args().collect();
    let mut lox = Lox::new();
    let code = match args.len() {
        len if len > 2 => {
            println!("Usage: treelox [script]");
            64
        }
        2 => lox.run_file(&args[1]),
        _ => lox.run_prompt(),
    };
    std::process::exit(code);
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());
    let mut layers = Vec::new();
    // Diagnostics meant for the user go through eprintln, so the live layer
    // writes to stderr as well and stdout stays clean for `print`
    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_line_number(true)
        .compact()
        .with_filter(filter)
        .boxed();
    layers.push(stderr);

    if std::fs::create_dir_all("./logs").is_ok() {
        if let Ok(file) = File::create("./logs/log.json") {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(file)
                .json()
                .with_span_list(false)
                .flatten_event(true)
                .with_current_span(false)
                .with_filter(LevelFilter::TRACE)
                .boxed();
            layers.push(file_layer);
        }
    }

    tracing_subscriber::Registry::default().with(layers).init();
}

struct Lox {
    had_error: bool,
    had_runtime_error: bool,
    interpreter: Interpreter,
}

impl Lox {
    pub fn new() -> Lox {
        Self {
            had_error: false,
            had_runtime_error: false,
            interpreter: Interpreter::new(),
        }
    }

    pub fn run_file<T: AsRef<Path> + Into<String>>(&mut self, script_path: T) -> i32 {
        let file = std::fs::read_to_string(&script_path)
            .context(FileSnafu { path: script_path.into() })
            .expect("Cannot read file");

        match self.run(file) {
            Ok(_) => 0,
            Err(_) if self.had_error => 65,
            Err(_) if self.had_runtime_error => 70,
            Err(e) => {
                eprintln!("{e}");
                70
            }
        }
    }

    pub fn run_prompt(&mut self) -> i32 {
        let mut rl = rustyline::DefaultEditor::new().expect("Could not build REPL");
        self.interpreter.repl = true;
        loop {
            match rl.readline("> ") {
                Err(_) => return 0,
                Ok(line) => {
                    let _ = rl.add_history_entry(&line);
                    let _ = self.run(line);
                    // The REPL soldiers on after any kind of error
                    self.had_error = false;
                    self.had_runtime_error = false;
                }
            }
        }
    }

    #[instrument(skip(self, script))]
    fn run(&mut self, script: String) -> Result<()> {
        let scanner = Scanner::new(script);
        let tokens = scanner.scan_tokens().inspect_err(|_| {
            self.had_error = true;
        })?;
        let mut parser = Parser::new(tokens);
        let (statements, parse_failed) = parser.parse();
        if parse_failed {
            self.had_error = true;
        }

        // The resolver still runs over whatever statements were salvaged;
        // only evaluation is gated on a clean parse.
        let mut resolver = Resolver::new(&mut self.interpreter);
        trace!("Resolving vars");
        let resolved = resolver.resolve_all(&statements);
        if resolved.is_err() {
            self.had_error = true;
        }
        if self.had_error {
            // Diagnostics were already printed as they were found
            return resolved.and(Err(LoxError::Fatal));
        }

        self.interpreter.interpret(statements).inspect_err(|e| {
            self.had_runtime_error = true;
            eprintln!("{e}");
        })?;
        Ok(())
    }
}

#[derive(Debug, Snafu)]
pub enum LoxError {
    #[snafu(display("[line {line}] Error {whence}: {message}"))]
    Parsing { line: usize, whence: String, message: String },
    #[snafu(display("IO error"))]
    Io { source: std::io::Error },
    #[snafu(display("Could not read source file at '{path}'"))]
    File { source: std::io::Error, path: String },
    #[snafu(display("Fatal error, exiting"))]
    Fatal,
    #[snafu(display("{message}\n[line {}]", line.unwrap_or(0)))]
    Runtime { message: String, line: Option<usize> },
    #[snafu(display("Internal error: {message}"))]
    Internal { message: String },
    #[snafu()]
    Return { value: Object },
    #[snafu(whatever, display("Static analysis failed: {message}"))]
    Resolver {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

impl LoxError {
    /// A compile-time diagnostic pointing at a token.
    pub fn at_token(token: &Token, message: &str) -> LoxError {
        let message = message.to_string();
        match token.typ {
            TokenType::Eof => LoxError::Parsing {
                line: token.line,
                whence: "at end".to_string(),
                message,
            },
            _ => LoxError::Parsing {
                line: token.line,
                whence: format!("at '{}'", token.lexeme),
                message,
            },
        }
    }

    /// Attach a call-site line to a runtime error that couldn't name one,
    /// leaving already-located errors alone.
    pub fn add_line(self, line: usize) -> LoxError {
        match self {
            LoxError::Runtime { message, line: None } => LoxError::Runtime {
                message,
                line: Some(line),
            },
            other => other,
        }
    }
}

type Result<T> = std::result::Result<T, LoxError>;
