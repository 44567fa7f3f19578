//! Purpose: `bodyguard` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs the server or the offline body check.
//! Invariants: `check` prints exactly one JSON envelope on stdout.
//! Invariants: Process errors are emitted as JSON on stderr (text on a TTY).
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::error::Error as StdError;
use std::fs::File;
use std::io::{self, BufReader, IsTerminal, Read};
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};
use serde_json::{Map, Value, json};

mod serve;

use bodyguard::api::{
    DEFAULT_MAX_BODY_BYTES, DecodeError, Envelope, Error, ErrorKind, decode, to_exit_code,
};

const CHECK_REJECTED_EXIT_CODE: i32 = 2;

#[derive(Parser)]
#[command(
    name = "bodyguard",
    version,
    about = "Strict JSON request-body decoding with client-safe errors",
    after_help = r#"EXAMPLES
  $ bodyguard serve --bind 127.0.0.1:4000
  $ curl -d '{"title":"Moana","year":2016,"runtime":107}' localhost:4000/v1/movies
  $ echo '{"a":1}{"a":2}' | bodyguard check
  {"error":"body must only contain a single JSON value"}"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Serve the demo movie API over HTTP (loopback by default)",
        after_help = r#"ROUTES
  GET  /v1/healthcheck
  POST /v1/movies          {"title": str, "year": int, "runtime": int, "genres": [str]}
  GET  /v1/movies/:id

NOTES
  - Request bodies are decoded strictly: unknown keys, trailing data and oversize bodies are 400s
  - Set RUST_LOG to adjust log verbosity (default: info)"#
    )]
    Serve {
        #[arg(long, default_value = "127.0.0.1:4000", help = "Address to bind")]
        bind: SocketAddr,
        #[arg(
            long,
            default_value_t = DEFAULT_MAX_BODY_BYTES,
            help = "Maximum request body size in bytes"
        )]
        max_body_bytes: u64,
        #[arg(long, help = "Allow binding to non-loopback addresses")]
        allow_non_loopback: bool,
    },
    #[command(
        about = "Check that a file (or stdin) holds exactly one JSON value within the size limit",
        after_help = r#"EXAMPLES
  $ bodyguard check payload.json
  $ bodyguard check --max-body-bytes 64 < payload.json

Prints {"ok":true} or {"error":"<message>"}; exits 2 when the body is rejected."#
    )]
    Check {
        #[arg(help = "Body file (default: stdin)", value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
        #[arg(
            long,
            default_value_t = DEFAULT_MAX_BODY_BYTES,
            help = "Maximum body size in bytes"
        )]
        max_body_bytes: u64,
    },
}

fn main() {
    let exit_code = match run() {
        Ok(code) => code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32, Error> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve {
            bind,
            max_body_bytes,
            allow_non_loopback,
        } => {
            let config = serve::ServeConfig {
                bind,
                max_body_bytes,
                allow_non_loopback,
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))?;
            Ok(0)
        }
        Command::Check {
            file,
            max_body_bytes,
        } => {
            if max_body_bytes == 0 {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("--max-body-bytes must be greater than zero")
                    .with_hint("Use a positive value like 1048576."));
            }
            let result = match file {
                Some(path) => {
                    let handle = File::open(&path).map_err(|err| {
                        let kind = if err.kind() == io::ErrorKind::NotFound {
                            ErrorKind::NotFound
                        } else {
                            ErrorKind::Io
                        };
                        Error::new(kind)
                            .with_message("failed to open body file")
                            .with_path(&path)
                            .with_source(err)
                    })?;
                    check_body(BufReader::new(handle), max_body_bytes)
                }
                None => check_body(BufReader::new(io::stdin().lock()), max_body_bytes),
            };
            emit_check_result(&result)?;
            Ok(if result.is_ok() {
                0
            } else {
                CHECK_REJECTED_EXIT_CODE
            })
        }
    }
}

fn check_body<R: Read>(reader: R, max_body_bytes: u64) -> Result<(), DecodeError> {
    decode::<Value, _>(reader, max_body_bytes).map(|_| ())
}

fn emit_check_result(result: &Result<(), DecodeError>) -> Result<(), Error> {
    let line = match result {
        Ok(()) => serde_json::to_string(&Envelope::new("ok", true)),
        Err(err) => serde_json::to_string(&Envelope::new("error", err.to_string())),
    }
    .map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode check result")
            .with_source(err)
    })?;
    println!("{line}");
    Ok(())
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("error: {}", error_message(err));
        if let Some(hint) = err.hint() {
            eprintln!("hint: {hint}");
        }
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}
