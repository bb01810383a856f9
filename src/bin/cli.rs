use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process;

use clap::{CommandFactory, Parser as ClapParser};
use tokio::io::AsyncRead;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use ndjson_ingest::{
    Document, HandlerError, IngestConfig, IngestLimits, IngestRequest, Ingestor, NDJSON, Reply,
    format_debug, format_json, format_status_line,
};

/// ndjson-ingest CLI — validate and ingest a JSON or NDJSON body.
///
/// Reads a request body from a file, --raw string, or stdin, runs it
/// through the ingestion engine under the given Content-Type and limits,
/// and prints the resulting reply.
///
/// Escape sequences (\r, \n, \t, \\) in the --raw value are interpreted so
/// you can pass a whole NDJSON stream as a single shell argument.
///
/// Limits default to ndjson-ingest.{toml,json,yaml} in the working
/// directory and NDJSON_INGEST_MAX_SIZE / NDJSON_INGEST_MAX_DOCUMENTS,
/// and are overridden by the flags below.
#[derive(ClapParser)]
#[command(name = "ndjson-ingest-cli", version, about, long_about = None)]
struct Cli {
    /// Path to a file containing the request body.
    /// Reads from stdin when neither FILE nor --raw is given.
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Raw body string (escape sequences \r \n \t \\ are expanded).
    #[arg(long)]
    raw: Option<String>,

    /// Declared Content-Type of the body.
    #[arg(short = 't', long, default_value = NDJSON)]
    content_type: String,

    /// Output format.
    #[arg(short, long, default_value = "json", value_enum)]
    format: OutputFormat,

    /// Pretty-print JSON output (ignored for other formats).
    #[arg(short, long)]
    pretty: bool,

    /// Write every accepted document to stdout as compact NDJSON.
    #[arg(long)]
    echo: bool,

    /// Maximum allowed body size in bytes.
    #[arg(long)]
    max_size: Option<usize>,

    /// Maximum number of documents accepted from a stream.
    #[arg(long)]
    max_documents: Option<usize>,

    /// Log output format (logs go to stderr; filter with RUST_LOG).
    #[arg(long, default_value = "pretty", value_enum)]
    log_format: LogFormat,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OutputFormat {
    /// Outcome summary as JSON
    Json,
    /// Human-readable reply
    Debug,
    /// Status line only
    Status,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum LogFormat {
    Pretty,
    Json,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_format);

    // When no input source is provided and stdin is a terminal (not piped),
    // show help instead of blocking.
    if cli.file.is_none() && cli.raw.is_none() && std::io::stdin().is_terminal() {
        Cli::command().print_help().ok();
        println!();
        process::exit(0);
    }

    let config = match build_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            process::exit(1);
        }
    };

    let body = match open_input(&cli).await {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error reading input: {e}");
            process::exit(1);
        }
    };

    let request = IngestRequest::new(body).with_content_type(cli.content_type.as_str());
    let outcome = Ingestor::new(config).ingest(request).await;
    let reply = Reply::from_outcome(&outcome);

    let output = match cli.format {
        OutputFormat::Json => format!("{}\n", format_json(&outcome, cli.pretty)),
        OutputFormat::Debug => format_debug(&reply),
        OutputFormat::Status => format_status_line(&reply),
    };

    print!("{output}");

    if reply.status() >= 400 {
        process::exit(2);
    }
}

/// Layer limits: defaults, then config file / environment, then flags.
fn build_config(cli: &Cli) -> Result<IngestConfig, ndjson_ingest::ConfigError> {
    let loaded = IngestLimits::load()?;
    let limits = IngestLimits {
        max_size: cli.max_size.unwrap_or(loaded.max_size),
        max_documents: cli.max_documents.unwrap_or(loaded.max_documents),
    };

    let echo = cli.echo;
    IngestConfig::builder()
        .document_handler(move |doc: Document| async move {
            if echo {
                writeln!(std::io::stdout(), "{doc}")?;
            }
            Ok::<(), HandlerError>(())
        })
        .limits(limits)
        .build()
}

/// Open the body from --raw, a file, or stdin.
async fn open_input(cli: &Cli) -> std::io::Result<Box<dyn AsyncRead + Unpin + Send>> {
    if let Some(raw) = &cli.raw {
        return Ok(Box::new(std::io::Cursor::new(unescape(raw).into_bytes())));
    }
    match &cli.file {
        Some(path) => Ok(Box::new(tokio::fs::File::open(path).await?)),
        None => Ok(Box::new(tokio::io::stdin())),
    }
}

fn init_logging(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
    }
}

/// Expand C-style escape sequences (`\r`, `\n`, `\t`, `\\`) in a string.
///
/// Any other `\X` sequence is kept as-is (both the backslash and `X`).
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('r') => out.push('\r'),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}
