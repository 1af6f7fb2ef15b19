//! CLI binary for convertapi-cli.
//!
//! A thin shim over the library crate: maps flags to `ClientConfig`, reads a
//! piped path list, runs the conversion and turns the outcome into an exit
//! code (0 success, 1 local validation or write failure, 2 remote failure).

use anyhow::{Context, Result};
use clap::Parser;
use convertapi_cli::config::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use convertapi_cli::pipeline::input::read_path_list;
use convertapi_cli::{
    convert_args, ClientConfig, ConversionProgressCallback, ConvertApiError, ProgressCallback,
    EXIT_OK, EXIT_VALIDATION,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Prints one `File saved:` line per file, above a spinner when one is shown.
struct CliProgressCallback {
    bar: Option<ProgressBar>,
    bytes: AtomicU64,
}

impl CliProgressCallback {
    fn new(show_spinner: bool) -> Arc<Self> {
        let bar = show_spinner.then(|| {
            let bar = ProgressBar::new_spinner();
            let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
            bar.set_style(style);
            bar.set_prefix("Preparing");
            bar.set_message("Checking inputs…");
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        Arc::new(Self {
            bar,
            bytes: AtomicU64::new(0),
        })
    }

    fn line(&self, msg: String) {
        match self.bar {
            Some(ref bar) => bar.println(msg),
            None => eprintln!("{msg}"),
        }
    }

    fn clear(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_upload_start(&self, file_count: usize) {
        if let Some(ref bar) = self.bar {
            bar.set_prefix("Converting");
            bar.set_message(format!("uploading {file_count} file(s)…"));
        }
    }

    fn on_response(&self, status: u16) {
        if let Some(ref bar) = self.bar {
            bar.set_prefix("Receiving");
            bar.set_message(format!("HTTP {status}"));
        }
    }

    fn on_file_saved(&self, path: &Path, bytes: u64) {
        let total = self.bytes.fetch_add(bytes, Ordering::SeqCst) + bytes;
        if let Some(ref bar) = self.bar {
            bar.set_message(format!("{total} bytes written"));
        }
        self.line(format!("File saved: {}", path.display()));
    }

    fn on_conversion_complete(&self, saved: usize) {
        self.clear();
        if self.bar.is_some() {
            eprintln!(
                "{} {} file(s) saved",
                green("✔"),
                bold(&saved.to_string())
            );
        }
    }
}

const AFTER_HELP: &str = r#"ARGUMENTS:
  <api-token> <output> <input-files...> [from-format to-format] [key=value ...]

  <output> is a file path, or an existing directory that receives every
  returned file under its server-supplied name. Tokens containing '=' are
  conversion parameters. Parameters whose name ends in "File" are uploaded
  as files. StoreFile=true is not allowed.

  With up to two input files the formats are inferred from the extensions
  of the first input and of <output>. With more, the last two positional
  tokens are the source and target format.

EXAMPLES:
  # Single file, formats from extensions, FileName from the output name
  convertapi-cli $TOKEN report.pdf report.docx

  # Merge into a directory with explicit formats
  convertapi-cli $TOKEN out/ a.pdf b.pdf c.pdf pdf merge

  # Parameters and a file-valued parameter
  convertapi-cli $TOKEN out/ doc.pdf pdf watermark Text=Draft OverlayFile=logo.pdf

  # Web page, no input file
  convertapi-cli $TOKEN page.pdf "" web pdf Url=https://example.com

  # Paths piped on standard input, one per line
  ls *.png | convertapi-cli $TOKEN out/ png pdf

EXIT CODES:
  0  success
  1  invalid arguments, missing input, forbidden parameter, write failure
  2  API error, unexpected response, transport failure or timeout
"#;

/// Convert files with the ConvertAPI service.
#[derive(Parser, Debug)]
#[command(
    name = "convertapi-cli",
    version,
    about = "Convert files with the ConvertAPI service",
    long_about = "Upload one or more files to the ConvertAPI conversion service and save every \
file it returns. Flags must come before the positional tokens.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Service root URL.
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Timeout for the whole exchange, in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Ignore standard input even when it is redirected.
    #[arg(long)]
    no_stdin: bool,

    /// Print a JSON report (ConversionOutput) on stdout.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,

    /// <api-token> <output> <input-files...> [from-format to-format] [key=value ...]
    #[arg(
        value_name = "TOKENS",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    tokens: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already reports progress; keep library INFO logs out of it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && io::stderr().is_terminal();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = (!cli.quiet).then(|| CliProgressCallback::new(show_progress));

    match run(&cli, progress.clone()).await {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(e) => {
            if let Some(ref cb) = progress {
                cb.clear();
            }
            let code = e
                .downcast_ref::<ConvertApiError>()
                .map(ConvertApiError::exit_code)
                .unwrap_or(EXIT_VALIDATION);
            eprintln!("{} {e:#}", red("✘"));
            ExitCode::from(code)
        }
    }
}

async fn run(cli: &Cli, progress: Option<Arc<CliProgressCallback>>) -> Result<()> {
    let piped = read_piped_paths(cli)?;

    let mut builder = ClientConfig::builder()
        .base_url(&cli.base_url)
        .timeout_secs(cli.timeout);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb as ProgressCallback);
    }
    let config = builder.build()?;

    let output = convert_args(&cli.tokens, piped, &config).await?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "   {}",
            dim(&format!(
                "{} bytes in {} file(s)  —  {}ms total",
                output.stats.total_bytes, output.stats.saved_files, output.stats.duration_ms
            ))
        );
    }

    Ok(())
}

/// Path list from a redirected standard input.
///
/// An empty list counts as "nothing piped" so positional inputs still work
/// when stdin is an empty pipe or `/dev/null`.
fn read_piped_paths(cli: &Cli) -> Result<Option<Vec<PathBuf>>> {
    let stdin = io::stdin();
    if cli.no_stdin || stdin.is_terminal() {
        return Ok(None);
    }
    let paths = read_path_list(stdin.lock()).context("Failed to read input paths from stdin")?;
    Ok((!paths.is_empty()).then_some(paths))
}
