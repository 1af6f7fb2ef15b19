//! # convertapi-cli
//!
//! Upload files to the ConvertAPI conversion service and unpack the
//! `multipart/mixed` answer into a file or directory.
//!
//! ## Pipeline Overview
//!
//! ```text
//! <token> <output> <inputs...> [from to] [key=value ...]
//!  │
//!  ├─ 1. Resolve  tokens → ConversionRequest (formats, files, parameters)
//!  ├─ 2. Upload   streamed multipart/form-data POST
//!  ├─ 3. Decode   multipart/mixed body, one part at a time
//!  └─ 4. Output   each file part straight to disk
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use convertapi_cli::{convert_args, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let args: Vec<String> = ["my-token", "out/", "a.pdf", "b.pdf", "pdf", "merge"]
//!         .iter()
//!         .map(|s| s.to_string())
//!         .collect();
//!     let output = convert_args(&args, None, &ClientConfig::default()).await?;
//!     for file in &output.files {
//!         eprintln!("{}", file.path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `convertapi-cli` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! convertapi-cli = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod request;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::ConvertApiClient;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use convert::{convert, convert_args};
pub use error::{ConvertApiError, EXIT_API, EXIT_OK, EXIT_VALIDATION};
pub use output::{ConversionOutput, ConversionStats, OutputTarget, SavedFile};
pub use pipeline::args::resolve_args;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use request::{ConversionRequest, Properties, PropertyValue};
