//! Error types for the convertapi-cli library.
//!
//! Every failure is a [`ConvertApiError`]. The variants fall into two groups
//! that map onto the two non-zero exit codes of the binary:
//!
//! * **Local** (exit code `1`): the argument vector could not be resolved, an
//!   input file is missing, a forbidden parameter was supplied, or a decoded
//!   part could not be written to disk. Argument problems are always detected
//!   before any network call is made.
//!
//! * **Remote** (exit code `2`): the exchange with the conversion service
//!   failed. The service answered with an error status or an unexpected
//!   content type, the connection dropped, the request ran past the fixed
//!   timeout, or the `multipart/mixed` body could not be decoded.
//!
//! [`ConvertApiError::exit_code`] is the single place where that mapping
//! lives, so the resolution and encoding code never terminates the process
//! itself.

use std::path::PathBuf;
use thiserror::Error;

/// Exit code for a successful run.
pub const EXIT_OK: u8 = 0;
/// Exit code for argument and parameter validation failures.
pub const EXIT_VALIDATION: u8 = 1;
/// Exit code for remote API failures.
pub const EXIT_API: u8 = 2;

/// All errors returned by the convertapi-cli library.
#[derive(Debug, Error)]
pub enum ConvertApiError {
    // ── Argument errors ───────────────────────────────────────────────────
    /// The argument vector could not be resolved into a request.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// An input file (or a file-valued parameter) does not exist.
    #[error("Input file not found: '{}'", path.display())]
    InputNotFound { path: PathBuf },

    /// An input file exists but cannot be opened for reading.
    #[error("Permission denied reading '{}'", path.display())]
    PermissionDenied { path: PathBuf },

    /// A parameter the CLI must never forward was supplied.
    #[error("Parameter '{name}={value}' is not allowed")]
    ForbiddenParameter { name: String, value: String },

    /// The same parameter name (compared case-insensitively) appeared twice.
    #[error("Parameter '{name}' was given more than once")]
    DuplicateParameter { name: String },

    // ── Transport errors ──────────────────────────────────────────────────
    /// The whole exchange ran past the configured timeout.
    #[error("Request timed out after {secs}s\nIncrease --timeout for large jobs.")]
    Timeout { secs: u64 },

    /// Connection, TLS or body-streaming failure.
    #[error("Transport error: {0}")]
    Transport(String),

    // ── API errors ────────────────────────────────────────────────────────
    /// Non-2xx status, or a 2xx answer that is not `multipart/mixed`.
    #[error("Error: {status}. Response message: {body}")]
    Api { status: u16, body: String },

    /// The `multipart/mixed` response could not be decoded.
    #[error("Malformed multipart response: {0}")]
    MalformedResponse(String),

    /// A single-file destination received more than one file part.
    #[error(
        "Server returned more than one file but '{}' is not a directory.\n\
Pass an existing directory as the output path to keep every file.",
        path.display()
    )]
    UnexpectedExtraPart { path: PathBuf },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write a decoded output file.
    #[error("Failed to write output file '{}': {source}", path.display())]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertApiError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ConvertApiError::Timeout { .. }
            | ConvertApiError::Transport(_)
            | ConvertApiError::Api { .. }
            | ConvertApiError::MalformedResponse(_)
            | ConvertApiError::UnexpectedExtraPart { .. } => EXIT_API,
            _ => EXIT_VALIDATION,
        }
    }

    /// True for errors detected before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ConvertApiError::InvalidArguments(_)
                | ConvertApiError::InputNotFound { .. }
                | ConvertApiError::PermissionDenied { .. }
                | ConvertApiError::ForbiddenParameter { .. }
                | ConvertApiError::DuplicateParameter { .. }
        )
    }
}

impl From<reqwest::Error> for ConvertApiError {
    fn from(e: reqwest::Error) -> Self {
        ConvertApiError::Transport(e.to_string())
    }
}
