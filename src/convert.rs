//! End-to-end conversion entry points.
//!
//! [`convert`] runs one validated [`ConversionRequest`]: upload, then decode
//! the `multipart/mixed` answer part by part straight into the output
//! destination. [`convert_args`] does argument resolution first and is what
//! the binary calls.

use crate::client::ConvertApiClient;
use crate::config::ClientConfig;
use crate::error::ConvertApiError;
use crate::output::{ConversionOutput, ConversionStats, OutputTarget, OutputWriter};
use crate::pipeline::args::resolve_args;
use crate::request::ConversionRequest;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Run one conversion and write every returned file.
///
/// # Errors
/// Remote failures (status, content type, decoding, timeout) and local write
/// failures. Files written before a failure stay on disk.
pub async fn convert(
    request: &ConversionRequest,
    config: &ClientConfig,
) -> Result<ConversionOutput, ConvertApiError> {
    let start = Instant::now();
    info!(
        "Converting {} -> {} ({} input files, {} parameters)",
        request.from_format,
        request.to_format,
        request.uploaded_files().count(),
        request.properties.len()
    );
    debug!("{:?}", request);

    // ── Step 1: Classify the destination ─────────────────────────────────
    let target = OutputTarget::resolve(&request.output_target).await;
    debug!("Output target: {:?}", target);

    // ── Step 2: Upload ───────────────────────────────────────────────────
    let client = ConvertApiClient::new(config.clone())?;
    let mut reader = client.send(request).await?;

    // ── Step 3: Stream each file part to disk ────────────────────────────
    let mut writer = OutputWriter::new(target);
    while let Some(mut part) = reader.next_file_part().await? {
        let saved = writer.save(&mut part).await?;
        info!("File saved: {} ({} bytes)", saved.path.display(), saved.bytes);
        if let Some(ref cb) = config.progress_callback {
            cb.on_file_saved(&saved.path, saved.bytes);
        }
    }

    let files = writer.into_saved();
    if files.is_empty() {
        warn!("Response contained no file parts");
    }
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(files.len());
    }

    // ── Step 4: Stats ────────────────────────────────────────────────────
    let stats = ConversionStats {
        uploaded_files: request.uploaded_files().count(),
        parameters: request.properties.len(),
        saved_files: files.len(),
        total_bytes: files.iter().map(|f| f.bytes).sum(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Saved {} files ({} bytes) in {}ms",
        stats.saved_files, stats.total_bytes, stats.duration_ms
    );

    Ok(ConversionOutput { files, stats })
}

/// Resolve a flat argument vector and run the conversion.
///
/// `piped` is the path list read from a redirected standard input, if any.
/// Validation errors are returned before any network call is made.
pub async fn convert_args(
    args: &[String],
    piped: Option<Vec<PathBuf>>,
    config: &ClientConfig,
) -> Result<ConversionOutput, ConvertApiError> {
    let request = resolve_args(args, piped)?;
    convert(&request, config).await
}
