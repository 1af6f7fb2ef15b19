//! Upload body: [`ConversionRequest`] → `multipart/form-data`.
//!
//! ## Part layout
//!
//! | Source                         | Field name            | Part kind |
//! |--------------------------------|-----------------------|-----------|
//! | the only input file            | `file`                | file      |
//! | input file *i* of several      | `files[i]`            | file      |
//! | `FooFile=path` parameter       | `FooFile`             | file      |
//! | any other `key=value`          | `key`                 | text      |
//!
//! Blank input entries produce no part. File parts carry the base name of the
//! local file in their disposition.
//!
//! ## Streaming
//!
//! File contents are never buffered whole. Each file part wraps a lazy chunk
//! stream: the file is opened on the first poll, i.e. right when the HTTP body
//! reaches that part, and closed as soon as its last chunk has been handed to
//! the connection. Peak memory is one chunk per in-flight part regardless of
//! file size or count, and at most one input file descriptor is open at a
//! time. If a later file fails to open, every earlier file is already closed.

use crate::error::ConvertApiError;
use crate::request::{ConversionRequest, PropertyValue};
use bytes::{Bytes, BytesMut};
use futures::Stream;
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::{debug, trace};

/// Read size for streamed file parts.
const CHUNK_SIZE: usize = 64 * 1024;

/// One planned part of the upload body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartSpec {
    pub field: String,
    pub body: PartBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartBody {
    File(PathBuf),
    Text(String),
}

/// Lay out the parts of the upload, in wire order.
pub fn plan_parts(request: &ConversionRequest) -> Vec<PartSpec> {
    let files: Vec<&Path> = request.uploaded_files().collect();
    let mut parts = Vec::with_capacity(files.len() + request.properties.len());

    if let [only] = files.as_slice() {
        parts.push(PartSpec {
            field: "file".to_string(),
            body: PartBody::File(only.to_path_buf()),
        });
    } else {
        for (i, path) in files.iter().enumerate() {
            parts.push(PartSpec {
                field: format!("files[{i}]"),
                body: PartBody::File(path.to_path_buf()),
            });
        }
    }

    for (name, value) in request.properties.iter() {
        let body = match value {
            PropertyValue::FileRef(path) => PartBody::File(path.clone()),
            PropertyValue::Text(text) => PartBody::Text(text.clone()),
        };
        parts.push(PartSpec {
            field: name.to_string(),
            body,
        });
    }

    parts
}

/// Build the streaming upload body for `request`.
///
/// Returns the form together with its number of file parts. Only file sizes
/// are read here; file contents are read while the request is being sent.
pub async fn build_form(request: &ConversionRequest) -> Result<(Form, usize), ConvertApiError> {
    let mut form = Form::new();
    let mut file_parts = 0;
    for planned in plan_parts(request) {
        let part = match planned.body {
            PartBody::File(path) => {
                file_parts += 1;
                file_part(path).await?
            }
            PartBody::Text(text) => Part::text(text),
        };
        debug!("Form part '{}'", planned.field);
        form = form.part(planned.field, part);
    }
    Ok((form, file_parts))
}

/// A file part whose content is streamed from disk.
async fn file_part(path: PathBuf) -> Result<Part, ConvertApiError> {
    let len = tokio::fs::metadata(&path)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                ConvertApiError::PermissionDenied { path: path.clone() }
            }
            _ => ConvertApiError::InputNotFound { path: path.clone() },
        })?
        .len();

    let file_name = base_name(&path);
    let body = reqwest::Body::wrap_stream(file_chunks(path));

    Part::stream_with_length(body, len)
        .file_name(file_name)
        .mime_str("application/octet-stream")
        .map_err(|e| ConvertApiError::Internal(format!("invalid part mime type: {e}")))
}

enum ChunkState {
    Pending(PathBuf),
    Open(tokio::fs::File, PathBuf),
    Done,
}

/// Lazily open `path` and yield its contents in chunks.
///
/// The file handle lives inside the stream state and is dropped on end of
/// file, on the first read error, or when the stream itself is dropped.
pub fn file_chunks(path: PathBuf) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    futures::stream::unfold(ChunkState::Pending(path), |state| async move {
        let (mut file, path) = match state {
            ChunkState::Pending(path) => match tokio::fs::File::open(&path).await {
                Ok(file) => {
                    debug!("Uploading {}", path.display());
                    (file, path)
                }
                Err(e) => return Some((Err(e), ChunkState::Done)),
            },
            ChunkState::Open(file, path) => (file, path),
            ChunkState::Done => return None,
        };

        let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
        match file.read_buf(&mut buf).await {
            Ok(0) => {
                trace!("Closed {}", path.display());
                None
            }
            Ok(_) => Some((Ok(buf.freeze()), ChunkState::Open(file, path))),
            Err(e) => Some((Err(e), ChunkState::Done)),
        }
    })
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
