//! Output destinations and the run report.
//!
//! The destination given on the command line is classified once, before the
//! first part is written:
//!
//! * an existing directory receives every file part under its server-supplied
//!   name;
//! * anything else is a literal file path that receives exactly one part. A
//!   second file part is an [`ConvertApiError::UnexpectedExtraPart`]; files
//!   already written stay on disk.

use crate::error::ConvertApiError;
use crate::pipeline::multipart::ResponsePart;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_stream::Stream;
use tracing::debug;

/// Where decoded parts go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Directory(PathBuf),
    File(PathBuf),
}

impl OutputTarget {
    /// Classify `path` by looking at the file system once.
    pub async fn resolve(path: &Path) -> Self {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => OutputTarget::Directory(path.to_path_buf()),
            _ => OutputTarget::File(path.to_path_buf()),
        }
    }

    /// Destination of the `index`-th (0-based) file part named `file_name`.
    pub fn path_for(&self, file_name: &str, index: usize) -> Result<PathBuf, ConvertApiError> {
        match self {
            OutputTarget::Directory(dir) => {
                let name = sanitize_file_name(file_name).ok_or_else(|| {
                    ConvertApiError::MalformedResponse(format!(
                        "part file name {file_name:?} has no usable component"
                    ))
                })?;
                Ok(dir.join(name))
            }
            OutputTarget::File(path) if index == 0 => Ok(path.clone()),
            OutputTarget::File(path) => Err(ConvertApiError::UnexpectedExtraPart {
                path: path.clone(),
            }),
        }
    }
}

/// Final path component of a server-supplied name.
///
/// Both `/` and `\` count as separators. Returns `None` when nothing usable
/// is left (empty, `.` or `..`).
pub fn sanitize_file_name(name: &str) -> Option<&str> {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .unwrap_or_default();
    match last {
        "" | "." | ".." => None,
        other => Some(other),
    }
}

/// One file written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedFile {
    pub path: PathBuf,
    /// Name the server gave the part.
    pub name: String,
    pub bytes: u64,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Input files uploaded (blank placeholders excluded).
    pub uploaded_files: usize,
    /// Named parameters sent alongside the files.
    pub parameters: usize,
    pub saved_files: usize,
    pub total_bytes: u64,
    /// Wall-clock time from request start to the last byte written.
    pub duration_ms: u64,
}

/// Result of a successful conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub files: Vec<SavedFile>,
    pub stats: ConversionStats,
}

/// Writes decoded parts to their destination, one at a time.
#[derive(Debug)]
pub struct OutputWriter {
    target: OutputTarget,
    saved: Vec<SavedFile>,
}

impl OutputWriter {
    pub fn new(target: OutputTarget) -> Self {
        Self {
            target,
            saved: Vec::new(),
        }
    }

    /// Stream the remaining body of `part` into its destination file.
    ///
    /// The file is created (or truncated) right before the first byte and
    /// closed before this returns, on success and on error alike.
    pub async fn save<S>(&mut self, part: &mut ResponsePart<'_, S>) -> Result<SavedFile, ConvertApiError>
    where
        S: Stream<Item = Result<Bytes, ConvertApiError>> + Unpin,
    {
        let name = part
            .file_name()
            .ok_or_else(|| ConvertApiError::Internal("part has no file name".into()))?
            .to_string();
        let path = self.target.path_for(&name, self.saved.len())?;
        debug!("Writing part '{}' to {}", name, path.display());

        let write_err = |source: std::io::Error| ConvertApiError::OutputWriteFailed {
            path: path.clone(),
            source,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .await
            .map_err(write_err)?;

        let mut bytes = 0u64;
        while let Some(chunk) = part.chunk().await? {
            file.write_all(&chunk).await.map_err(write_err)?;
            bytes += chunk.len() as u64;
        }
        file.flush().await.map_err(write_err)?;
        drop(file);

        let saved = SavedFile { path, name, bytes };
        self.saved.push(saved.clone());
        Ok(saved)
    }

    pub fn into_saved(self) -> Vec<SavedFile> {
        self.saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::multipart::MultipartReader;

    fn body(parts: &[(&str, &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        for (disposition, data) in parts {
            out.extend_from_slice(b"--bnd\r\nContent-Disposition: ");
            out.extend_from_slice(disposition.as_bytes());
            out.extend_from_slice(b"\r\n\r\n");
            out.extend_from_slice(data);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"--bnd--\r\n");
        out
    }

    fn reader(
        data: Vec<u8>,
    ) -> MultipartReader<futures::stream::Iter<std::vec::IntoIter<Result<Bytes, ConvertApiError>>>>
    {
        let chunks: Vec<Result<Bytes, ConvertApiError>> = data
            .chunks(5)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        MultipartReader::new(futures::stream::iter(chunks), "bnd")
    }

    #[test]
    fn sanitize_keeps_last_component() {
        assert_eq!(sanitize_file_name("a.png"), Some("a.png"));
        assert_eq!(sanitize_file_name("../../etc/passwd"), Some("passwd"));
        assert_eq!(sanitize_file_name("C:\\tmp\\x.pdf"), Some("x.pdf"));
        assert_eq!(sanitize_file_name("b c.png"), Some("b c.png"));
        assert_eq!(sanitize_file_name("dir/"), None);
        assert_eq!(sanitize_file_name(".."), None);
        assert_eq!(sanitize_file_name(""), None);
    }

    #[tokio::test]
    async fn resolve_distinguishes_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            OutputTarget::resolve(dir.path()).await,
            OutputTarget::Directory(dir.path().to_path_buf())
        );
        let file = dir.path().join("out.pdf");
        assert_eq!(
            OutputTarget::resolve(&file).await,
            OutputTarget::File(file.clone())
        );
    }

    #[test]
    fn file_target_accepts_one_part() {
        let target = OutputTarget::File(PathBuf::from("result.docx"));
        assert_eq!(
            target.path_for("server-name.docx", 0).unwrap(),
            PathBuf::from("result.docx")
        );
        assert!(matches!(
            target.path_for("second.docx", 1),
            Err(ConvertApiError::UnexpectedExtraPart { .. })
        ));
    }

    #[test]
    fn directory_target_rejects_unusable_names() {
        let target = OutputTarget::Directory(PathBuf::from("out"));
        assert_eq!(
            target.path_for("sub/a.png", 3).unwrap(),
            PathBuf::from("out/a.png")
        );
        assert!(matches!(
            target.path_for("..", 0),
            Err(ConvertApiError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn writes_every_part_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let data = body(&[
            ("attachment; filename=\"p1.png\"", b"one"),
            ("attachment; filename=\"p2.png\"", b"two"),
            ("attachment; filename*=UTF-8''p%203.png", b"three"),
        ]);
        let mut reader = reader(data);
        let mut writer = OutputWriter::new(OutputTarget::resolve(dir.path()).await);

        while let Some(mut part) = reader.next_file_part().await.unwrap() {
            writer.save(&mut part).await.unwrap();
        }

        let saved = writer.into_saved();
        assert_eq!(saved.len(), 3);
        assert_eq!(std::fs::read(dir.path().join("p1.png")).unwrap(), b"one");
        assert_eq!(std::fs::read(dir.path().join("p2.png")).unwrap(), b"two");
        assert_eq!(std::fs::read(dir.path().join("p 3.png")).unwrap(), b"three");
        assert_eq!(saved[2].bytes, 5);
    }

    #[tokio::test]
    async fn second_part_for_file_target_keeps_first_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("result.bin");
        std::fs::write(&dest, b"stale content that is longer").unwrap();

        let data = body(&[
            ("attachment; filename=\"a.bin\"", b"first"),
            ("attachment; filename=\"b.bin\"", b"second"),
        ]);
        let mut reader = reader(data);
        let mut writer = OutputWriter::new(OutputTarget::File(dest.clone()));

        let mut first = reader.next_file_part().await.unwrap().unwrap();
        writer.save(&mut first).await.unwrap();
        drop(first);

        let mut second = reader.next_file_part().await.unwrap().unwrap();
        let err = writer.save(&mut second).await.unwrap_err();
        assert!(matches!(err, ConvertApiError::UnexpectedExtraPart { .. }));
        assert_eq!(std::fs::read(&dest).unwrap(), b"first");
    }

    #[tokio::test]
    async fn unwritable_destination_is_output_write_failed() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing-dir").join("out.pdf");
        let mut reader = reader(body(&[("attachment; filename=\"x.pdf\"", b"x")]));
        let mut writer = OutputWriter::new(OutputTarget::File(dest));

        let mut part = reader.next_file_part().await.unwrap().unwrap();
        let err = writer.save(&mut part).await.unwrap_err();
        assert!(matches!(err, ConvertApiError::OutputWriteFailed { .. }));
        assert_eq!(err.exit_code(), crate::error::EXIT_VALIDATION);
    }
}
