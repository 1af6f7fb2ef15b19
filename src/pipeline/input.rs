//! Input checks: make sure every file we are about to upload can be opened,
//! and read piped path lists.
//!
//! Nothing is uploaded from here. The file is opened once to surface a
//! permission problem as a validation error instead of a half-sent request,
//! then closed again straight away; the uploader reopens it when its part is
//! streamed.

use crate::error::ConvertApiError;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` names a readable regular file.
///
/// The file is opened here and the handle dropped before returning, so a
/// permission problem is reported during validation rather than mid-upload.
/// Contents are not read.
pub fn check_input_file(path: &Path) -> Result<(), ConvertApiError> {
    if !path.is_file() {
        return Err(ConvertApiError::InputNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ConvertApiError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(ConvertApiError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    debug!("Input ok: {}", path.display());
    Ok(())
}

/// Read newline-delimited paths until end of stream.
///
/// A trailing `\r` is stripped from every line. Blank lines are kept: they
/// become "no file" placeholders in the request.
pub fn read_path_list<R: BufRead>(reader: R) -> std::io::Result<Vec<PathBuf>> {
    reader
        .lines()
        .map(|line| line.map(|l| PathBuf::from(l.trim_end_matches('\r'))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn missing_file_is_input_not_found() {
        let err = check_input_file(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, ConvertApiError::InputNotFound { .. }));
    }

    #[test]
    fn directory_is_not_an_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_input_file(dir.path()).unwrap_err();
        assert!(matches!(err, ConvertApiError::InputNotFound { .. }));
    }

    #[test]
    fn existing_file_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("simple.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();
        check_input_file(&path).expect("readable file");
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can open the file regardless of its mode.
        if std::fs::File::open(&path).is_ok() {
            return;
        }
        let err = check_input_file(&path).unwrap_err();
        assert!(matches!(err, ConvertApiError::PermissionDenied { .. }));
    }

    #[test]
    fn path_list_strips_crlf_and_keeps_blank_lines() {
        let input = Cursor::new("a.pdf\r\n\nsub dir/b.pdf\n");
        let paths = read_path_list(input).unwrap();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("a.pdf"),
                PathBuf::from(""),
                PathBuf::from("sub dir/b.pdf")
            ]
        );
    }

    #[test]
    fn empty_stream_gives_empty_list() {
        assert!(read_path_list(Cursor::new("")).unwrap().is_empty());
    }
}
