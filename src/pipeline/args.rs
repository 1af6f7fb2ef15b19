//! Argument resolution: flat token vector → [`ConversionRequest`].
//!
//! ## Token layout
//!
//! ```text
//! <api-token> <output> <input-files...> [from-format to-format] [key=value ...]
//! ```
//!
//! Tokens after the output path that contain `=` are parameters; the rest are
//! positional. Counting the two leading tokens, an invocation with more than
//! four positional tokens ends with an explicit `from-format to-format` pair;
//! with four or fewer every trailing positional token is an input file and
//! both formats are inferred from file extensions.
//!
//! When the input list is piped in, the positional tokens after the output
//! path can only be the optional format pair.
//!
//! Only existence checks touch the file system. Nothing here terminates the
//! process: every failure is returned as a [`ConvertApiError`] and the binary
//! maps it to an exit code.

use crate::error::ConvertApiError;
use crate::pipeline::input::check_input_file;
use crate::request::{is_blank, ConversionRequest, Properties, PropertyValue};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Positional token count above which the last two are the format pair.
const MAX_POSITIONAL_WITHOUT_FORMATS: usize = 4;

/// Positional token count of the minimal `token output input` form.
const SINGLE_FILE_ARITY: usize = 3;

/// Resolve the argument vector into a validated request.
///
/// `piped` carries the input list read from a redirected standard input.
/// When it is `Some`, no positional input files are accepted.
pub fn resolve_args(
    args: &[String],
    piped: Option<Vec<PathBuf>>,
) -> Result<ConversionRequest, ConvertApiError> {
    if args.len() < 2 {
        return Err(ConvertApiError::InvalidArguments(
            "expected <api-token> <output-path> <input-files...> [from-format] [to-format] [key=value ...]"
                .into(),
        ));
    }

    let api_token = args[0].trim().to_string();
    if api_token.is_empty() {
        return Err(ConvertApiError::InvalidArguments(
            "API token must not be empty".into(),
        ));
    }
    let output_target = PathBuf::from(&args[1]);

    let (positional, property_tokens): (Vec<&String>, Vec<&String>) =
        args[2..].iter().partition(|t| !t.contains('='));

    let properties = parse_properties(&property_tokens)?;
    reject_forbidden(&properties)?;

    // ── Split positional tokens into inputs and explicit formats ──────────
    let piped_mode = piped.is_some();
    let (input_files, explicit_formats) = match piped {
        Some(paths) => {
            let formats = match positional.as_slice() {
                [] => None,
                [from, to] => Some((from.as_str(), to.as_str())),
                _ => {
                    return Err(ConvertApiError::InvalidArguments(format!(
                        "input files are read from standard input; only [from-format to-format] \
                         may follow the output path (got {} extra tokens)",
                        positional.len()
                    )))
                }
            };
            (paths, formats)
        }
        None => {
            let arity = 2 + positional.len();
            if arity > MAX_POSITIONAL_WITHOUT_FORMATS {
                let split = positional.len() - 2;
                let inputs = positional[..split].iter().map(PathBuf::from).collect();
                let formats = (positional[split].as_str(), positional[split + 1].as_str());
                (inputs, Some(formats))
            } else {
                (positional.iter().map(PathBuf::from).collect(), None)
            }
        }
    };

    // ── Formats ───────────────────────────────────────────────────────────
    let (from_format, to_format) = match explicit_formats {
        Some((from, to)) => (normalise_format(from)?, normalise_format(to)?),
        None => (
            infer_from_format(&input_files)?,
            extension_of(&output_target).ok_or_else(|| {
                ConvertApiError::InvalidArguments(format!(
                    "cannot infer the target format from '{}'; pass [from-format] [to-format] explicitly",
                    output_target.display()
                ))
            })?,
        ),
    };

    let mut request = ConversionRequest {
        api_token,
        from_format,
        to_format,
        input_files,
        output_target,
        properties,
    };

    // ── Existence checks ──────────────────────────────────────────────────
    if !request.is_web_source() && request.uploaded_files().next().is_none() {
        return Err(ConvertApiError::InvalidArguments(
            "At least one input file is required.".into(),
        ));
    }
    for path in request.uploaded_files() {
        check_input_file(path)?;
    }
    for (_, value) in request.properties.iter() {
        if let PropertyValue::FileRef(path) = value {
            check_input_file(path)?;
        }
    }

    if !piped_mode && 2 + positional.len() == SINGLE_FILE_ARITY {
        synthesize_file_name(&mut request);
    }

    debug!(
        "Resolved {} input file(s), {} parameter(s): {} → {}",
        request.input_files.len(),
        request.properties.len(),
        request.from_format,
        request.to_format
    );
    Ok(request)
}

/// Parse `key=value` tokens, splitting at the first `=`.
fn parse_properties(tokens: &[&String]) -> Result<Properties, ConvertApiError> {
    let mut properties = Properties::new();
    for token in tokens {
        let Some((name, value)) = token.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(ConvertApiError::InvalidArguments(format!(
                "parameter '{token}' has no name"
            )));
        }
        if properties.contains(name) {
            return Err(ConvertApiError::DuplicateParameter {
                name: name.to_string(),
            });
        }
        properties.insert(name, PropertyValue::parse(name, value));
    }
    Ok(properties)
}

/// `StoreFile=true` would persist the converted files on the server.
fn reject_forbidden(properties: &Properties) -> Result<(), ConvertApiError> {
    for (name, value) in properties.iter() {
        let value = value.as_text();
        if name.eq_ignore_ascii_case("storefile") && value.trim().eq_ignore_ascii_case("true") {
            return Err(ConvertApiError::ForbiddenParameter {
                name: name.to_string(),
                value: value.into_owned(),
            });
        }
    }
    Ok(())
}

fn normalise_format(token: &str) -> Result<String, ConvertApiError> {
    let format = token.trim().to_ascii_lowercase();
    if format.is_empty() {
        return Err(ConvertApiError::InvalidArguments(
            "format must not be empty".into(),
        ));
    }
    Ok(format)
}

/// Source format from the first uploaded file's extension.
fn infer_from_format(input_files: &[PathBuf]) -> Result<String, ConvertApiError> {
    let mut uploaded = input_files.iter().filter(|p| !is_blank(p));
    let Some(first) = uploaded.next() else {
        return Err(ConvertApiError::InvalidArguments(
            "At least one input file is required.".into(),
        ));
    };
    let format = extension_of(first).ok_or_else(|| {
        ConvertApiError::InvalidArguments(format!(
            "cannot infer the source format from '{}'; pass [from-format] [to-format] explicitly",
            first.display()
        ))
    })?;

    for other in uploaded {
        if extension_of(other).as_deref() != Some(format.as_str()) {
            warn!(
                "'{}' has a different extension than '{}'; using '{}' as the source format",
                other.display(),
                first.display(),
                format
            );
        }
    }
    Ok(format)
}

/// Lower-case extension without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .filter(|e| !e.is_empty())
}

fn synthesize_file_name(request: &mut ConversionRequest) {
    if request.properties.contains("FileName") {
        return;
    }
    if let Some(stem) = request.output_target.file_stem() {
        let stem = stem.to_string_lossy().into_owned();
        debug!("Using FileName={stem} from the output path");
        request
            .properties
            .insert("FileName", PropertyValue::Text(stem));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    /// Create empty files in a temp dir, returning their paths as strings.
    fn fixture(names: &[&str]) -> (TempDir, Vec<String>) {
        let dir = tempfile::tempdir().unwrap();
        let paths = names
            .iter()
            .map(|n| {
                let p = dir.path().join(n);
                std::fs::write(&p, b"data").unwrap();
                p.to_string_lossy().into_owned()
            })
            .collect();
        (dir, paths)
    }

    #[test]
    fn single_file_infers_formats_and_file_name() {
        let (_dir, files) = fixture(&["simple.PDF"]);
        let req = resolve_args(&args(&["tok", "out/report.DOCX", &files[0]]), None).unwrap();

        assert_eq!(req.api_token, "tok");
        assert_eq!(req.from_format, "pdf");
        assert_eq!(req.to_format, "docx");
        assert_eq!(req.input_files, vec![PathBuf::from(&files[0])]);
        assert_eq!(
            req.properties.get("filename"),
            Some(&PropertyValue::Text("report".into()))
        );
    }

    #[test]
    fn explicit_file_name_is_not_overridden() {
        let (_dir, files) = fixture(&["simple.pdf"]);
        let req = resolve_args(
            &args(&["tok", "out.docx", &files[0], "fileName=custom"]),
            None,
        )
        .unwrap();
        assert_eq!(req.properties.len(), 1);
        assert_eq!(
            req.properties.get("FileName"),
            Some(&PropertyValue::Text("custom".into()))
        );
    }

    #[test]
    fn merge_with_explicit_formats() {
        let (_dir, files) = fixture(&["a.pdf", "b.pdf", "c.pdf"]);
        let req = resolve_args(
            &args(&["tok", "merged.pdf", &files[0], &files[1], &files[2], "PDF", "Merge"]),
            None,
        )
        .unwrap();

        assert_eq!(req.from_format, "pdf");
        assert_eq!(req.to_format, "merge");
        assert_eq!(req.input_files.len(), 3);
        assert!(req.properties.is_empty());
    }

    #[test]
    fn two_inputs_without_formats() {
        let (_dir, files) = fixture(&["a.pdf", "b.pdf"]);
        let req =
            resolve_args(&args(&["tok", "out.zip", &files[0], &files[1]]), None).unwrap();
        assert_eq!(req.input_files.len(), 2);
        assert_eq!(req.from_format, "pdf");
        assert_eq!(req.to_format, "zip");
        assert!(req.properties.is_empty());
    }

    #[test]
    fn properties_keep_order_and_split_at_first_equals() {
        let (_dir, files) = fixture(&["simple.pdf"]);
        let req = resolve_args(
            &args(&[
                "tok",
                "out",
                &files[0],
                "pdf",
                "protect",
                "UserPassword=1234",
                "OwnerPassword=a=b",
            ]),
            None,
        )
        .unwrap();

        let props: Vec<(&str, String)> = req
            .properties
            .iter()
            .map(|(k, v)| (k, v.as_text().into_owned()))
            .collect();
        assert_eq!(
            props,
            vec![
                ("UserPassword", "1234".to_string()),
                ("OwnerPassword", "a=b".to_string())
            ]
        );
    }

    #[test]
    fn token_counts_partition_trailing_arguments() {
        let (_dir, files) = fixture(&["a.pdf", "b.pdf", "c.pdf"]);
        let cases: Vec<Vec<String>> = vec![
            args(&["tok", "o.pdf", &files[0], &files[1]]),
            args(&["tok", "o", &files[0], "pdf", "watermark", "Text=x", "FileName=w"]),
            args(&["tok", "o", &files[0], &files[1], &files[2], "pdf", "merge", "A=1"]),
            args(&["tok", "o.pdf", &files[0], "Text=x"]),
        ];
        for case in cases {
            let req = resolve_args(&case, None).unwrap();
            let positional = case[2..].iter().filter(|t| !t.contains('=')).count();
            let formats = if 2 + positional > 4 { 2 } else { 0 };
            let synthesized = usize::from(2 + positional == 3 && !case.iter().any(|t| t.to_ascii_lowercase().starts_with("filename=")));
            assert_eq!(
                req.input_files.len() + req.properties.len() - synthesized + formats,
                case.len() - 2,
                "{case:?}"
            );
        }
    }

    #[test]
    fn storefile_true_is_rejected_anywhere() {
        let (_dir, files) = fixture(&["a.pdf", "b.pdf"]);
        let cases = vec![
            args(&["tok", "o.pdf", &files[0], "StoreFile=true"]),
            args(&["tok", "o.pdf", &files[0], "storefile=TRUE", "Text=x"]),
            args(&["tok", "o", &files[0], &files[1], "pdf", "merge", "A=1", "STOREFILE=True"]),
        ];
        for case in cases {
            let err = resolve_args(&case, None).unwrap_err();
            assert!(
                matches!(err, ConvertApiError::ForbiddenParameter { .. }),
                "{case:?} → {err}"
            );
        }
    }

    #[test]
    fn storefile_false_is_forwarded_as_text() {
        let (_dir, files) = fixture(&["a.pdf"]);
        let req =
            resolve_args(&args(&["tok", "o.pdf", &files[0], "StoreFile=false"]), None).unwrap();
        assert_eq!(
            req.properties.get("storefile"),
            Some(&PropertyValue::Text("false".into()))
        );
    }

    #[test]
    fn forbidden_parameter_wins_over_missing_input() {
        let err = resolve_args(
            &args(&["tok", "o.pdf", "/no/such/file.pdf", "StoreFile=true"]),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ConvertApiError::ForbiddenParameter { .. }));
    }

    #[test]
    fn missing_input_is_reported_by_path() {
        let err = resolve_args(&args(&["tok", "o.docx", "/no/such/file.pdf"]), None).unwrap_err();
        match err {
            ConvertApiError::InputNotFound { path } => {
                assert_eq!(path, PathBuf::from("/no/such/file.pdf"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn no_input_files_is_rejected() {
        let err = resolve_args(&args(&["tok", "o.docx"]), None).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn too_few_tokens_is_rejected() {
        let err = resolve_args(&args(&["tok"]), None).unwrap_err();
        assert!(matches!(err, ConvertApiError::InvalidArguments(_)));
    }

    #[test]
    fn web_source_needs_no_file() {
        let req = resolve_args(
            &args(&["tok", "out_dir", "", "web", "pdf", "Url=https://www.example.com"]),
            None,
        )
        .unwrap();
        assert_eq!(req.from_format, "web");
        assert_eq!(req.input_files, vec![PathBuf::from("")]);
        assert_eq!(req.uploaded_files().count(), 0);
    }

    #[test]
    fn blank_placeholder_is_not_checked_for_existence() {
        let (_dir, files) = fixture(&["a.pdf"]);
        let req =
            resolve_args(&args(&["tok", "o", "", &files[0], "pdf", "merge"]), None).unwrap();
        assert_eq!(req.uploaded_files().count(), 1);
    }

    #[test]
    fn file_valued_parameter_must_exist() {
        let (_dir, files) = fixture(&["a.pdf"]);
        let err = resolve_args(
            &args(&["tok", "o.pdf", &files[0], "OverlayFile=/no/overlay.pdf"]),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ConvertApiError::InputNotFound { .. }));
    }

    #[test]
    fn file_valued_parameter_is_a_file_ref() {
        let (_dir, files) = fixture(&["a.pdf", "overlay.pdf"]);
        let token = format!("OverlayFile={}", files[1]);
        let req = resolve_args(&args(&["tok", "o", &files[0], "pdf", "overlay", &token]), None)
            .unwrap();
        assert_eq!(
            req.properties.get("overlayfile"),
            Some(&PropertyValue::FileRef(PathBuf::from(&files[1])))
        );
    }

    #[test]
    fn duplicate_parameter_is_rejected() {
        let (_dir, files) = fixture(&["a.pdf"]);
        let err = resolve_args(&args(&["tok", "o.pdf", &files[0], "Text=a", "text=b"]), None)
            .unwrap_err();
        assert!(matches!(err, ConvertApiError::DuplicateParameter { .. }));
    }

    #[test]
    fn piped_inputs_with_explicit_formats() {
        let (_dir, files) = fixture(&["a.pdf", "b.pdf"]);
        let piped = files.iter().map(PathBuf::from).collect();
        let req = resolve_args(&args(&["tok", "out", "pdf", "merge", "A=1"]), Some(piped)).unwrap();
        assert_eq!(req.input_files.len(), 2);
        assert_eq!(req.to_format, "merge");
        // FileName is only synthesised for the positional single-file form.
        assert!(!req.properties.contains("FileName"));
    }

    #[test]
    fn piped_inputs_infer_formats() {
        let (_dir, files) = fixture(&["a.docx"]);
        let req = resolve_args(&args(&["tok", "out.pdf"]), Some(vec![PathBuf::from(&files[0])]))
            .unwrap();
        assert_eq!(req.from_format, "docx");
        assert_eq!(req.to_format, "pdf");
    }

    #[test]
    fn piped_inputs_reject_positional_files() {
        let (_dir, files) = fixture(&["a.pdf"]);
        let err = resolve_args(
            &args(&["tok", "out.pdf", &files[0]]),
            Some(vec![PathBuf::from(&files[0])]),
        )
        .unwrap_err();
        assert!(matches!(err, ConvertApiError::InvalidArguments(_)));
    }

    #[test]
    fn uninferable_target_format_is_rejected() {
        let (_dir, files) = fixture(&["a.pdf"]);
        let err = resolve_args(&args(&["tok", "out_without_ext", &files[0]]), None).unwrap_err();
        assert!(matches!(err, ConvertApiError::InvalidArguments(_)));
    }

    #[test]
    fn extension_is_lower_cased() {
        assert_eq!(extension_of(Path::new("A.PnG")), Some("png".into()));
        assert_eq!(extension_of(Path::new("noext")), None);
        assert_eq!(extension_of(Path::new("dir/")), None);
    }
}
