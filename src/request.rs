//! The conversion request handed from argument resolution to the uploader.
//!
//! A [`ConversionRequest`] is built once per invocation by
//! [`crate::pipeline::args::resolve_args`], consumed once by
//! [`crate::pipeline::form::build_form`], and dropped once the upload starts.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Source format that takes no uploaded file (the service fetches a URL).
pub const WEB_FORMAT: &str = "web";

/// Value of a named conversion parameter.
///
/// The variant is decided once, at parse time, from the parameter's name
/// (see [`PropertyValue::parse`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    /// Sent verbatim as a text part.
    Text(String),
    /// Sent as a file part streamed from this path.
    FileRef(PathBuf),
}

impl PropertyValue {
    /// Classify a raw `name=value` pair.
    ///
    /// A parameter is file-valued when its name ends in `file`
    /// (case-insensitive) and is not exactly `storefile`.
    pub fn parse(name: &str, value: &str) -> Self {
        if is_file_property(name) {
            PropertyValue::FileRef(PathBuf::from(value))
        } else {
            PropertyValue::Text(value.to_string())
        }
    }

    /// The value as it was typed on the command line.
    pub fn as_text(&self) -> std::borrow::Cow<'_, str> {
        match self {
            PropertyValue::Text(s) => std::borrow::Cow::Borrowed(s),
            PropertyValue::FileRef(p) => p.to_string_lossy(),
        }
    }
}

/// True when a parameter name designates a file-valued parameter.
pub fn is_file_property(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with("file") && lower != "storefile"
}

/// Ordered parameter bag.
///
/// Insertion order is preserved, names are stored with their original case
/// and looked up case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Properties {
    entries: Vec<(String, PropertyValue)>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.position(name).map(|i| &self.entries[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Insert a parameter, keeping the first spelling of its name.
    ///
    /// Returns the previous value when the name was already present; the
    /// entry keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) -> Option<PropertyValue> {
        let name = name.into();
        match self.position(&name) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

/// Everything needed to issue one conversion call.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ConversionRequest {
    #[serde(skip)]
    pub api_token: String,
    /// Lower-case source format, e.g. `pdf`.
    pub from_format: String,
    /// Lower-case target format or operation, e.g. `docx` or `merge`.
    pub to_format: String,
    /// Input files in upload order. Blank entries are "no file" placeholders.
    pub input_files: Vec<PathBuf>,
    /// File or directory that receives the decoded response.
    pub output_target: PathBuf,
    pub properties: Properties,
}

impl std::fmt::Debug for ConversionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionRequest")
            .field("api_token", &"<redacted>")
            .field("from_format", &self.from_format)
            .field("to_format", &self.to_format)
            .field("input_files", &self.input_files)
            .field("output_target", &self.output_target)
            .field("properties", &self.properties)
            .finish()
    }
}

impl ConversionRequest {
    /// Input files that will actually be uploaded.
    pub fn uploaded_files(&self) -> impl Iterator<Item = &Path> {
        self.input_files
            .iter()
            .map(PathBuf::as_path)
            .filter(|p| !is_blank(p))
    }

    pub fn is_web_source(&self) -> bool {
        self.from_format == WEB_FORMAT
    }
}

/// True for an empty or whitespace-only path entry.
pub fn is_blank(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}
