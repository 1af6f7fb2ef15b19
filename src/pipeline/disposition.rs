//! Header parameter parsing for `Content-Disposition` and `Content-Type`.
//!
//! Both headers share one grammar: a leading token followed by
//! `; name=value` parameters, where a value is either a bare token or a
//! quoted string with backslash escapes. Parameter names are matched
//! case-insensitively.
//!
//! A disposition may name its file in two ways:
//!
//! ```text
//! attachment; filename="report.pdf"
//! attachment; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf; size=180658
//! ```
//!
//! The extended `filename*` form (RFC 5987 / RFC 6266) is
//! `charset'language'percent-encoded`. When both are present the extended
//! form wins.

use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;

static RE_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#";\s*([^\s;=]+)\s*=\s*("(?:[^"\\]|\\.)*"?|[^;]*)"#).unwrap()
});

/// A header value split into its leading token and parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderParams {
    /// Leading token, lower-cased (`attachment`, `multipart/mixed`, …).
    pub value: String,
    params: Vec<(String, String)>,
}

impl HeaderParams {
    pub fn parse(header: &str) -> Self {
        let (value, rest) = match header.find(';') {
            Some(i) => (&header[..i], &header[i..]),
            None => (header, ""),
        };

        let params = RE_PARAM
            .captures_iter(rest)
            .map(|caps| {
                let name = caps[1].to_ascii_lowercase();
                let raw = caps[2].trim();
                (name, unquote(raw))
            })
            .collect();

        Self {
            value: value.trim().to_ascii_lowercase(),
            params,
        }
    }

    /// First parameter with this name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Parsed `Content-Disposition` of one response part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentDisposition {
    pub disposition: String,
    pub name: Option<String>,
    /// Plain `filename` attribute.
    pub filename: Option<String>,
    /// Decoded extended `filename*` attribute.
    pub filename_star: Option<String>,
}

impl ContentDisposition {
    pub fn parse(header: &str) -> Self {
        let params = HeaderParams::parse(header);
        Self {
            name: params.get("name").map(str::to_string),
            filename: params
                .get("filename")
                .map(|f| f.trim_matches('"').to_string())
                .filter(|f| !f.is_empty()),
            filename_star: params.get("filename*").and_then(decode_ext_value),
            disposition: params.value,
        }
    }

    /// The file name to save this part under, extended form first.
    ///
    /// `None` means the part is not a file output.
    pub fn file_name(&self) -> Option<&str> {
        self.filename_star
            .as_deref()
            .or(self.filename.as_deref())
    }
}

/// Media type and boundary of a `Content-Type` header.
///
/// Returns `None` for the boundary when the parameter is absent or empty.
pub fn media_type_and_boundary(header: &str) -> (String, Option<String>) {
    let params = HeaderParams::parse(header);
    let boundary = params
        .get("boundary")
        .map(str::to_string)
        .filter(|b| !b.is_empty());
    (params.value, boundary)
}

/// Decode an RFC 5987 `charset'language'value`.
///
/// Returns `None` when the value does not have the three-field shape or
/// decodes to an empty name.
pub fn decode_ext_value(raw: &str) -> Option<String> {
    let raw = raw.trim().trim_matches('"');
    let mut fields = raw.splitn(3, '\'');
    let charset = fields.next()?;
    let _language = fields.next()?;
    let encoded = fields.next()?;

    let decoded = percent_decode_str(encoded);
    let text = if charset.eq_ignore_ascii_case("iso-8859-1") || charset.eq_ignore_ascii_case("latin1")
    {
        decoded.map(char::from).collect()
    } else {
        decoded.decode_utf8_lossy().into_owned()
    };

    Some(text).filter(|t| !t.is_empty())
}

/// Strip surrounding quotes and resolve `\x` escapes.
fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"') else {
        return raw.to_string();
    };
    let inner = inner.strip_suffix('"').unwrap_or(inner);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}
