//! `multipart/form-data` parsing and encoding.
//!
//! Works on already-collected body bytes. Parsing keeps every part in order; parts
//! with a `filename` (or a non-text content type) become [`FilePart`]s, the rest
//! become text fields.

use bytes::{BufMut, Bytes, BytesMut};
use http::StatusCode;
use serde_json::{Map, Value};

use crate::errors::HttpError;

/// One uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FilePart {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: Some(filename.into()),
            content_type: None,
            data: data.into(),
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A single form entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File(FilePart),
}

/// Ordered form fields; names may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    entries: Vec<(String, FormValue)>,
}

impl FormData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), FormValue::Text(value.into())));
    }

    pub fn append_file(&mut self, name: impl Into<String>, file: FilePart) {
        self.entries.push((name.into(), FormValue::File(file)));
    }

    /// First value stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FormValue> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v)
    }

    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            FormValue::Text(s) => Some(s),
            FormValue::File(_) => None,
        }
    }

    #[must_use]
    pub fn file(&self, name: &str) -> Option<&FilePart> {
        match self.get(name)? {
            FormValue::File(f) => Some(f),
            FormValue::Text(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON view used for schema validation.
    ///
    /// Text fields become strings, files become `{filename, contentType, size}`,
    /// repeated names become arrays.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        for (name, value) in &self.entries {
            let value = match value {
                FormValue::Text(s) => Value::String(s.clone()),
                FormValue::File(f) => serde_json::json!({
                    "filename": f.filename,
                    "contentType": f.content_type,
                    "size": f.data.len(),
                }),
            };
            push_repeated(&mut obj, name, value);
        }
        Value::Object(obj)
    }
}

/// Insert `value`, turning an existing entry into an array on repeat.
pub(crate) fn push_repeated(obj: &mut Map<String, Value>, name: &str, value: Value) {
    match obj.get_mut(name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            obj.insert(name.to_string(), value);
        }
    }
}

/// Extract the boundary from `multipart/form-data; boundary=...`.
pub fn extract_boundary(content_type: &str) -> Result<String, HttpError> {
    if !content_type
        .to_ascii_lowercase()
        .starts_with("multipart/form-data")
    {
        return Err(HttpError::rejection(StatusCode::UNSUPPORTED_MEDIA_TYPE)
            .with_message(format!("Expected multipart/form-data, got: {content_type}")));
    }

    for part in content_type.split(';') {
        let trimmed = part.trim();
        if let Some(val) = trimmed.strip_prefix("boundary=") {
            let boundary = val.trim_matches('"').to_owned();
            if boundary.is_empty() {
                return Err(HttpError::rejection(StatusCode::BAD_REQUEST)
                    .with_message("Empty multipart boundary"));
            }
            return Ok(boundary);
        }
    }

    Err(HttpError::rejection(StatusCode::BAD_REQUEST).with_message("Missing multipart boundary"))
}

/// Parse a multipart body into [`FormData`].
#[must_use]
pub fn parse_multipart(body: &[u8], boundary: &str) -> FormData {
    let delimiter = format!("--{boundary}");
    let end_delimiter = format!("--{boundary}--");
    let mut form = FormData::new();

    for part_bytes in split_multipart_parts(body, delimiter.as_bytes(), end_delimiter.as_bytes()) {
        let Some((headers_section, part_body)) = split_headers_body(part_bytes) else {
            continue;
        };
        let disposition = parse_content_disposition(headers_section);
        let Some(field_name) = disposition.name else {
            continue;
        };
        let content_type = parse_part_content_type(headers_section);

        if disposition.filename.is_some() {
            form.append_file(
                field_name,
                FilePart {
                    filename: disposition.filename,
                    content_type,
                    data: Bytes::copy_from_slice(part_body),
                },
            );
        } else {
            form.append_text(field_name, String::from_utf8_lossy(part_body).into_owned());
        }
    }

    form
}

/// Encode `form` with `boundary`. The caller advertises the boundary in the content type.
#[must_use]
pub fn encode_multipart(form: &FormData, boundary: &str) -> Bytes {
    let mut buf = BytesMut::new();
    for (name, value) in form.iter() {
        buf.put_slice(format!("--{boundary}\r\n").as_bytes());
        match value {
            FormValue::Text(text) => {
                buf.put_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                buf.put_slice(text.as_bytes());
            }
            FormValue::File(file) => {
                let filename = file.filename.as_deref().unwrap_or("blob");
                buf.put_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
                    )
                    .as_bytes(),
                );
                let ct = file
                    .content_type
                    .as_deref()
                    .unwrap_or("application/octet-stream");
                buf.put_slice(format!("Content-Type: {ct}\r\n\r\n").as_bytes());
                buf.put_slice(&file.data);
            }
        }
        buf.put_slice(b"\r\n");
    }
    buf.put_slice(format!("--{boundary}--\r\n").as_bytes());
    buf.freeze()
}

/// Fresh boundary for an outgoing multipart body.
#[must_use]
pub fn generate_boundary() -> String {
    format!("----hookline{}", ulid::Ulid::new())
}

fn split_multipart_parts<'a>(
    body: &'a [u8],
    delimiter: &[u8],
    end_delimiter: &[u8],
) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut remaining = body;

    // Skip the preamble.
    if let Some(pos) = find_bytes(remaining, delimiter) {
        remaining = skip_crlf(&remaining[pos + delimiter.len()..]);
    } else {
        return parts;
    }

    loop {
        if remaining.starts_with(end_delimiter)
            || remaining
                .strip_prefix(b"\r\n")
                .is_some_and(|r| r.starts_with(end_delimiter))
        {
            break;
        }

        if let Some(pos) = find_bytes(remaining, delimiter) {
            parts.push(strip_trailing_crlf(&remaining[..pos]));
            remaining = skip_crlf(&remaining[pos + delimiter.len()..]);
        } else {
            let part = strip_trailing_crlf(remaining);
            if !part.is_empty() {
                parts.push(part);
            }
            break;
        }
    }

    parts
}

fn split_headers_body(part: &[u8]) -> Option<(&[u8], &[u8])> {
    let separator = b"\r\n\r\n";
    find_bytes(part, separator).map(|pos| (&part[..pos], &part[pos + separator.len()..]))
}

struct ContentDisposition {
    name: Option<String>,
    filename: Option<String>,
}

fn parse_content_disposition(headers: &[u8]) -> ContentDisposition {
    let headers_str = String::from_utf8_lossy(headers);
    let mut name = None;
    let mut filename = None;

    for line in headers_str.split("\r\n") {
        if !line
            .to_ascii_lowercase()
            .starts_with("content-disposition:")
        {
            continue;
        }
        // `filename=` also contains `name=`; look for the bounded form first.
        name = extract_quoted_param(line, "; name")
            .or_else(|| extract_quoted_param(line, ";name"))
            .or_else(|| extract_quoted_param(line, " name"));
        filename = extract_quoted_param(line, "filename");
    }

    ContentDisposition { name, filename }
}

fn parse_part_content_type(headers: &[u8]) -> Option<String> {
    let headers_str = String::from_utf8_lossy(headers);
    headers_str.split("\r\n").find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case("content-type")
            .then(|| value.trim().to_owned())
    })
}

fn extract_quoted_param(header_line: &str, param_name: &str) -> Option<String> {
    let quoted_pattern = format!("{param_name}=\"");
    let unquoted_pattern = format!("{param_name}=");
    let lower_line = header_line.to_ascii_lowercase();

    if let Some(pos) = lower_line.find(&quoted_pattern) {
        let rest = &header_line[pos + quoted_pattern.len()..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_owned());
        }
    }

    if let Some(pos) = lower_line.find(&unquoted_pattern) {
        let rest = &header_line[pos + unquoted_pattern.len()..];
        let end = rest.find(';').unwrap_or(rest.len());
        let val = rest[..end].trim().to_owned();
        if !val.is_empty() {
            return Some(val);
        }
    }

    None
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn skip_crlf(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\r\n").unwrap_or(data)
}

fn strip_trailing_crlf(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r\n").unwrap_or(data)
}
