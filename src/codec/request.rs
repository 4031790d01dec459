//! Request-side decoding: body by content type, query string, headers.

use bytes::Bytes;
use http::{header, HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use super::multipart::{extract_boundary, parse_multipart, push_repeated, FormData};
use crate::errors::HttpError;

/// A deserialized request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    /// GET request, no content type, or an empty body.
    #[default]
    Empty,
    Json(Value),
    Form(FormData),
    Text(String),
    Bytes(Bytes),
}

impl RequestBody {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            RequestBody::Json(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_form(&self) -> Option<&FormData> {
        match self {
            RequestBody::Form(f) => Some(f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RequestBody::Text(t) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            RequestBody::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// JSON view of the body, as handed to a body schema.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            RequestBody::Empty | RequestBody::Bytes(_) => Value::Null,
            RequestBody::Json(v) => v.clone(),
            RequestBody::Form(f) => f.to_json(),
            RequestBody::Text(t) => Value::String(t.clone()),
        }
    }

    /// Deserialize the JSON view into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_value(self.to_value()).map_err(|e| {
            HttpError::rejection(StatusCode::BAD_REQUEST)
                .with_message("Request body does not match the expected shape")
                .with_cause(e)
        })
    }
}

/// Deserialize `body` according to the request's `Content-Type`.
///
/// GET requests, requests without a content type and empty bodies yield
/// [`RequestBody::Empty`]. An unrecognised content type is a 415.
pub fn deserialize_body(
    method: &Method,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<RequestBody, HttpError> {
    if method == Method::GET {
        return Ok(RequestBody::Empty);
    }
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return Ok(RequestBody::Empty);
    };
    if body.is_empty() {
        return Ok(RequestBody::Empty);
    }
    let mime = content_type.trim().to_ascii_lowercase();

    let parsed = if mime.starts_with("application/json") {
        let value = serde_json::from_slice(body).map_err(|e| {
            HttpError::rejection(StatusCode::BAD_REQUEST)
                .with_message("Invalid JSON body")
                .with_cause(e)
        })?;
        RequestBody::Json(value)
    } else if mime.starts_with("application/x-www-form-urlencoded") {
        let mut form = FormData::new();
        for (k, v) in url::form_urlencoded::parse(body) {
            form.append_text(k, v);
        }
        RequestBody::Form(form)
    } else if mime.starts_with("multipart/form-data") {
        let boundary = extract_boundary(content_type)?;
        RequestBody::Form(parse_multipart(body, &boundary))
    } else if mime.starts_with("text/") {
        RequestBody::Text(String::from_utf8_lossy(body).into_owned())
    } else if mime.starts_with("application/octet-stream") {
        RequestBody::Bytes(body.clone())
    } else {
        return Err(HttpError::rejection(StatusCode::UNSUPPORTED_MEDIA_TYPE)
            .with_message(format!("Unknown content type: \"{content_type}\""))
            .with_info("contentType", content_type));
    };

    debug!(
        content_type = %content_type,
        body_size_bytes = body.len(),
        "Request body deserialized"
    );
    Ok(parsed)
}

/// Parse a raw query string. Repeated keys become arrays.
#[must_use]
pub fn parse_query(query: Option<&str>) -> Map<String, Value> {
    let mut params = Map::new();
    if let Some(query) = query {
        for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
            push_repeated(&mut params, &k, Value::String(v.into_owned()));
        }
    }
    params
}

/// Lowercase header names to string values; repeated headers become arrays.
#[must_use]
pub fn header_record(headers: &HeaderMap) -> Map<String, Value> {
    let mut record = Map::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        push_repeated(&mut record, name.as_str(), Value::String(value));
    }
    record
}
