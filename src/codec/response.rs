//! Response-side encoding of handler and hook return values.

use bytes::Bytes;
use http::{Response, StatusCode};
use serde::Serialize;
use serde_json::Value;

use super::multipart::{encode_multipart, generate_boundary, FilePart, FormData};

pub const TEXT_PLAIN: &str = "text/plain";
pub const APPLICATION_JSON: &str = "application/json";

/// A value produced by a handler or a response-stage hook.
#[derive(Debug, Default)]
pub enum Reply {
    /// No body.
    #[default]
    Empty,
    /// Strings and scalars go out as text, objects and arrays as JSON.
    Value(Value),
    /// Raw bytes with their own content type.
    Blob {
        data: Bytes,
        content_type: Option<String>,
    },
    /// Multipart form body.
    Form(FormData),
    /// A finished response; returned as-is.
    Response(Response<Bytes>),
    /// A body paired with an explicit status, see
    /// [`RequestContext::status`](crate::context::RequestContext::status).
    Status(StatusResult),
}

impl Reply {
    /// Serialize `value` into a [`Reply::Value`].
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Reply::Value)
    }

    pub fn blob(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Reply::Blob {
            data: data.into(),
            content_type: Some(content_type.into()),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_response(&self) -> bool {
        matches!(self, Reply::Response(_))
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Reply::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Opaque status + body pair.
///
/// Only [`RequestContext::status`](crate::context::RequestContext::status) builds one.
#[derive(Debug)]
pub struct StatusResult {
    pub(crate) status: StatusCode,
    pub(crate) body: Box<Reply>,
}

impl StatusResult {
    pub(crate) fn new(status: StatusCode, body: Reply) -> Self {
        Self {
            status,
            body: Box::new(body),
        }
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    #[must_use]
    pub fn body(&self) -> &Reply {
        &self.body
    }

    pub(crate) fn into_parts(self) -> (StatusCode, Reply) {
        (self.status, *self.body)
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Empty
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Value(value)
    }
}

impl From<&str> for Reply {
    fn from(value: &str) -> Self {
        Reply::Value(Value::String(value.to_string()))
    }
}

impl From<String> for Reply {
    fn from(value: String) -> Self {
        Reply::Value(Value::String(value))
    }
}

macro_rules! reply_from_scalar {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Reply {
                fn from(value: $t) -> Self {
                    Reply::Value(Value::from(value))
                }
            }
        )*
    };
}

reply_from_scalar!(bool, i32, i64, u32, u64, f64);

impl From<FormData> for Reply {
    fn from(form: FormData) -> Self {
        Reply::Form(form)
    }
}

/// A single file goes out as a form with one `file` field.
impl From<FilePart> for Reply {
    fn from(file: FilePart) -> Self {
        let mut form = FormData::new();
        form.append_file("file", file);
        Reply::Form(form)
    }
}

/// A file list goes out as a form with repeated `files` fields.
impl From<Vec<FilePart>> for Reply {
    fn from(files: Vec<FilePart>) -> Self {
        let mut form = FormData::new();
        for file in files {
            form.append_file("files", file);
        }
        Reply::Form(form)
    }
}

impl From<Response<Bytes>> for Reply {
    fn from(response: Response<Bytes>) -> Self {
        Reply::Response(response)
    }
}

impl From<StatusResult> for Reply {
    fn from(result: StatusResult) -> Self {
        Reply::Status(result)
    }
}

impl<T: Into<Reply>> From<Option<T>> for Reply {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// Encoded body and the content type the codec picked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Serialized {
    pub body: Bytes,
    pub content_type: Option<String>,
}

/// Encode a reply. `None` means "no body".
///
/// [`Reply::Response`] is never encoded; callers return it untouched.
#[must_use]
pub fn serialize_reply(reply: &Reply) -> Option<Serialized> {
    match reply {
        Reply::Empty | Reply::Response(_) => None,
        Reply::Status(result) => serialize_reply(result.body()),
        Reply::Value(value) => serialize_value(value),
        Reply::Blob { data, content_type } => Some(Serialized {
            body: data.clone(),
            content_type: content_type.clone().filter(|ct| !ct.is_empty()),
        }),
        Reply::Form(form) => {
            let boundary = generate_boundary();
            Some(Serialized {
                body: encode_multipart(form, &boundary),
                content_type: Some(format!("multipart/form-data; boundary={boundary}")),
            })
        }
    }
}

fn serialize_value(value: &Value) -> Option<Serialized> {
    let (body, content_type) = match value {
        Value::Null => return None,
        Value::String(s) => (Bytes::from(s.clone()), TEXT_PLAIN),
        Value::Number(n) => (Bytes::from(n.to_string()), TEXT_PLAIN),
        Value::Bool(b) => (Bytes::from(b.to_string()), TEXT_PLAIN),
        Value::Array(_) | Value::Object(_) => (Bytes::from(value.to_string()), APPLICATION_JSON),
    };
    Some(Serialized {
        body,
        content_type: Some(content_type.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::multipart::{extract_boundary, parse_multipart};
    use serde_json::json;

    #[test]
    fn null_and_empty_have_no_body() {
        assert!(serialize_reply(&Reply::Empty).is_none());
        assert!(serialize_reply(&Reply::Value(Value::Null)).is_none());
        assert!(serialize_reply(&Reply::from(None::<String>)).is_none());
    }

    #[test]
    fn scalars_are_plain_text() {
        let s = serialize_reply(&Reply::from("hello")).unwrap();
        assert_eq!(s.body.as_ref(), b"hello");
        assert_eq!(s.content_type.as_deref(), Some(TEXT_PLAIN));

        let n = serialize_reply(&Reply::from(42)).unwrap();
        assert_eq!(n.body.as_ref(), b"42");
        assert_eq!(n.content_type.as_deref(), Some(TEXT_PLAIN));

        let b = serialize_reply(&Reply::from(true)).unwrap();
        assert_eq!(b.body.as_ref(), b"true");
    }

    #[test]
    fn objects_are_json() {
        let value = json!({"id": 1, "tags": ["a", "b"]});
        let s = serialize_reply(&Reply::from(value.clone())).unwrap();
        assert_eq!(s.content_type.as_deref(), Some(APPLICATION_JSON));
        let back: Value = serde_json::from_slice(&s.body).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn blobs_keep_their_type() {
        let s = serialize_reply(&Reply::blob(vec![1u8, 2], "image/png")).unwrap();
        assert_eq!(s.content_type.as_deref(), Some("image/png"));
        assert_eq!(s.body.len(), 2);
    }

    #[test]
    fn files_become_multipart_with_boundary() {
        let reply = Reply::from(FilePart::new("a.txt", "abc"));
        let s = serialize_reply(&reply).unwrap();
        let ct = s.content_type.unwrap();
        let boundary = extract_boundary(&ct).unwrap();
        let form = parse_multipart(&s.body, &boundary);
        assert_eq!(form.file("file").unwrap().data.as_ref(), b"abc");
    }

    #[test]
    fn status_result_serializes_its_body() {
        let result = StatusResult::new(StatusCode::CREATED, Reply::from(json!({"ok": true})));
        let s = serialize_reply(&Reply::Status(result)).unwrap();
        assert_eq!(s.content_type.as_deref(), Some(APPLICATION_JSON));
    }
}
