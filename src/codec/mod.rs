//! # Serialization Codec
//!
//! Converts between wire bytes and the values handlers work with.
//!
//! | Direction | Value | Wire |
//! |-----------|-------|------|
//! | out | [`Reply::Empty`], `null` | no body |
//! | out | string, number, bool | UTF-8 text, `text/plain` |
//! | out | object, array | JSON, `application/json` |
//! | out | [`Reply::Blob`] | raw bytes, the blob's own type |
//! | out | [`FormData`], [`FilePart`], `Vec<FilePart>` | multipart, generated boundary |
//! | in | `application/json` | [`RequestBody::Json`] |
//! | in | `application/x-www-form-urlencoded`, `multipart/form-data` | [`RequestBody::Form`] |
//! | in | `text/*` | [`RequestBody::Text`] |
//! | in | `application/octet-stream` | [`RequestBody::Bytes`] |
//! | in | anything else | 415 Unsupported Media Type |

pub mod multipart;
pub mod request;
pub mod response;

pub use multipart::{FilePart, FormData, FormValue};
pub use request::{deserialize_body, header_record, parse_query, RequestBody};
pub use response::{serialize_reply, Reply, Serialized, StatusResult, APPLICATION_JSON, TEXT_PLAIN};
