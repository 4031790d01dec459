//! # Error Taxonomy
//!
//! Three kinds of failure travel through the dispatch pipeline:
//!
//! - [`ValidationError`] - produced by a schema rejecting a value. It never reaches the
//!   wire; the validation call sites in [`crate::validator`] wrap it into a 400 or 422
//!   [`HttpError`] immediately.
//! - [`HttpError`] - the public, typed failure. Handlers and hooks return it (through
//!   `anyhow`) to produce a non-2xx response with a structured JSON body. Every standard
//!   4xx/5xx status has a named constructor such as [`HttpError::not_found`].
//! - Anything else - plain `anyhow` errors map to status 500 using their own message;
//!   panics map to the generic [`UnknownError`] body.
//!
//! ```mermaid
//! flowchart LR
//!     V[ValidationError] -->|input| B400[HttpError 400]
//!     V -->|output| U422[HttpError 422]
//!     H[HttpError] --> W[ErrorBody JSON]
//!     B400 --> W
//!     U422 --> W
//!     A[anyhow::Error] -->|status 500| W
//!     P[panic] -->|UnknownError| W
//! ```
//!
//! ## Wire format
//!
//! ```json
//! {
//!   "status": 404,
//!   "name": "NotFoundHttpError",
//!   "message": "Not Found",
//!   "stack": ["NotFoundHttpError: Not Found"],
//!   "cause": { "status": 500, "name": "Error", "message": "..." }
//! }
//! ```
//!
//! `stack` is only emitted outside production mode (see
//! [`RuntimeConfig`](crate::runtime_config::RuntimeConfig)); any additional info
//! attached with [`HttpError::with_info`] is merged into the top-level object.

use crate::schema::Issue;
use http::StatusCode;
use serde_json::{Map, Value};
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::borrow::Cow;
use std::fmt;

/// Message used for [`HttpError::bad_request`] raised by input validation.
pub const INPUT_VALIDATION_FAILED: &str = "Input validation failed";
/// Message used for [`HttpError::unprocessable_entity`] raised by output validation.
pub const OUTPUT_VALIDATION_FAILED: &str = "Output validation failed";

/// An HTTP-status-carrying error.
///
/// Build one with a named constructor and refine it with the `with_*` methods:
///
/// ```rust
/// use hookline::errors::HttpError;
///
/// let err = HttpError::not_found()
///     .with_message("No such item")
///     .with_info("itemId", 999);
/// assert_eq!(err.status().as_u16(), 404);
/// assert_eq!(err.name(), "NotFoundHttpError");
/// ```
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    name: Cow<'static, str>,
    message: String,
    additional_info: Map<String, Value>,
    cause: Option<anyhow::Error>,
    backtrace: Backtrace,
}

impl HttpError {
    /// Create a generic HTTP error with an explicit status and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self::build(status, message.into(), Backtrace::capture())
    }

    /// A rejection raised by the pipeline itself (no route, bad body, failed validation).
    ///
    /// No backtrace is captured: the frames would only show dispatcher internals.
    pub(crate) fn rejection(status: StatusCode) -> Self {
        let message = status.canonical_reason().unwrap_or("Error").to_string();
        Self::build(status, message, Backtrace::disabled())
    }

    fn build(status: StatusCode, message: String, backtrace: Backtrace) -> Self {
        let name = standard_name(status).unwrap_or("HttpError");
        Self {
            status,
            name: Cow::Borrowed(name),
            message,
            additional_info: Map::new(),
            cause: None,
            backtrace,
        }
    }

    /// Create the named error for `status` with its default message.
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        Self::new(status, status.canonical_reason().unwrap_or("Error"))
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Attach one structured field that is merged into the wire body.
    #[must_use]
    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.additional_info.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_additional_info(mut self, info: Map<String, Value>) -> Self {
        self.additional_info.extend(info);
        self
    }

    /// Record the underlying failure; it is serialized as the `cause` field.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    #[must_use]
    pub fn additional_info(&self) -> &Map<String, Value> {
        &self.additional_info
    }

    #[must_use]
    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_ref()
    }

    /// Render this error as a wire body.
    #[must_use]
    pub fn to_body(&self, expose_stack: bool) -> ErrorBody {
        ErrorBody {
            status: self.status.as_u16(),
            name: self.name.to_string(),
            message: self.message.clone(),
            additional_info: self.additional_info.clone(),
            stack: expose_stack.then(|| stack_lines(&self.name, &self.message, &self.backtrace)),
            cause: self
                .cause
                .as_ref()
                .map(|cause| Box::new(error_body(cause, expose_stack))),
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| &**cause as &(dyn std::error::Error + 'static))
    }
}

macro_rules! http_errors {
    ($( $fn_name:ident => $status:ident, $name:literal; )*) => {
        impl HttpError {
            $(
                #[doc = concat!("`", stringify!($status), "` with its standard reason phrase as message.")]
                #[must_use]
                pub fn $fn_name() -> Self {
                    Self::from_status(StatusCode::$status)
                }
            )*
        }

        fn standard_name(status: StatusCode) -> Option<&'static str> {
            $(
                if status == StatusCode::$status {
                    return Some($name);
                }
            )*
            None
        }
    };
}

http_errors! {
    bad_request => BAD_REQUEST, "BadRequestHttpError";
    unauthorized => UNAUTHORIZED, "UnauthorizedHttpError";
    payment_required => PAYMENT_REQUIRED, "PaymentRequiredHttpError";
    forbidden => FORBIDDEN, "ForbiddenHttpError";
    not_found => NOT_FOUND, "NotFoundHttpError";
    method_not_allowed => METHOD_NOT_ALLOWED, "MethodNotAllowedHttpError";
    not_acceptable => NOT_ACCEPTABLE, "NotAcceptableHttpError";
    proxy_authentication_required => PROXY_AUTHENTICATION_REQUIRED, "ProxyAuthenticationRequiredHttpError";
    request_timeout => REQUEST_TIMEOUT, "RequestTimeoutHttpError";
    conflict => CONFLICT, "ConflictHttpError";
    gone => GONE, "GoneHttpError";
    length_required => LENGTH_REQUIRED, "LengthRequiredHttpError";
    precondition_failed => PRECONDITION_FAILED, "PreconditionFailedHttpError";
    payload_too_large => PAYLOAD_TOO_LARGE, "PayloadTooLargeHttpError";
    uri_too_long => URI_TOO_LONG, "UriTooLongHttpError";
    unsupported_media_type => UNSUPPORTED_MEDIA_TYPE, "UnsupportedMediaTypeHttpError";
    range_not_satisfiable => RANGE_NOT_SATISFIABLE, "RangeNotSatisfiableHttpError";
    expectation_failed => EXPECTATION_FAILED, "ExpectationFailedHttpError";
    im_a_teapot => IM_A_TEAPOT, "ImATeapotHttpError";
    misdirected_request => MISDIRECTED_REQUEST, "MisdirectedRequestHttpError";
    unprocessable_entity => UNPROCESSABLE_ENTITY, "UnprocessableEntityHttpError";
    locked => LOCKED, "LockedHttpError";
    failed_dependency => FAILED_DEPENDENCY, "FailedDependencyHttpError";
    upgrade_required => UPGRADE_REQUIRED, "UpgradeRequiredHttpError";
    precondition_required => PRECONDITION_REQUIRED, "PreconditionRequiredHttpError";
    too_many_requests => TOO_MANY_REQUESTS, "TooManyRequestsHttpError";
    request_header_fields_too_large => REQUEST_HEADER_FIELDS_TOO_LARGE, "RequestHeaderFieldsTooLargeHttpError";
    unavailable_for_legal_reasons => UNAVAILABLE_FOR_LEGAL_REASONS, "UnavailableForLegalReasonsHttpError";
    internal_server_error => INTERNAL_SERVER_ERROR, "InternalServerErrorHttpError";
    not_implemented => NOT_IMPLEMENTED, "NotImplementedHttpError";
    bad_gateway => BAD_GATEWAY, "BadGatewayHttpError";
    service_unavailable => SERVICE_UNAVAILABLE, "ServiceUnavailableHttpError";
    gateway_timeout => GATEWAY_TIMEOUT, "GatewayTimeoutHttpError";
    http_version_not_supported => HTTP_VERSION_NOT_SUPPORTED, "HttpVersionNotSupportedHttpError";
    variant_also_negotiates => VARIANT_ALSO_NEGOTIATES, "VariantAlsoNegotiatesHttpError";
    insufficient_storage => INSUFFICIENT_STORAGE, "InsufficientStorageHttpError";
    loop_detected => LOOP_DETECTED, "LoopDetectedHttpError";
    not_extended => NOT_EXTENDED, "NotExtendedHttpError";
    network_authentication_required => NETWORK_AUTHENTICATION_REQUIRED, "NetworkAuthenticationRequiredHttpError";
}

/// A schema rejected a value.
///
/// Only lives between a schema call and the validation call site, which turns it
/// into an [`HttpError`] via [`ValidationError::into_http_error`].
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub input: Value,
    pub issues: Vec<Issue>,
}

impl ValidationError {
    #[must_use]
    pub fn new(input: Value, issues: Vec<Issue>) -> Self {
        Self { input, issues }
    }

    /// Wrap into an HTTP error carrying `{issues, input}` as additional info.
    #[must_use]
    pub fn into_http_error(self, error: HttpError) -> HttpError {
        let issues = serde_json::to_value(&self.issues).unwrap_or(Value::Array(Vec::new()));
        error.with_info("issues", issues).with_info("input", self.input)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed with {} issue(s)", self.issues.len())?;
        if let Some(first) = self.issues.first() {
            write!(f, ": {first}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// A failure that is not an [`Error`](std::error::Error) at all, i.e. a panic.
#[derive(Debug)]
pub struct UnknownError {
    detail: String,
}

impl UnknownError {
    pub const NAME: &'static str = "Unknown Error";
    pub const MESSAGE: &'static str = "An unknown error occurred";

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { detail }
    }

    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl fmt::Display for UnknownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", Self::MESSAGE, self.detail)
    }
}

impl std::error::Error for UnknownError {}

/// JSON error body sent to clients.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorBody {
    pub status: u16,
    pub name: String,
    pub message: String,
    pub additional_info: Map<String, Value>,
    pub stack: Option<Vec<String>>,
    pub cause: Option<Box<ErrorBody>>,
}

impl ErrorBody {
    /// Flatten into the wire object. Additional info overrides the base fields.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("status".to_string(), Value::from(self.status));
        obj.insert("name".to_string(), Value::String(self.name.clone()));
        obj.insert("message".to_string(), Value::String(self.message.clone()));
        for (k, v) in &self.additional_info {
            obj.insert(k.clone(), v.clone());
        }
        if let Some(stack) = &self.stack {
            obj.insert(
                "stack".to_string(),
                Value::Array(stack.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(cause) = &self.cause {
            obj.insert("cause".to_string(), cause.to_json());
        }
        Value::Object(obj)
    }

    #[inline]
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Classify any pipeline error into its wire body.
#[must_use]
pub fn error_body(err: &anyhow::Error, expose_stack: bool) -> ErrorBody {
    if let Some(http) = err.downcast_ref::<HttpError>() {
        return http.to_body(expose_stack);
    }
    if err.downcast_ref::<UnknownError>().is_some() {
        return ErrorBody {
            status: 500,
            name: UnknownError::NAME.to_string(),
            message: UnknownError::MESSAGE.to_string(),
            additional_info: Map::new(),
            stack: None,
            cause: None,
        };
    }
    let message = err.to_string();
    ErrorBody {
        status: 500,
        name: "Error".to_string(),
        stack: expose_stack.then(|| stack_lines("Error", &message, err.backtrace())),
        message,
        additional_info: Map::new(),
        cause: err
            .source()
            .map(|source| Box::new(source_body(source, expose_stack))),
    }
}

fn source_body(err: &(dyn std::error::Error + 'static), expose_stack: bool) -> ErrorBody {
    if let Some(http) = err.downcast_ref::<HttpError>() {
        return http.to_body(expose_stack);
    }
    ErrorBody {
        status: 500,
        name: "Error".to_string(),
        message: err.to_string(),
        additional_info: Map::new(),
        stack: None,
        cause: err
            .source()
            .map(|source| Box::new(source_body(source, expose_stack))),
    }
}

fn stack_lines(name: &str, message: &str, backtrace: &Backtrace) -> Vec<String> {
    let mut lines = vec![format!("{name}: {message}")];
    if backtrace.status() == BacktraceStatus::Captured {
        lines.extend(
            backtrace
                .to_string()
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from),
        );
    }
    lines
}

/// Status of any pipeline error: the HTTP error's own status, 500 otherwise.
#[must_use]
pub fn status_of(err: &anyhow::Error) -> StatusCode {
    err.downcast_ref::<HttpError>()
        .map(HttpError::status)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn named_constructor_uses_reason_phrase() {
        let err = HttpError::not_found();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.name(), "NotFoundHttpError");
        assert_eq!(err.message(), "Not Found");
    }

    #[test]
    fn every_constructor_maps_to_its_status() {
        assert_eq!(HttpError::bad_request().status().as_u16(), 400);
        assert_eq!(HttpError::unsupported_media_type().status().as_u16(), 415);
        assert_eq!(HttpError::unprocessable_entity().status().as_u16(), 422);
        assert_eq!(HttpError::too_many_requests().status().as_u16(), 429);
        assert_eq!(HttpError::bad_gateway().message(), "Bad Gateway");
        assert_eq!(
            HttpError::network_authentication_required().status().as_u16(),
            511
        );
    }

    #[test]
    fn custom_status_gets_generic_name() {
        let err = HttpError::new(StatusCode::from_u16(499).unwrap(), "closed");
        assert_eq!(err.name(), "HttpError");
    }

    #[test]
    fn additional_info_is_flattened_into_body() {
        let err = HttpError::conflict().with_info("resource", "user");
        let body = err.to_body(false).to_json();
        assert_eq!(
            body,
            json!({"status": 409, "name": "ConflictHttpError", "message": "Conflict", "resource": "user"})
        );
    }

    #[test]
    fn stack_only_when_exposed() {
        let err = HttpError::forbidden();
        assert!(err.to_body(false).stack.is_none());
        let stack = err.to_body(true).stack.unwrap();
        assert_eq!(stack[0], "ForbiddenHttpError: Forbidden");
    }

    #[test]
    fn pipeline_rejections_skip_backtrace_capture() {
        let err = HttpError::rejection(StatusCode::NOT_FOUND).with_message("Route not found: GET /x");
        assert_eq!(err.backtrace.status(), BacktraceStatus::Disabled);
        assert_eq!(err.name(), "NotFoundHttpError");
        assert_eq!(
            err.to_body(true).stack.unwrap(),
            vec!["NotFoundHttpError: Route not found: GET /x".to_string()]
        );
    }

    #[test]
    fn cause_is_serialized_recursively() {
        let inner = HttpError::bad_gateway().with_message("upstream down");
        let outer = HttpError::service_unavailable().with_cause(inner);
        let body = outer.to_body(false).to_json();
        assert_eq!(body["cause"]["status"], 502);
        assert_eq!(body["cause"]["message"], "upstream down");
    }

    #[test]
    fn plain_errors_map_to_500_with_own_message() {
        let err = anyhow::anyhow!("database unreachable");
        let body = error_body(&err, false);
        assert_eq!(body.status, 500);
        assert_eq!(body.name, "Error");
        assert_eq!(body.message, "database unreachable");
        assert_eq!(status_of(&err), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn http_error_survives_anyhow_round_trip() {
        let err: anyhow::Error = HttpError::unauthorized().into();
        assert_eq!(status_of(&err), StatusCode::UNAUTHORIZED);
        assert_eq!(error_body(&err, false).name, "UnauthorizedHttpError");
    }

    #[test]
    fn panics_become_unknown_error() {
        let err: anyhow::Error = UnknownError::from_panic(Box::new("boom")).into();
        let body = error_body(&err, true).to_json();
        assert_eq!(
            body,
            json!({"status": 500, "name": "Unknown Error", "message": "An unknown error occurred"})
        );
    }

    #[test]
    fn validation_error_carries_issues_and_input() {
        let verr = ValidationError::new(
            json!({"age": "x"}),
            vec![Issue::new("/age", "\"x\" is not of type \"integer\"")],
        );
        let http = verr.into_http_error(HttpError::bad_request().with_message(INPUT_VALIDATION_FAILED));
        let body = http.to_body(false).to_json();
        assert_eq!(body["status"], 400);
        assert_eq!(body["message"], "Input validation failed");
        assert_eq!(body["input"], json!({"age": "x"}));
        assert_eq!(body["issues"][0]["path"], "/age");
    }
}
