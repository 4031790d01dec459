//! # Request Context
//!
//! One [`RequestContext`] is created per incoming request and handed by `&mut` to
//! every hook and to the handler, in strict sequence. It carries:
//!
//! - identity: the original request, path, method, request id and a lazily
//!   computed absolute [`url`](RequestContext::url);
//! - pipeline state: matched route, params, query, headers, parsed body, the
//!   response value in progress and the error being handled;
//! - [`set`](RequestContext::set): status and headers applied to the final response;
//! - state: decorated values and keys merged in by context patches.
//!
//! ```rust
//! use bytes::Bytes;
//! use hookline::context::RequestContext;
//! use serde_json::{json, Map};
//!
//! let request = http::Request::get("/users/1?verbose=true").body(Bytes::new()).unwrap();
//! let mut ctx = RequestContext::new(request, "http://localhost".into());
//! assert_eq!(ctx.query["verbose"], "true");
//!
//! let mut patch = Map::new();
//! patch.insert("user".into(), json!({"id": 1}));
//! ctx.apply_patch(patch);
//! assert_eq!(ctx.get("user"), Some(&json!({"id": 1})));
//! ```

use bytes::Bytes;
use http::{HeaderMap, Method, Request, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use crate::codec::{header_record, parse_query, Reply, RequestBody, StatusResult};
use crate::ids::RequestId;

/// Header a caller-supplied request id is read from.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Status and headers for the response being built.
#[derive(Debug, Clone)]
pub struct ResponseSet {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl Default for ResponseSet {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        }
    }
}

/// Per-request state threaded through the lifecycle.
#[derive(Debug)]
pub struct RequestContext {
    request: Request<Bytes>,
    path: String,
    method: Method,
    origin: Arc<str>,
    request_id: RequestId,
    started_at: Instant,
    /// Pattern of the matched route, once routing succeeded.
    pub route: Option<String>,
    pub params: Map<String, Value>,
    pub query: Map<String, Value>,
    /// Lowercase header names to values; replaced by the validated record when the
    /// route declares a headers schema.
    pub headers: Map<String, Value>,
    pub body: RequestBody,
    /// Value the handler and response hooks have produced so far.
    pub response: Reply,
    /// Error being handled; set before global error hooks run.
    pub error: Option<anyhow::Error>,
    pub set: ResponseSet,
    state: Map<String, Value>,
}

impl RequestContext {
    pub fn new(request: Request<Bytes>, origin: Arc<str>) -> Self {
        let request_id = RequestId::from_header_or_new(
            request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok()),
        );
        Self {
            path: request.uri().path().to_string(),
            method: request.method().clone(),
            query: parse_query(request.uri().query()),
            headers: header_record(request.headers()),
            request,
            origin,
            request_id,
            started_at: Instant::now(),
            route: None,
            params: Map::new(),
            body: RequestBody::Empty,
            response: Reply::Empty,
            error: None,
            set: ResponseSet::default(),
            state: Map::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    #[inline]
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Absolute request URL; relative request URIs are resolved against the origin.
    pub fn url(&self) -> Result<Url, url::ParseError> {
        let uri = self.request.uri();
        if uri.scheme().is_some() {
            return Url::parse(&uri.to_string());
        }
        let base = Url::parse(&self.origin)?;
        let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
        base.join(path_and_query)
    }

    /// Raw request header (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// String value of a path param.
    #[must_use]
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    /// Read a decorated or patched value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Read a decorated or patched value into a concrete type.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.state
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.state.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn state(&self) -> &Map<String, Value> {
        &self.state
    }

    /// Shallow-merge a context patch.
    ///
    /// `params`, `query` and `headers` replace those records when given objects;
    /// `body` replaces the parsed body with JSON. Every other key lands in state.
    pub fn apply_patch(&mut self, patch: Map<String, Value>) {
        for (key, value) in patch {
            match (key.as_str(), value) {
                ("params", Value::Object(map)) => self.params = map,
                ("query", Value::Object(map)) => self.query = map,
                ("headers", Value::Object(map)) => self.headers = map,
                ("body", value) => self.body = RequestBody::Json(value),
                (_, value) => {
                    self.state.insert(key, value);
                }
            }
        }
    }

    /// Pair a body with a status code.
    ///
    /// Routes whose output is declared per status must answer with this.
    pub fn status(&self, status: StatusCode, body: impl Into<Reply>) -> Reply {
        Reply::Status(StatusResult::new(status, body.into()))
    }

    /// Copy of the incoming request for delegation to a mounted dispatch function.
    ///
    /// Extensions are not carried over.
    pub(crate) fn clone_request(&self) -> Request<Bytes> {
        let mut req = Request::new(self.request.body().clone());
        *req.method_mut() = self.request.method().clone();
        *req.uri_mut() = self.request.uri().clone();
        *req.version_mut() = self.request.version();
        *req.headers_mut() = self.request.headers().clone();
        req
    }
}
