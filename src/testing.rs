//! In-process test client.
//!
//! Drives a [`Dispatcher`] directly, without a socket. Only built with the `testing`
//! feature; helpers panic on malformed test input instead of returning errors.
//!
//! ```rust
//! use hookline::app::App;
//! use hookline::codec::Reply;
//! use hookline::testing::TestClient;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let app = App::new().get("/health", |_ctx| {
//!     Box::pin(async { Ok(Reply::from(json!({"status": "ok"}))) })
//! });
//! let client = TestClient::new(app.build().unwrap());
//! let res = client.get("/health").await;
//! assert_eq!(res.status(), 200);
//! assert_eq!(res.json(), json!({"status": "ok"}));
//! # }
//! ```

#![allow(clippy::expect_used)]

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method, Request, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::codec::APPLICATION_JSON;
use crate::dispatcher::Dispatcher;

/// Sends requests straight into a dispatcher.
#[derive(Debug, Clone)]
pub struct TestClient {
    dispatcher: Dispatcher,
}

impl TestClient {
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, HeaderMap::new(), Bytes::new()).await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.send(Method::DELETE, uri, HeaderMap::new(), Bytes::new())
            .await
    }

    /// POST `body` as JSON.
    ///
    /// # Panics
    ///
    /// If `body` cannot be serialized.
    pub async fn post_json<T: Serialize>(&self, uri: &str, body: &T) -> TestResponse {
        self.json(Method::POST, uri, body).await
    }

    /// PUT `body` as JSON.
    ///
    /// # Panics
    ///
    /// If `body` cannot be serialized.
    pub async fn put_json<T: Serialize>(&self, uri: &str, body: &T) -> TestResponse {
        self.json(Method::PUT, uri, body).await
    }

    async fn json<T: Serialize>(&self, method: Method, uri: &str, body: &T) -> TestResponse {
        let payload = serde_json::to_vec(body).expect("test body serializes");
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, http::HeaderValue::from_static(APPLICATION_JSON));
        self.send(method, uri, headers, Bytes::from(payload)).await
    }

    /// Send a request with explicit method, headers and body.
    ///
    /// # Panics
    ///
    /// If `uri` is not a valid request URI.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> TestResponse {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .body(body)
            .expect("valid test request");
        *request.headers_mut() = headers;
        self.request(request).await
    }

    pub async fn request(&self, request: Request<Bytes>) -> TestResponse {
        TestResponse(self.dispatcher.dispatch(request).await)
    }
}

/// A dispatched response with assertion-friendly accessors.
#[derive(Debug)]
pub struct TestResponse(pub Response<Bytes>);

impl TestResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.0.status()
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.0.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.0.headers()
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        self.0.body()
    }

    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.0.body()).into_owned()
    }

    /// Body parsed as JSON.
    ///
    /// # Panics
    ///
    /// If the body is not JSON.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_slice(self.0.body()).expect("response body is JSON")
    }

    #[must_use]
    pub fn into_inner(self) -> Response<Bytes> {
        self.0
    }
}
