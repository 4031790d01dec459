//! Tests for request body decoding and response encoding through the dispatcher

mod common;

use bytes::Bytes;
use common::{app, client};
use hookline::codec::multipart::{encode_multipart, extract_boundary, parse_multipart};
use hookline::codec::{FilePart, FormData, RequestBody};
use hookline::Reply;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::json;

fn content_type(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_str(value).expect("valid header"));
    headers
}

/// Echoes whatever body representation the codec produced.
fn echo_app() -> hookline::App {
    app().post("/echo", |ctx| {
        let reply = match &ctx.body {
            RequestBody::Empty => Reply::Empty,
            RequestBody::Json(value) => Reply::from(value.clone()),
            RequestBody::Text(text) => Reply::from(text.clone()),
            RequestBody::Form(form) => Reply::from(form.to_json()),
            RequestBody::Bytes(bytes) => Reply::blob(bytes.clone(), "application/octet-stream"),
        };
        Box::pin(async move { Ok(reply) })
    })
}

#[tokio::test]
async fn test_json_round_trip() {
    let client = client(echo_app());
    let payload = json!({"name": "widget", "tags": ["a", "b"], "price": 9.5});
    let res = client.post_json("/echo", &payload).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.header("content-type"), Some("application/json"));
    assert_eq!(res.json(), payload);
}

#[tokio::test]
async fn test_text_round_trip() {
    let client = client(echo_app());
    let res = client
        .send(
            Method::POST,
            "/echo",
            content_type("text/plain; charset=utf-8"),
            Bytes::from_static(b"hello there"),
        )
        .await;
    assert_eq!(res.header("content-type"), Some("text/plain"));
    assert_eq!(res.text(), "hello there");
}

#[tokio::test]
async fn test_empty_body_and_empty_reply() {
    let client = client(echo_app());
    let res = client
        .send(Method::POST, "/echo", HeaderMap::new(), Bytes::from_static(b"ignored"))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.body().is_empty());
    assert!(res.header("content-type").is_none());
}

#[tokio::test]
async fn test_octet_stream_round_trip() {
    let client = client(echo_app());
    let res = client
        .send(
            Method::POST,
            "/echo",
            content_type("application/octet-stream"),
            Bytes::from_static(&[0, 159, 146, 150]),
        )
        .await;
    assert_eq!(res.header("content-type"), Some("application/octet-stream"));
    assert_eq!(res.body().as_ref(), &[0, 159, 146, 150]);
}

#[tokio::test]
async fn test_urlencoded_form() {
    let client = client(echo_app());
    let res = client
        .send(
            Method::POST,
            "/echo",
            content_type("application/x-www-form-urlencoded"),
            Bytes::from_static(b"name=ada+lovelace&tag=a&tag=b"),
        )
        .await;
    assert_eq!(
        res.json(),
        json!({"name": "ada lovelace", "tag": ["a", "b"]})
    );
}

#[tokio::test]
async fn test_multipart_form_in_and_out() {
    let mut form = FormData::new();
    form.append_text("title", "report");
    form.append_file(
        "file",
        FilePart::new("report.csv", Bytes::from_static(b"a,b\n1,2\n")).with_content_type("text/csv"),
    );
    let boundary = "----hooklineTestBoundary";
    let body = encode_multipart(&form, boundary);

    let client = client(app().post("/upload", |ctx| {
        let reply = match ctx.body.as_form() {
            Some(form) => {
                let mut out = FormData::new();
                out.append_text("title", form.text("title").unwrap_or_default());
                if let Some(file) = form.file("file") {
                    out.append_file("file", file.clone());
                }
                Reply::from(out)
            }
            None => Reply::from("no form"),
        };
        Box::pin(async move { Ok(reply) })
    }));

    let res = client
        .send(
            Method::POST,
            "/upload",
            content_type(&format!("multipart/form-data; boundary={boundary}")),
            body,
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let response_type = res.header("content-type").expect("content type").to_string();
    assert!(response_type.starts_with("multipart/form-data; boundary="));
    let parsed = parse_multipart(res.body(), &extract_boundary(&response_type).expect("boundary"));
    assert_eq!(parsed.text("title"), Some("report"));
    let file = parsed.file("file").expect("file part");
    assert_eq!(file.filename.as_deref(), Some("report.csv"));
    assert_eq!(file.content_type.as_deref(), Some("text/csv"));
    assert_eq!(file.data.as_ref(), b"a,b\n1,2\n");
}

#[tokio::test]
async fn test_unknown_content_type_is_415() {
    let client = client(echo_app());
    let res = client
        .send(
            Method::POST,
            "/echo",
            content_type("application/xml"),
            Bytes::from_static(b"<a/>"),
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body = res.json();
    assert_eq!(body["name"], "UnsupportedMediaTypeHttpError");
    assert_eq!(body["contentType"], "application/xml");
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let client = client(echo_app());
    let res = client
        .send(
            Method::POST,
            "/echo",
            content_type("application/json"),
            Bytes::from_static(b"{\"unterminated\": "),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["message"], "Invalid JSON body");
}

#[tokio::test]
async fn test_scalar_replies_are_text() {
    let client = client(
        app()
            .get("/n", |_ctx| Box::pin(async { Ok(Reply::from(42)) }))
            .get("/b", |_ctx| Box::pin(async { Ok(Reply::from(false)) }))
            .get("/none", |_ctx| Box::pin(async { Ok(Reply::from(None::<String>)) })),
    );

    let res = client.get("/n").await;
    assert_eq!(res.header("content-type"), Some("text/plain"));
    assert_eq!(res.text(), "42");
    assert_eq!(client.get("/b").await.text(), "false");
    assert!(client.get("/none").await.body().is_empty());
}

#[tokio::test]
async fn test_set_content_type_overrides_codec() {
    let client = client(app().get("/page", |ctx| {
        ctx.set
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        Box::pin(async { Ok(Reply::from("<p>hi</p>")) })
    }));

    let res = client.get("/page").await;
    assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
    assert_eq!(res.text(), "<p>hi</p>");
}
