//! Tests for the hyper listener
//!
//! Requests are written by hand over a `TcpStream` with `Connection: close`, so the
//! whole response can be read to EOF.

mod common;

use common::{app, Counter};
use hookline::server::HttpServer;
use hookline::{HookOutcome, Reply};
use http::HeaderValue;
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn roundtrip(addr: SocketAddr, request: String) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(request.as_bytes()).await.expect("write request");
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.expect("read response");
    String::from_utf8_lossy(&buf).into_owned()
}

fn get(path: &str) -> String {
    format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
}

fn post(path: &str, content_type: &str, body: &str) -> String {
    format!(
        "POST {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\
         Content-Type: {content_type}\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
}

fn demo() -> hookline::Dispatcher {
    app()
        .get("/health", |_ctx| {
            Box::pin(async { Ok(Reply::from(json!({"status": "ok"}))) })
        })
        .post("/echo", |ctx| {
            let body = ctx.body.to_value();
            Box::pin(async move { Ok(Reply::from(body)) })
        })
        .build()
        .expect("demo app builds")
}

#[tokio::test]
async fn test_serves_requests_over_tcp() {
    let handle = HttpServer::new(demo())
        .start("127.0.0.1:0")
        .await
        .expect("server starts");
    handle.wait_ready().await.expect("server ready");
    let addr = handle.local_addr();

    let response = roundtrip(addr, get("/health")).await;
    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert!(response.to_ascii_lowercase().contains("content-type: application/json"));
    assert!(response.ends_with(r#"{"status":"ok"}"#), "{response}");

    let response = roundtrip(addr, post("/echo", "application/json", r#"{"a":1}"#)).await;
    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert!(response.ends_with(r#"{"a":1}"#), "{response}");

    let response = roundtrip(addr, get("/missing")).await;
    assert!(response.starts_with("HTTP/1.1 404 Not Found"), "{response}");
    assert!(response.contains("NotFoundHttpError"));

    handle.stop().await;
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let handle = HttpServer::new(demo())
        .max_body_bytes(16)
        .start("127.0.0.1:0")
        .await
        .expect("server starts");
    handle.wait_ready().await.expect("server ready");

    let body = "x".repeat(64);
    let response = roundtrip(handle.local_addr(), post("/echo", "text/plain", &body)).await;
    assert!(response.starts_with("HTTP/1.1 413 Payload Too Large"), "{response}");
    assert!(response.contains("PayloadTooLargeHttpError"));

    handle.stop().await;
}

#[tokio::test]
async fn test_oversized_body_goes_through_global_hooks() {
    let completed = Counter::new();
    let after_calls = completed.clone();
    let failed = Counter::new();
    let error_calls = failed.clone();
    let dispatcher = app()
        .on_global_request(|ctx| {
            ctx.set
                .headers
                .insert("x-staged", HeaderValue::from_static("yes"));
            Box::pin(async { Ok(HookOutcome::Continue) })
        })
        .on_global_error(move |_ctx| {
            error_calls.hit();
            Box::pin(async { Ok(None) })
        })
        .on_global_after_response(move |ctx| {
            if ctx.set.status == http::StatusCode::PAYLOAD_TOO_LARGE {
                after_calls.hit();
            }
            Box::pin(async { Ok(()) })
        })
        .post("/echo", |_ctx| Box::pin(async { Ok(Reply::Empty) }))
        .build()
        .expect("app builds");
    let handle = HttpServer::new(dispatcher)
        .max_body_bytes(16)
        .start("127.0.0.1:0")
        .await
        .expect("server starts");
    handle.wait_ready().await.expect("server ready");

    let body = "x".repeat(64);
    let response = roundtrip(handle.local_addr(), post("/echo", "text/plain", &body)).await;
    assert!(response.starts_with("HTTP/1.1 413 Payload Too Large"), "{response}");
    assert!(response.to_ascii_lowercase().contains("x-staged: yes"), "{response}");
    assert!(response.contains(r#""limitBytes":16"#), "{response}");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(failed.get(), 1);
    assert_eq!(completed.get(), 1);

    handle.stop().await;
}

#[tokio::test]
async fn test_stop_closes_listener() {
    let handle = HttpServer::new(demo())
        .start("127.0.0.1:0")
        .await
        .expect("server starts");
    handle.wait_ready().await.expect("server ready");
    let addr = handle.local_addr();
    handle.stop().await;

    assert!(TcpStream::connect(addr).await.is_err());
}
