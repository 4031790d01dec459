//! # Server Module
//!
//! Binds a built [`Dispatcher`](crate::dispatcher::Dispatcher) to a TCP port with
//! hyper 1. Connections are served by `hyper-util`'s auto builder (HTTP/1.1 and
//! HTTP/2); request bodies are buffered with `http-body-util` before dispatch, up to
//! a configurable limit.
//!
//! ```rust,no_run
//! use hookline::app::App;
//! use hookline::server::HttpServer;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let dispatcher = App::new().build()?;
//! let handle = HttpServer::new(dispatcher).start("127.0.0.1:8080").await?;
//! handle.wait_ready().await?;
//! handle.shutdown_on_ctrl_c().await?;
//! # Ok(())
//! # }
//! ```

pub mod http_server;
pub mod service;

pub use http_server::{HttpServer, ServerHandle, DEFAULT_MAX_BODY_BYTES};
pub use service::DispatchService;
