//! # hookline
//!
//! **hookline** is a request routing and dispatch library built around a fixed request
//! lifecycle. Applications declare routes with optional schemas, attach hooks to seven
//! lifecycle stages, and compose into each other. A built application is a single
//! async dispatch function: `Request<Bytes>` in, `Response<Bytes>` out.
//!
//! ## Architecture
//!
//! - **[`app`]** - Application builder: routes, hooks, composition, decoration, mounting
//! - **[`dispatcher`]** - The per-request pipeline produced by [`App::build`]
//! - **[`hooks`]** - Lifecycle stages, hook scopes and the hook registry
//! - **[`router`]** - Radix tree path matching with `:param` and `**` wildcard segments
//! - **[`codec`]** - Request body decoding and response serialization
//! - **[`schema`]** - Schema adapters, route definitions and JSON Schema support
//! - **[`validator`]** - Input and output validation on top of a schema adapter
//! - **[`errors`]** - HTTP error taxonomy and the JSON error body
//! - **[`context`]** - The mutable per-request context handed to hooks and handlers
//! - **[`server`]** - hyper listener serving a dispatcher
//! - **[`plugins`]** - Reusable sub-applications (CORS, request logging)
//! - **[`logging`]** - `tracing_subscriber` initialization
//! - **[`runtime_config`]** - Environment driven runtime settings
//! - **`testing`** - In-process test client (`testing` feature)
//!
//! ## Request Lifecycle
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant D as Dispatcher
//!     participant R as Router
//!     participant H as Handler
//!
//!     Client->>D: Request
//!     D->>D: on_global_request
//!     D->>R: match method + path
//!     R-->>D: route + params
//!     D->>D: decode body, on_transform
//!     D->>D: validate body/params/query/headers
//!     D->>D: on_before_handle
//!     D->>H: handler(ctx)
//!     H-->>D: Reply
//!     D->>D: on_after_handle, validate output, on_map_response
//!     D-->>Client: Response
//!     D->>D: on_global_after_response (deferred)
//! ```
//!
//! Any failure jumps to `on_global_error`, which may replace the JSON error body.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hookline::{App, HttpError, Reply};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let users = App::with_prefix("/users")
//!         .get("/:id", |ctx| {
//!             Box::pin(async move {
//!                 let id = ctx.param_str("id").unwrap_or_default().to_string();
//!                 if id == "0" {
//!                     return Err(HttpError::not_found().into());
//!                 }
//!                 Ok(Reply::from(json!({ "id": id })))
//!             })
//!         });
//!
//!     App::with_prefix("/api")
//!         .get("/health", |_ctx| Box::pin(async { Ok(Reply::from(json!({"status": "ok"}))) }))
//!         .use_app(&users)
//!         .listen("127.0.0.1:8080")
//!         .await
//! }
//! ```
//!
//! ## Composition
//!
//! [`App::use_app`] copies a child's routes under the parent's prefix. Global hooks always
//! travel with them; local hooks only when the child is [exported](App::export). Hooks
//! keep their identity, so a plugin used twice still runs once per request.
//!
//! ## Configuration
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `HOOKLINE_ENV` | unset | `production` hides error stacks |
//! | `HOOKLINE_STRICT_ROUTES` | `false` | duplicate routes fail [`App::build`] |
//! | `HOOKLINE_ORIGIN` | `http://localhost` | origin for requests with a relative URI |
//! | `HOOKLINE_LOG_*` | see [`logging`] | subscriber setup for binaries |

pub mod app;
pub mod codec;
pub mod context;
pub mod dispatcher;
pub mod errors;
pub mod hooks;
pub mod ids;
pub mod logging;
pub mod plugins;
pub mod router;
pub mod runtime_config;
pub mod schema;
pub mod server;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod validator;

pub use app::{App, AppOptions, BuildError, RouteInfo};
pub use codec::{FormData, Reply, RequestBody};
pub use context::RequestContext;
pub use dispatcher::Dispatcher;
pub use errors::{ErrorBody, HttpError, UnknownError, ValidationError};
pub use hooks::{BoxFuture, HookOutcome, HookScope, Stage};
pub use runtime_config::RuntimeConfig;
pub use schema::{JsonSchema, JsonSchemaAdapter, RouteDef, Schema, SchemaAdapter};
pub use server::{HttpServer, ServerHandle};
