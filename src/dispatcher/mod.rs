//! # Dispatcher Module
//!
//! The dispatcher is a built application: an immutable route tree plus the hook
//! lists, exposed as one async function from request to response.
//!
//! ## Overview
//!
//! [`Dispatcher::dispatch`] takes an `http::Request<Bytes>` and always returns an
//! `http::Response<Bytes>`. It:
//! - runs global request hooks, before routing
//! - matches the route and either delegates to a mounted dispatch function or runs
//!   the route pipeline
//! - turns every failure, panics included, into a JSON error response
//! - schedules global after-response hooks without awaiting them
//!
//! ## Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant T as Transport
//!     participant D as Dispatcher
//!     participant H as Hooks
//!     participant R as Handler
//!
//!     T->>D: dispatch(request)
//!     D->>H: on_global_request
//!     D->>D: route lookup (404 on miss)
//!     D->>D: deserialize body, params, query
//!     D->>H: on_transform
//!     D->>D: validate body / params / query / headers (400)
//!     D->>H: on_before_handle
//!     D->>R: handler(ctx)
//!     D->>H: on_after_handle
//!     D->>D: validate output (422)
//!     D->>H: on_map_response
//!     D->>D: serialize
//!     D-->>T: response
//!     D-)H: on_global_after_response (spawned)
//! ```
//!
//! Any stage may fail; the pipeline then jumps to `on_global_error` and the default
//! error body. A hook returning a full response skips everything up to the
//! after-response stage, which still fires.
//!
//! ## Error Handling
//!
//! | Failure | Status | Body name |
//! |---------|--------|-----------|
//! | no matching route | 404 | `NotFoundHttpError` |
//! | input rejected by a schema | 400 | `BadRequestHttpError` |
//! | output rejected by a schema | 422 | `UnprocessableEntityHttpError` |
//! | any [`HttpError`](crate::errors::HttpError) | its own | its own |
//! | any other error | 500 | `Error` |
//! | panic | 500 | `Unknown Error` |
//!
//! ## Concurrency
//!
//! A `Dispatcher` is `Clone + Send + Sync`; clones share the compiled routes. Each
//! request owns its [`RequestContext`](crate::context::RequestContext) and awaits its
//! stages strictly in sequence.

mod core;

pub(crate) use core::{DispatcherInner, Route, RouteTarget};
pub use core::{DispatchFn, Dispatcher, HandlerFn};
