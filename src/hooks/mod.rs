//! # Lifecycle Hooks
//!
//! Every matched request walks the same fixed pipeline. Hooks plug into seven of its
//! stages:
//!
//! ```mermaid
//! flowchart TD
//!     A[on_global_request] --> B{route match}
//!     B -->|no match| E[on_global_error]
//!     B --> C[on_transform]
//!     C --> D[input validation]
//!     D --> F[on_before_handle]
//!     F --> G[handler]
//!     G --> H[on_after_handle]
//!     H --> I[output validation]
//!     I --> J[on_map_response]
//!     J --> K[serialize]
//!     K --> L[on_global_after_response, deferred]
//!     E --> L
//! ```
//!
//! ## Return contracts
//!
//! | Stage | Callback returns |
//! |-------|------------------|
//! | global request, transform, before handle | [`HookOutcome`]: continue, patch the context, or respond |
//! | after handle, map response | `Option<Reply>`: replace the value, or short-circuit with `Reply::Response` |
//! | global error | `Option<Response>`: replace the default error response |
//! | global after response | `()`; runs after the response is returned |
//!
//! ## Scope
//!
//! `on_global_*` hooks are [`HookScope::Global`] and always propagate to a parent
//! application on composition. The rest are [`HookScope::Local`] and propagate only
//! from applications marked exported. Propagated hooks keep their [`HookId`], so
//! a hook reaching a parent twice is registered once.
//!
//! [`HookId`]: crate::ids::HookId

mod core;
mod registry;

pub use core::{
    AfterResponseHookFn, ErrorHookFn, Hook, HookOutcome, HookScope, RequestHookFn,
    ResponseHookFn, Stage,
};
pub use futures::future::BoxFuture;
pub use registry::HookRegistry;
