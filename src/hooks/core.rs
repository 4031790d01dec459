use bytes::Bytes;
use futures::future::BoxFuture;
use http::Response;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::codec::Reply;
use crate::context::RequestContext;
use crate::ids::HookId;

/// The seven lifecycle stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    GlobalRequest,
    Transform,
    BeforeHandle,
    AfterHandle,
    MapResponse,
    GlobalError,
    GlobalAfterResponse,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::GlobalRequest,
        Stage::Transform,
        Stage::BeforeHandle,
        Stage::AfterHandle,
        Stage::MapResponse,
        Stage::GlobalError,
        Stage::GlobalAfterResponse,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::GlobalRequest => "on_global_request",
            Stage::Transform => "on_transform",
            Stage::BeforeHandle => "on_before_handle",
            Stage::AfterHandle => "on_after_handle",
            Stage::MapResponse => "on_map_response",
            Stage::GlobalError => "on_global_error",
            Stage::GlobalAfterResponse => "on_global_after_response",
        }
    }

    /// Scope hooks registered for this stage get.
    #[must_use]
    pub fn scope(self) -> HookScope {
        match self {
            Stage::GlobalRequest | Stage::GlobalError | Stage::GlobalAfterResponse => {
                HookScope::Global
            }
            _ => HookScope::Local,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far a hook propagates when its application is composed into a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookScope {
    /// Always flows up to parents.
    Global,
    /// Flows up only from exported applications.
    Local,
}

/// Result of a request-stage hook (global request, transform, before handle).
#[derive(Debug, Default)]
pub enum HookOutcome {
    /// Nothing to do.
    #[default]
    Continue,
    /// Shallow-merge these keys onto the request context.
    Patch(Map<String, Value>),
    /// Stop the pipeline and send this response.
    Respond(Response<Bytes>),
}

impl HookOutcome {
    /// Patch with a single key.
    pub fn patch(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut map = Map::new();
        map.insert(key.into(), value.into());
        HookOutcome::Patch(map)
    }
}

impl From<()> for HookOutcome {
    fn from(_: ()) -> Self {
        HookOutcome::Continue
    }
}

impl From<Map<String, Value>> for HookOutcome {
    fn from(map: Map<String, Value>) -> Self {
        HookOutcome::Patch(map)
    }
}

impl From<Response<Bytes>> for HookOutcome {
    fn from(response: Response<Bytes>) -> Self {
        HookOutcome::Respond(response)
    }
}

/// Global request, transform and before-handle callbacks.
pub type RequestHookFn = dyn for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, anyhow::Result<HookOutcome>>
    + Send
    + Sync;

/// After-handle and map-response callbacks. `Some` replaces the current response
/// value; `Some(Reply::Response(_))` short-circuits.
pub type ResponseHookFn =
    dyn for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, anyhow::Result<Option<Reply>>> + Send + Sync;

/// Global error callbacks. `Some` replaces the default error response.
pub type ErrorHookFn = dyn for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, anyhow::Result<Option<Response<Bytes>>>>
    + Send
    + Sync;

/// Deferred after-response callbacks.
pub type AfterResponseHookFn =
    dyn for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync;

/// A registered callback with a stable identity.
pub struct Hook<F: ?Sized> {
    id: HookId,
    scope: HookScope,
    callback: Arc<F>,
}

impl<F: ?Sized> Hook<F> {
    pub fn new(scope: HookScope, callback: Arc<F>) -> Self {
        Self {
            id: HookId::new(),
            scope,
            callback,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> HookId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn scope(&self) -> HookScope {
        self.scope
    }

    #[inline]
    #[must_use]
    pub fn callback(&self) -> &F {
        &self.callback
    }
}

impl<F: ?Sized> Clone for Hook<F> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            scope: self.scope,
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<F: ?Sized> fmt::Debug for Hook<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
