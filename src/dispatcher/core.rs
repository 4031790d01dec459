//! Dispatcher core: the per-request pipeline.

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Request, Response, StatusCode};
use serde_json::Value;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::codec::{deserialize_body, serialize_reply, Reply, RequestBody, APPLICATION_JSON};
use crate::context::RequestContext;
use crate::errors::{error_body, status_of, ErrorBody, HttpError, UnknownError};
use crate::hooks::{Hook, HookOutcome, HookRegistry, RequestHookFn, ResponseHookFn, Stage};
use crate::router::{RadixRouter, RouteMethod};
use crate::runtime_config::RuntimeConfig;
use crate::schema::{RouteDef, SchemaAdapter, SchemaMeta};
use crate::validator::{validate_input, validate_output, validate_record};

/// Route handler callback.
pub type HandlerFn =
    dyn for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, anyhow::Result<Reply>> + Send + Sync;

/// A whole dispatch function, as produced by [`Dispatcher::into_fn`] or accepted by
/// [`App::mount`](crate::app::App::mount).
pub type DispatchFn =
    Arc<dyn Fn(Request<Bytes>) -> BoxFuture<'static, Response<Bytes>> + Send + Sync>;

/// What a matched route does.
#[derive(Clone)]
pub(crate) enum RouteTarget {
    Handler(Arc<HandlerFn>),
    /// Delegate the raw request to another dispatch function.
    Mount(DispatchFn),
}

/// Everything the pipeline needs about one declared route.
///
/// `hooks` is the declaring application's registry as it stood when the route was
/// registered; the local stages run from it.
#[derive(Clone)]
pub(crate) struct Route {
    pub(crate) method: RouteMethod,
    pub(crate) pattern: String,
    pub(crate) def: RouteDef,
    pub(crate) target: RouteTarget,
    pub(crate) hooks: HookRegistry,
}

impl Route {
    #[inline]
    pub(crate) fn is_mount(&self) -> bool {
        matches!(self.target, RouteTarget::Mount(_))
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("mounted", &self.is_mount())
            .finish_non_exhaustive()
    }
}

pub(crate) struct DispatcherInner {
    pub(crate) router: RadixRouter<Route>,
    /// Application-level hooks; the global stages run from here.
    pub(crate) hooks: HookRegistry,
    pub(crate) adapter: Arc<dyn SchemaAdapter>,
    pub(crate) config: RuntimeConfig,
    pub(crate) origin: Arc<str>,
}

/// A built application. Cheap to clone; every clone shares the same routes and hooks.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.inner.router.len())
            .field("origin", &self.inner.origin)
            .field("production", &self.inner.config.production)
            .finish()
    }
}

impl Dispatcher {
    pub(crate) fn new(inner: DispatcherInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Number of compiled routes.
    #[inline]
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.inner.router.len()
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Run one request through the full lifecycle.
    ///
    /// Never fails: every error becomes a JSON error response. Global after-response
    /// hooks are spawned onto the current tokio runtime and not awaited.
    pub async fn dispatch(&self, request: Request<Bytes>) -> Response<Bytes> {
        self.dispatch_with(request, None).await
    }

    /// Answer a request the transport already refused (body too large, unreadable body).
    ///
    /// Global request hooks still run, so headers they stage (CORS) reach the error
    /// response; then `error` goes through the global error and after-response hooks like
    /// any pipeline failure. `request` carries the original head and an empty body.
    pub async fn reject(&self, request: Request<Bytes>, error: HttpError) -> Response<Bytes> {
        self.dispatch_with(request, Some(error)).await
    }

    async fn dispatch_with(
        &self,
        request: Request<Bytes>,
        rejection: Option<HttpError>,
    ) -> Response<Bytes> {
        let mut ctx = RequestContext::new(request, Arc::clone(&self.inner.origin));
        let response = self.respond(&mut ctx, rejection).await;
        self.schedule_after_response(ctx, &response);
        response
    }

    /// Erase into a plain dispatch function.
    #[must_use]
    pub fn into_fn(self) -> DispatchFn {
        Arc::new(move |request: Request<Bytes>| -> BoxFuture<'static, Response<Bytes>> {
            let dispatcher = self.clone();
            Box::pin(async move { dispatcher.dispatch(request).await })
        })
    }

    async fn respond(
        &self,
        ctx: &mut RequestContext,
        rejection: Option<HttpError>,
    ) -> Response<Bytes> {
        let result = AssertUnwindSafe(self.run_pipeline(ctx, rejection))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(anyhow::Error::new(UnknownError::from_panic(panic))));
        match result {
            Ok(response) => response,
            Err(err) => self.handle_error(ctx, err).await,
        }
    }

    async fn run_pipeline(
        &self,
        ctx: &mut RequestContext,
        rejection: Option<HttpError>,
    ) -> anyhow::Result<Response<Bytes>> {
        let inner = &self.inner;

        if let Some(response) =
            run_request_hooks(&inner.hooks.global_request, Stage::GlobalRequest, ctx).await?
        {
            return Ok(response);
        }
        if let Some(error) = rejection {
            return Err(error.into());
        }

        let Some(matched) = inner.router.route(ctx.method(), ctx.path()) else {
            return Err(HttpError::rejection(StatusCode::NOT_FOUND)
                .with_message(format!("Route not found: {} {}", ctx.method(), ctx.path()))
                .with_info("method", ctx.method().as_str())
                .with_info("path", ctx.path())
                .into());
        };
        let route = Arc::clone(&matched.data);
        debug!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            route = %route.pattern,
            "Route matched"
        );

        let handler = match &route.target {
            RouteTarget::Mount(fetch) => return Ok(fetch(ctx.clone_request()).await),
            RouteTarget::Handler(handler) => Arc::clone(handler),
        };

        ctx.body = deserialize_body(ctx.method(), ctx.request().headers(), ctx.request().body())?;
        ctx.route = Some(route.pattern.clone());
        ctx.params = matched
            .params
            .into_iter()
            .map(|(name, value)| (name.to_string(), Value::String(value)))
            .collect();

        if let Some(response) =
            run_request_hooks(&route.hooks.transform, Stage::Transform, ctx).await?
        {
            return Ok(response);
        }

        self.validate_inputs(&route.def, ctx)?;

        if let Some(response) =
            run_request_hooks(&route.hooks.before_handle, Stage::BeforeHandle, ctx).await?
        {
            return Ok(response);
        }

        let status_map = route
            .def
            .responses
            .as_ref()
            .is_some_and(|r| r.is_status_map());
        ctx.response = match handler(ctx).await? {
            Reply::Response(response) => return Ok(response),
            Reply::Status(result) => {
                let (status, body) = result.into_parts();
                ctx.set.status = status;
                body
            }
            other if status_map => {
                anyhow::bail!(
                    "route {} declares responses per status; the handler must return ctx.status(..), got {other:?}",
                    route.pattern
                )
            }
            other => other,
        };

        if let Some(response) =
            run_response_hooks(&route.hooks.after_handle, Stage::AfterHandle, ctx).await?
        {
            return Ok(response);
        }

        let meta = self.validate_output(&route, ctx)?;

        if let Some(response) =
            run_response_hooks(&route.hooks.map_response, Stage::MapResponse, ctx).await?
        {
            return Ok(response);
        }

        build_response(ctx, meta)
    }

    fn validate_inputs(&self, def: &RouteDef, ctx: &mut RequestContext) -> Result<(), HttpError> {
        let adapter = self.inner.adapter.as_ref();
        if let Some(schema) = &def.body {
            let validated = validate_input(schema.as_ref(), ctx.body.to_value())?;
            // Forms, text and bytes keep their representation.
            if matches!(ctx.body, RequestBody::Json(_) | RequestBody::Empty) {
                ctx.body = if validated.is_null() {
                    RequestBody::Empty
                } else {
                    RequestBody::Json(validated)
                };
            }
        }
        if let Some(schema) = &def.params {
            if let Value::Object(params) = validate_record(adapter, schema.as_ref(), &ctx.params)? {
                ctx.params = params;
            }
        }
        if let Some(schema) = &def.query {
            if let Value::Object(query) = validate_record(adapter, schema.as_ref(), &ctx.query)? {
                ctx.query = query;
            }
        }
        if let Some(schema) = &def.headers {
            if let Value::Object(headers) = validate_record(adapter, schema.as_ref(), &ctx.headers)? {
                ctx.headers = headers;
            }
        }
        Ok(())
    }

    /// Validate the current response value against the schema for the current status.
    ///
    /// Only JSON values and empty replies are checked; blobs, forms and full
    /// responses pass through.
    fn validate_output(
        &self,
        route: &Route,
        ctx: &mut RequestContext,
    ) -> anyhow::Result<Option<SchemaMeta>> {
        let Some(responses) = &route.def.responses else {
            return Ok(None);
        };
        let Some(schema) = responses.for_status(ctx.set.status) else {
            anyhow::bail!(
                "route {} has no response schema for status {}",
                route.pattern,
                ctx.set.status.as_u16()
            );
        };
        let meta = self.inner.adapter.get_meta(schema.as_ref());
        let value = match &ctx.response {
            Reply::Value(value) => value.clone(),
            Reply::Empty => Value::Null,
            _ => return Ok(Some(meta)),
        };
        let validated = validate_output(schema.as_ref(), value)?;
        ctx.response = if validated.is_null() {
            Reply::Empty
        } else {
            Reply::Value(validated)
        };
        Ok(Some(meta))
    }

    async fn handle_error(&self, ctx: &mut RequestContext, err: anyhow::Error) -> Response<Bytes> {
        let status = status_of(&err);
        if status.is_server_error() {
            error!(
                request_id = %ctx.request_id(),
                method = %ctx.method(),
                path = %ctx.path(),
                status = status.as_u16(),
                error = %err,
                "Request failed"
            );
        } else {
            debug!(
                request_id = %ctx.request_id(),
                method = %ctx.method(),
                path = %ctx.path(),
                status = status.as_u16(),
                error = %err,
                "Request rejected"
            );
        }

        let body = error_body(&err, self.inner.config.expose_stack());
        ctx.error = Some(err);
        if let Some(response) = self.run_error_hooks(ctx).await {
            return response;
        }
        error_response(&body, &ctx.set.headers)
    }

    /// Run global error hooks against `ctx.error`. The first replacement wins.
    async fn run_error_hooks(&self, ctx: &mut RequestContext) -> Option<Response<Bytes>> {
        for hook in &self.inner.hooks.global_error {
            let outcome = AssertUnwindSafe(async { (hook.callback())(&mut *ctx).await })
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(Some(response))) => return Some(response),
                Ok(Ok(None)) => {}
                Ok(Err(hook_err)) => error!(
                    hook_id = %hook.id(),
                    stage = %Stage::GlobalError,
                    error = %hook_err,
                    "Hook failed"
                ),
                Err(panic) => error!(
                    hook_id = %hook.id(),
                    stage = %Stage::GlobalError,
                    error = %UnknownError::from_panic(panic),
                    "Hook panicked"
                ),
            }
        }
        None
    }

    fn schedule_after_response(&self, mut ctx: RequestContext, response: &Response<Bytes>) {
        if self.inner.hooks.global_after_response.is_empty() {
            return;
        }
        ctx.set.status = response.status();
        ctx.set.headers = response.headers().clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let dispatcher = self.clone();
                handle.spawn(async move { dispatcher.run_after_response(ctx).await });
            }
            Err(_) => warn!(
                request_id = %ctx.request_id(),
                "No tokio runtime available, after-response hooks skipped"
            ),
        }
    }

    async fn run_after_response(&self, mut ctx: RequestContext) {
        for hook in &self.inner.hooks.global_after_response {
            let outcome = AssertUnwindSafe(async { (hook.callback())(&mut ctx).await })
                .catch_unwind()
                .await;
            let err = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(panic) => anyhow::Error::new(UnknownError::from_panic(panic)),
            };
            error!(
                request_id = %ctx.request_id(),
                hook_id = %hook.id(),
                stage = %Stage::GlobalAfterResponse,
                error = %err,
                "Hook failed"
            );
            ctx.error = Some(err);
            // The response is already gone; a replacement has nowhere to go.
            let _ = self.run_error_hooks(&mut ctx).await;
        }
    }
}

async fn run_request_hooks(
    hooks: &[Hook<RequestHookFn>],
    stage: Stage,
    ctx: &mut RequestContext,
) -> anyhow::Result<Option<Response<Bytes>>> {
    for hook in hooks {
        match (hook.callback())(ctx).await? {
            HookOutcome::Continue => {}
            HookOutcome::Patch(patch) => ctx.apply_patch(patch),
            HookOutcome::Respond(response) => {
                debug!(stage = %stage, hook_id = %hook.id(), "Hook short-circuited the pipeline");
                return Ok(Some(response));
            }
        }
    }
    Ok(None)
}

async fn run_response_hooks(
    hooks: &[Hook<ResponseHookFn>],
    stage: Stage,
    ctx: &mut RequestContext,
) -> anyhow::Result<Option<Response<Bytes>>> {
    for hook in hooks {
        match (hook.callback())(ctx).await? {
            None => {}
            Some(Reply::Response(response)) => {
                debug!(stage = %stage, hook_id = %hook.id(), "Hook short-circuited the pipeline");
                return Ok(Some(response));
            }
            Some(Reply::Status(result)) => {
                let (status, body) = result.into_parts();
                ctx.set.status = status;
                ctx.response = body;
            }
            Some(reply) => ctx.response = reply,
        }
    }
    Ok(None)
}

/// Serialize `ctx.response` with the accumulated status and headers.
///
/// Schema metadata's content type wins over the codec's; `ctx.set.headers` win over both.
fn build_response(
    ctx: &mut RequestContext,
    meta: Option<SchemaMeta>,
) -> anyhow::Result<Response<Bytes>> {
    if ctx.response.is_response() {
        if let Reply::Response(response) = std::mem::take(&mut ctx.response) {
            return Ok(response);
        }
    }
    let mut response = match serialize_reply(&ctx.response) {
        None => Response::new(Bytes::new()),
        Some(serialized) => {
            let mut response = Response::new(serialized.body);
            let content_type = meta
                .and_then(|m| m.content_type)
                .or(serialized.content_type);
            if let Some(content_type) = content_type {
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_str(&content_type)?);
            }
            response
        }
    };
    *response.status_mut() = ctx.set.status;
    apply_headers(response.headers_mut(), &ctx.set.headers);
    Ok(response)
}

fn error_response(body: &ErrorBody, headers: &HeaderMap) -> Response<Bytes> {
    let mut response = Response::new(Bytes::from(body.to_json().to_string()));
    *response.status_mut() = body.status_code();
    apply_headers(response.headers_mut(), headers);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    response
}

/// Replace every header named in `headers`, keeping repeated values.
fn apply_headers(target: &mut HeaderMap, headers: &HeaderMap) {
    for name in headers.keys() {
        target.remove(name);
        for value in headers.get_all(name) {
            target.append(name.clone(), value.clone());
        }
    }
}
