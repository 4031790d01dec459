//! # Application Builder
//!
//! An [`App`] accumulates routes and hooks through chained calls, can be composed
//! into other applications, and is finally built into a [`Dispatcher`].
//!
//! ## Composition
//!
//! ```mermaid
//! flowchart LR
//!     users["users (prefix /users)"] -->|use_app| api["api (prefix /api)"]
//!     api -->|use_app| root[root]
//!     root -->|build| D[Dispatcher]
//! ```
//!
//! `parent.use_app(&child)`:
//! 1. copies every child route with the parent's prefix prepended;
//! 2. merges the child's global hooks, plus its local hooks when the child is
//!    [exported](App::export);
//! 3. deduplicates every hook list by hook id, so using the same child twice is a no-op
//!    the second time.
//!
//! The child is not modified and can be used by several parents.
//!
//! ## Hook snapshots
//!
//! A route captures the application's hooks as they stand when the route is
//! declared. Local stages (`on_transform`, `on_before_handle`, `on_after_handle`,
//! `on_map_response`) run from that snapshot, so a hook only applies to routes
//! declared after it. Global stages run from the built application's own lists.
//!
//! ## Example
//!
//! ```rust
//! use hookline::app::App;
//! use hookline::codec::Reply;
//! use serde_json::json;
//!
//! let users = App::with_prefix("/users")
//!     .get("/", |_ctx| Box::pin(async { Ok(Reply::from(json!([]))) }));
//! let api = App::with_prefix("/api").use_app(&users);
//! let dispatcher = App::new().use_app(&api).build().unwrap();
//! assert_eq!(dispatcher.route_count(), 1);
//! ```

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Method, Request, Response};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::net::ToSocketAddrs;
use tracing::{debug, info};
use url::Url;

use crate::codec::Reply;
use crate::context::RequestContext;
use crate::dispatcher::{DispatchFn, Dispatcher, DispatcherInner, Route, RouteTarget};
use crate::hooks::{
    AfterResponseHookFn, ErrorHookFn, Hook, HookOutcome, HookRegistry, HookScope, RequestHookFn,
    ResponseHookFn, Stage,
};
use crate::ids::{AppId, HookId};
use crate::router::{normalize_path, DuplicateRouteError, RouteMethod, RouteTable};
use crate::runtime_config::RuntimeConfig;
use crate::schema::{JsonSchemaAdapter, RouteDef, RouteDocs, SchemaAdapter};
use crate::server::HttpServer;

/// Options an application is created with.
///
/// Anything left unset falls back to [`RuntimeConfig::from_env`].
#[derive(Clone, Default)]
pub struct AppOptions {
    /// Prepended to every route declared on the application.
    pub prefix: String,
    /// Origin for request URL computation; overrides the config's origin.
    pub origin: Option<String>,
    /// Defaults to [`JsonSchemaAdapter`].
    pub schema_adapter: Option<Arc<dyn SchemaAdapter>>,
    pub config: Option<RuntimeConfig>,
}

impl AppOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    #[must_use]
    pub fn schema_adapter<A: SchemaAdapter + 'static>(mut self, adapter: A) -> Self {
        self.schema_adapter = Some(Arc::new(adapter));
        self
    }

    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = Some(config);
        self
    }
}

impl fmt::Debug for AppOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppOptions")
            .field("prefix", &self.prefix)
            .field("origin", &self.origin)
            .field("schema_adapter", &self.schema_adapter.is_some())
            .field("config", &self.config)
            .finish()
    }
}

/// Why [`App::build`] refused to build.
#[derive(Debug)]
pub enum BuildError {
    /// Strict routing is on and these `(method, path)` pairs were registered twice.
    DuplicateRoutes(Vec<DuplicateRouteError>),
    /// The configured origin is not an absolute URL.
    InvalidOrigin {
        origin: String,
        source: url::ParseError,
    },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::DuplicateRoutes(duplicates) => {
                write!(f, "{} duplicate route(s):", duplicates.len())?;
                for dup in duplicates {
                    write!(f, " {dup};")?;
                }
                Ok(())
            }
            BuildError::InvalidOrigin { origin, source } => {
                write!(f, "invalid origin {origin:?}: {source}")
            }
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::DuplicateRoutes(_) => None,
            BuildError::InvalidOrigin { source, .. } => Some(source),
        }
    }
}

/// A registered route, as listed by [`App::routes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub method: RouteMethod,
    pub path: String,
    /// Delegates to another dispatch function.
    pub mounted: bool,
    pub docs: RouteDocs,
}

/// Application builder.
#[derive(Clone)]
pub struct App {
    id: AppId,
    prefix: String,
    origin: Option<String>,
    adapter: Option<Arc<dyn SchemaAdapter>>,
    config: RuntimeConfig,
    exported: bool,
    table: RouteTable<Route>,
    duplicates: Vec<DuplicateRouteError>,
    hooks: HookRegistry,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("id", &self.id)
            .field("prefix", &self.prefix)
            .field("exported", &self.exported)
            .field("routes", &self.table.len())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

macro_rules! method_routes {
    ($($name:ident, $name_with:ident => $method:expr, $label:literal;)*) => {
        $(
            #[doc = concat!("Register a `", $label, "` route without schemas.")]
            #[must_use]
            pub fn $name<F>(self, path: &str, handler: F) -> Self
            where
                F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, anyhow::Result<Reply>>
                    + Send
                    + Sync
                    + 'static,
            {
                self.route($method, path, None, handler)
            }

            #[doc = concat!("Register a `", $label, "` route with a [`RouteDef`].")]
            #[must_use]
            pub fn $name_with<F>(self, path: &str, def: RouteDef, handler: F) -> Self
            where
                F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, anyhow::Result<Reply>>
                    + Send
                    + Sync
                    + 'static,
            {
                self.route($method, path, Some(def), handler)
            }
        )*
    };
}

impl App {
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(AppOptions::default())
    }

    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::with_options(AppOptions::default().prefix(prefix))
    }

    #[must_use]
    pub fn with_options(options: AppOptions) -> Self {
        let config = options.config.unwrap_or_else(RuntimeConfig::from_env);
        Self {
            id: AppId::new(),
            prefix: normalize_prefix(&options.prefix),
            origin: options.origin,
            adapter: options.schema_adapter,
            table: RouteTable::new().strict(config.strict_routes),
            config,
            exported: false,
            duplicates: Vec::new(),
            hooks: HookRegistry::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> AppId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[inline]
    #[must_use]
    pub fn is_exported(&self) -> bool {
        self.exported
    }

    #[inline]
    #[must_use]
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Registered routes in registration order.
    #[must_use]
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.table
            .iter()
            .map(|(method, path, route)| RouteInfo {
                method: method.clone(),
                path: path.to_string(),
                mounted: route.is_mount(),
                docs: route.def.docs.clone(),
            })
            .collect()
    }

    method_routes! {
        get, get_with => RouteMethod::Exact(Method::GET), "GET";
        post, post_with => RouteMethod::Exact(Method::POST), "POST";
        put, put_with => RouteMethod::Exact(Method::PUT), "PUT";
        patch, patch_with => RouteMethod::Exact(Method::PATCH), "PATCH";
        delete, delete_with => RouteMethod::Exact(Method::DELETE), "DELETE";
        head, head_with => RouteMethod::Exact(Method::HEAD), "HEAD";
        options, options_with => RouteMethod::Exact(Method::OPTIONS), "OPTIONS";
        any, any_with => RouteMethod::Any, "ANY";
    }

    /// Register a route for `method` at `path` (relative to the prefix).
    ///
    /// The route snapshots the hooks registered so far.
    #[must_use]
    pub fn route<F>(
        self,
        method: impl Into<RouteMethod>,
        path: &str,
        def: Option<RouteDef>,
        handler: F,
    ) -> Self
    where
        F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, anyhow::Result<Reply>>
            + Send
            + Sync
            + 'static,
    {
        let pattern = join_paths(&self.prefix, path);
        let route = Route {
            method: method.into(),
            pattern,
            def: def.unwrap_or_default(),
            target: RouteTarget::Handler(Arc::new(handler)),
            hooks: self.hooks.clone(),
        };
        self.add_route(route)
    }

    /// Delegate every request under `path` to `fetch`, untouched.
    ///
    /// The route pattern is `{prefix}{path}/**`, for any method.
    #[must_use]
    pub fn mount<F, Fut>(self, path: &str, fetch: F) -> Self
    where
        F: Fn(Request<Bytes>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response<Bytes>> + Send + 'static,
    {
        let fetch: DispatchFn =
            Arc::new(move |request| -> BoxFuture<'static, Response<Bytes>> { Box::pin(fetch(request)) });
        self.mount_fn(path, fetch)
    }

    /// Mount another built application under `path`.
    #[must_use]
    pub fn mount_dispatcher(self, path: &str, dispatcher: Dispatcher) -> Self {
        self.mount_fn(path, dispatcher.into_fn())
    }

    fn mount_fn(self, path: &str, fetch: DispatchFn) -> Self {
        let pattern = join_paths(&self.prefix, &format!("{path}/**"));
        let route = Route {
            method: RouteMethod::Any,
            pattern,
            def: RouteDef::default(),
            target: RouteTarget::Mount(fetch),
            hooks: self.hooks.clone(),
        };
        self.add_route(route)
    }

    fn add_route(mut self, route: Route) -> Self {
        debug!(
            app_id = %self.id,
            method = %route.method,
            path = %route.pattern,
            "Route registered"
        );
        let method = route.method.clone();
        let pattern = route.pattern.clone();
        if let Err(dup) = self.table.insert(method, &pattern, Arc::new(route)) {
            self.duplicates.push(dup);
        }
        self
    }

    /// Compose `child` into this application.
    #[must_use]
    pub fn use_app(mut self, child: &App) -> Self {
        for (method, path, route) in child.table.iter() {
            let mut route = Route::clone(route);
            route.pattern = join_paths(&self.prefix, path);
            let pattern = route.pattern.clone();
            if let Err(dup) = self.table.insert(method.clone(), &pattern, Arc::new(route)) {
                self.duplicates.push(dup);
            }
        }
        self.duplicates.extend(child.duplicates.iter().cloned());
        self.hooks.merge_from(&child.hooks, child.exported);
        debug!(
            app_id = %self.id,
            child_id = %child.id,
            child_exported = child.exported,
            routes = child.table.len(),
            "Application composed"
        );
        self
    }

    /// Let local hooks and decorations flow into parents on composition.
    #[must_use]
    pub fn export(mut self) -> Self {
        self.exported = true;
        self
    }

    /// Make `key` available on the context of every route declared after this call.
    #[must_use]
    pub fn decorate(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut values = Map::new();
        values.insert(key.into(), value.into());
        self.decorate_all(values)
    }

    /// [`decorate`](App::decorate) several values at once.
    #[must_use]
    pub fn decorate_all(self, values: Map<String, Value>) -> Self {
        let values = Arc::new(values);
        self.on_transform(move |_ctx| {
            let patch = Map::clone(&values);
            Box::pin(async move { Ok(HookOutcome::Patch(patch)) })
        })
    }

    /// Runs before routing, for every request.
    #[must_use]
    pub fn on_global_request<F>(mut self, callback: F) -> Self
    where
        F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, anyhow::Result<HookOutcome>>
            + Send
            + Sync
            + 'static,
    {
        let callback: Arc<RequestHookFn> = Arc::new(callback);
        let hook = Hook::new(HookScope::Global, callback);
        self.log_hook(Stage::GlobalRequest, hook.id());
        self.hooks.global_request.push(hook);
        self
    }

    /// Runs after the body, params and query are on the context, before validation.
    #[must_use]
    pub fn on_transform<F>(mut self, callback: F) -> Self
    where
        F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, anyhow::Result<HookOutcome>>
            + Send
            + Sync
            + 'static,
    {
        let callback: Arc<RequestHookFn> = Arc::new(callback);
        let hook = Hook::new(HookScope::Local, callback);
        self.log_hook(Stage::Transform, hook.id());
        self.hooks.transform.push(hook);
        self
    }

    /// Runs after input validation, before the handler.
    #[must_use]
    pub fn on_before_handle<F>(mut self, callback: F) -> Self
    where
        F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, anyhow::Result<HookOutcome>>
            + Send
            + Sync
            + 'static,
    {
        let callback: Arc<RequestHookFn> = Arc::new(callback);
        let hook = Hook::new(HookScope::Local, callback);
        self.log_hook(Stage::BeforeHandle, hook.id());
        self.hooks.before_handle.push(hook);
        self
    }

    /// Runs after the handler, before output validation.
    #[must_use]
    pub fn on_after_handle<F>(mut self, callback: F) -> Self
    where
        F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, anyhow::Result<Option<Reply>>>
            + Send
            + Sync
            + 'static,
    {
        let callback: Arc<ResponseHookFn> = Arc::new(callback);
        let hook = Hook::new(HookScope::Local, callback);
        self.log_hook(Stage::AfterHandle, hook.id());
        self.hooks.after_handle.push(hook);
        self
    }

    /// Runs after output validation, before serialization.
    #[must_use]
    pub fn on_map_response<F>(mut self, callback: F) -> Self
    where
        F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, anyhow::Result<Option<Reply>>>
            + Send
            + Sync
            + 'static,
    {
        let callback: Arc<ResponseHookFn> = Arc::new(callback);
        let hook = Hook::new(HookScope::Local, callback);
        self.log_hook(Stage::MapResponse, hook.id());
        self.hooks.map_response.push(hook);
        self
    }

    /// Runs when any stage failed; `ctx.error` holds the failure.
    #[must_use]
    pub fn on_global_error<F>(mut self, callback: F) -> Self
    where
        F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, anyhow::Result<Option<Response<Bytes>>>>
            + Send
            + Sync
            + 'static,
    {
        let callback: Arc<ErrorHookFn> = Arc::new(callback);
        let hook = Hook::new(HookScope::Global, callback);
        self.log_hook(Stage::GlobalError, hook.id());
        self.hooks.global_error.push(hook);
        self
    }

    /// Runs after the response has been handed back; never awaited by dispatch.
    #[must_use]
    pub fn on_global_after_response<F>(mut self, callback: F) -> Self
    where
        F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, anyhow::Result<()>>
            + Send
            + Sync
            + 'static,
    {
        let callback: Arc<AfterResponseHookFn> = Arc::new(callback);
        let hook = Hook::new(HookScope::Global, callback);
        self.log_hook(Stage::GlobalAfterResponse, hook.id());
        self.hooks.global_after_response.push(hook);
        self
    }

    fn log_hook(&self, stage: Stage, hook_id: HookId) {
        debug!(app_id = %self.id, stage = %stage, hook_id = %hook_id, "Hook registered");
    }

    /// Snapshot routes and hooks into a dispatcher.
    ///
    /// # Errors
    ///
    /// [`BuildError::DuplicateRoutes`] when strict routing rejected a registration;
    /// [`BuildError::InvalidOrigin`] when the origin is not an absolute URL.
    pub fn build(self) -> Result<Dispatcher, BuildError> {
        if !self.duplicates.is_empty() {
            return Err(BuildError::DuplicateRoutes(self.duplicates));
        }
        let origin = self
            .origin
            .unwrap_or_else(|| self.config.origin.clone());
        if let Err(source) = Url::parse(&origin) {
            return Err(BuildError::InvalidOrigin { origin, source });
        }

        let router = self.table.compile();
        info!(
            app_id = %self.id,
            routes = router.len(),
            prefix = %self.prefix,
            production = self.config.production,
            "Application built"
        );
        Ok(Dispatcher::new(DispatcherInner {
            router,
            hooks: self.hooks,
            adapter: self
                .adapter
                .unwrap_or_else(|| Arc::new(JsonSchemaAdapter)),
            config: self.config,
            origin: Arc::from(origin),
        }))
    }

    /// Build and serve on `addr` until ctrl-c.
    ///
    /// # Errors
    ///
    /// Fails if the application does not build or the address cannot be bound.
    pub async fn listen<A: ToSocketAddrs>(self, addr: A) -> anyhow::Result<()> {
        let dispatcher = self.build()?;
        let handle = HttpServer::new(dispatcher).start(addr).await?;
        handle.shutdown_on_ctrl_c().await?;
        Ok(())
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let prefix = normalize_path(prefix);
    if prefix == "/" {
        String::new()
    } else {
        prefix
    }
}

fn join_paths(prefix: &str, path: &str) -> String {
    normalize_path(&format!("{prefix}/{path}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(_ctx: &mut RequestContext) -> BoxFuture<'_, anyhow::Result<Reply>> {
        Box::pin(async { Ok(Reply::from("ok")) })
    }

    fn config() -> RuntimeConfig {
        RuntimeConfig::default()
    }

    fn app() -> App {
        App::with_options(AppOptions::new().config(config()))
    }

    #[test]
    fn prefixes_are_joined() {
        assert_eq!(join_paths("", "/"), "/");
        assert_eq!(join_paths("/users", "/"), "/users");
        assert_eq!(join_paths("/api", "/users/:id"), "/api/users/:id");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix("api/"), "/api");
    }

    #[test]
    fn routes_listed_in_registration_order() {
        let app = app()
            .get("/a", ok)
            .post("/b", ok)
            .any("/c", ok)
            .mount("/m", |_req| async { Response::new(Bytes::new()) });
        let routes: Vec<(String, String, bool)> = app
            .routes()
            .into_iter()
            .map(|r| (r.method.to_string(), r.path, r.mounted))
            .collect();
        assert_eq!(
            routes,
            vec![
                ("GET".into(), "/a".into(), false),
                ("POST".into(), "/b".into(), false),
                ("ANY".into(), "/c".into(), false),
                ("ANY".into(), "/m/**".into(), true),
            ]
        );
    }

    #[test]
    fn use_prefixes_child_routes() {
        let users = App::with_options(AppOptions::new().prefix("/users").config(config())).get("/", ok);
        let api = App::with_options(AppOptions::new().prefix("/api").config(config())).use_app(&users);
        let root = app().use_app(&api);
        let paths: Vec<String> = root.routes().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/api/users"]);
        // Child is untouched.
        assert_eq!(users.routes()[0].path, "/users");
    }

    #[test]
    fn local_hooks_need_export() {
        let child = app().decorate("a", 1);
        let parent = app().use_app(&child);
        assert_eq!(parent.hooks().len(Stage::Transform), 0);

        let child = child.export();
        let parent = app().use_app(&child).use_app(&child);
        assert_eq!(parent.hooks().len(Stage::Transform), 1);
    }

    #[test]
    fn strict_mode_fails_build() {
        let strict = App::with_options(AppOptions::new().config(config().strict_routes(true)))
            .get("/a", ok)
            .get("/a/", ok);
        match strict.build() {
            Err(BuildError::DuplicateRoutes(dups)) => {
                assert_eq!(dups.len(), 1);
                assert_eq!(dups[0].path, "/a");
            }
            other => panic!("expected duplicate error, got {other:?}"),
        }

        let lenient = app().get("/a", ok).get("/a", ok);
        assert_eq!(lenient.routes().len(), 1);
        assert!(lenient.build().is_ok());
    }

    #[test]
    fn invalid_origin_fails_build() {
        let app = App::with_options(AppOptions::new().origin("not a url").config(config()));
        assert!(matches!(app.build(), Err(BuildError::InvalidOrigin { .. })));
    }

    #[test]
    fn build_error_display() {
        let err = BuildError::DuplicateRoutes(vec![DuplicateRouteError {
            method: RouteMethod::Exact(Method::GET),
            path: "/x".into(),
        }]);
        assert!(err.to_string().contains("/x"));
    }
}
