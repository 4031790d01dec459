//! Ordered route table.
//!
//! The table is the declaration-time view of an application's routes: it keeps
//! registration order (used when composing applications and when listing routes)
//! and detects duplicate `(method, path)` registrations. [`RouteTable::compile`]
//! turns it into the [`RadixRouter`] used at request time.

use http::Method;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use super::radix::RadixRouter;

/// Method a route answers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    /// Every method.
    Any,
    Exact(Method),
}

impl RouteMethod {
    #[must_use]
    pub fn as_method(&self) -> Option<&Method> {
        match self {
            RouteMethod::Any => None,
            RouteMethod::Exact(m) => Some(m),
        }
    }
}

impl From<Method> for RouteMethod {
    fn from(method: Method) -> Self {
        RouteMethod::Exact(method)
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMethod::Any => f.write_str("ANY"),
            RouteMethod::Exact(m) => f.write_str(m.as_str()),
        }
    }
}

/// A `(method, path)` pair was registered twice while strict routing is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateRouteError {
    pub method: RouteMethod,
    pub path: String,
}

impl fmt::Display for DuplicateRouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "route {} {} is already registered", self.method, self.path)
    }
}

impl std::error::Error for DuplicateRouteError {}

/// Canonical form of a path pattern: leading `/`, no empty segments.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Routes in registration order.
pub struct RouteTable<T> {
    entries: Vec<(RouteMethod, String, Arc<T>)>,
    strict: bool,
}

impl<T> Clone for RouteTable<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            strict: self.strict,
        }
    }
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RouteTable<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            strict: false,
        }
    }

    /// Reject duplicates instead of overwriting them.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Register a route. A duplicate overwrites the earlier entry in place, with a
    /// warning, unless the table is strict.
    pub fn insert(
        &mut self,
        method: RouteMethod,
        path: &str,
        data: Arc<T>,
    ) -> Result<(), DuplicateRouteError> {
        let path = normalize_path(path);
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|(m, p, _)| *m == method && *p == path)
        {
            if self.strict {
                return Err(DuplicateRouteError { method, path });
            }
            warn!(method = %method, path = %path, "Route already registered, overwriting");
            existing.2 = data;
            return Ok(());
        }
        self.entries.push((method, path, data));
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RouteMethod, &str, &Arc<T>)> {
        self.entries.iter().map(|(m, p, d)| (m, p.as_str(), d))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the request-time matcher.
    #[must_use]
    pub fn compile(&self) -> RadixRouter<T> {
        let mut router = RadixRouter::new();
        for (method, path, data) in &self.entries {
            router.add_route(method.as_method().cloned(), path, Arc::clone(data));
        }
        router
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/users/"), "/users");
        assert_eq!(normalize_path("/api//users"), "/api/users");
        assert_eq!(normalize_path("items/:id"), "/items/:id");
    }

    #[test]
    fn duplicate_overwrites_in_place() {
        let mut table = RouteTable::new();
        table.insert(Method::GET.into(), "/a", Arc::new(1)).unwrap();
        table.insert(Method::GET.into(), "/b", Arc::new(2)).unwrap();
        table.insert(Method::GET.into(), "/a/", Arc::new(3)).unwrap();
        let values: Vec<_> = table.iter().map(|(_, p, d)| (p.to_string(), **d)).collect();
        assert_eq!(values, vec![("/a".to_string(), 3), ("/b".to_string(), 2)]);
    }

    #[test]
    fn strict_table_rejects_duplicates() {
        let mut table = RouteTable::new().strict(true);
        table.insert(RouteMethod::Any, "/a", Arc::new(1)).unwrap();
        let err = table.insert(RouteMethod::Any, "/a", Arc::new(2)).unwrap_err();
        assert_eq!(err.to_string(), "route ANY /a is already registered");
        // Same path, different method is fine.
        table.insert(Method::GET.into(), "/a", Arc::new(3)).unwrap();
    }

    #[test]
    fn compiles_into_matcher() {
        let mut table = RouteTable::new();
        table.insert(Method::GET.into(), "/users/:id", Arc::new("user")).unwrap();
        let router = table.compile();
        let m = router.route(&Method::GET, "/users/9").unwrap();
        assert_eq!(*m.data, "user");
    }
}
