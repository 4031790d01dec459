//! Radix tree route matcher.
//!
//! Paths are split into segments and stored in a tree where:
//! - static segments (`users`) match exactly,
//! - `:name` segments match any single segment and capture it,
//! - `*` matches any single segment and captures it as `_0`, `_1`, ...,
//! - `**` matches the rest of the path (zero or more segments) and captures it under
//!   [`WILDCARD_KEY`]; `**:name` captures it under `name`.
//!
//! Lookup prefers static over `:name`/`*` over `**`, and backtracks when a more
//! specific branch dead-ends. At a terminal node an exact-method route wins over an
//! `ANY` route.
//!
//! ## Example
//!
//! ```rust
//! use hookline::router::RadixRouter;
//! use http::Method;
//! use std::sync::Arc;
//!
//! let mut router = RadixRouter::new();
//! router.add_route(Some(Method::GET), "/users/:id", Arc::new("user"));
//! router.add_route(None, "/files/**:rest", Arc::new("files"));
//!
//! let m = router.route(&Method::GET, "/users/42").unwrap();
//! assert_eq!(*m.data, "user");
//! assert_eq!(m.get_param("id"), Some("42"));
//!
//! let m = router.route(&Method::DELETE, "/files/a/b/c").unwrap();
//! assert_eq!(m.get_param("rest"), Some("a/b/c"));
//! ```

use http::Method;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Maximum inline path params before the match spills to the heap.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Captured path parameters, in path order.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Key an anonymous `**` wildcard is captured under.
pub const WILDCARD_KEY: &str = "_";

/// A successful lookup.
#[derive(Debug)]
pub struct RouteMatch<T> {
    pub data: Arc<T>,
    pub params: ParamVec,
}

impl<T> RouteMatch<T> {
    /// Get a path parameter by name (last occurrence wins).
    #[inline]
    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Routes stored at a terminal node.
struct Endpoints<T> {
    by_method: HashMap<Method, Arc<T>>,
    any: Option<Arc<T>>,
}

impl<T> Endpoints<T> {
    fn new() -> Self {
        Self {
            by_method: HashMap::new(),
            any: None,
        }
    }

    fn insert(&mut self, method: Option<Method>, data: Arc<T>) -> Option<Arc<T>> {
        match method {
            Some(m) => self.by_method.insert(m, data),
            None => self.any.replace(data),
        }
    }

    fn get(&self, method: &Method) -> Option<&Arc<T>> {
        self.by_method.get(method).or(self.any.as_ref())
    }
}

struct RadixNode<T> {
    segment: Cow<'static, str>,
    endpoints: Endpoints<T>,
    /// Capture name for `:name`, `*` and `**` nodes.
    param_name: Option<Arc<str>>,
    children: Vec<RadixNode<T>>,
    param_children: Vec<RadixNode<T>>,
    wildcard_children: Vec<RadixNode<T>>,
}

enum Segment<'a> {
    Static(&'a str),
    Param(Cow<'a, str>),
    Wildcard(&'a str),
}

fn classify<'a>(segment: &'a str, anonymous: &mut usize) -> Segment<'a> {
    if segment == "**" {
        Segment::Wildcard(WILDCARD_KEY)
    } else if let Some(name) = segment.strip_prefix("**:") {
        Segment::Wildcard(name)
    } else if let Some(name) = segment.strip_prefix(':') {
        Segment::Param(Cow::Borrowed(name))
    } else if segment == "*" {
        let name = format!("_{anonymous}");
        *anonymous += 1;
        Segment::Param(Cow::Owned(name))
    } else {
        Segment::Static(segment)
    }
}

impl<T> RadixNode<T> {
    fn new(segment: Cow<'static, str>) -> Self {
        Self {
            segment,
            endpoints: Endpoints::new(),
            param_name: None,
            children: Vec::new(),
            param_children: Vec::new(),
            wildcard_children: Vec::new(),
        }
    }

    fn new_param(param_name: &str) -> Self {
        let mut node = Self::new(Cow::Borrowed(""));
        node.param_name = Some(Arc::from(param_name));
        node
    }

    fn insert(
        &mut self,
        segments: &[&str],
        anonymous: &mut usize,
        method: Option<Method>,
        data: Arc<T>,
    ) -> Option<Arc<T>> {
        let Some((&segment, remaining)) = segments.split_first() else {
            return self.endpoints.insert(method, data);
        };

        match classify(segment, anonymous) {
            Segment::Wildcard(name) => {
                if !remaining.is_empty() {
                    warn!(
                        segment = %segment,
                        ignored = remaining.len(),
                        "Wildcard must be the last segment; trailing segments ignored"
                    );
                }
                let child = find_or_push(&mut self.wildcard_children, name);
                child.endpoints.insert(method, data)
            }
            Segment::Param(name) => {
                find_or_push(&mut self.param_children, &name).insert(remaining, anonymous, method, data)
            }
            Segment::Static(seg) => {
                if let Some(pos) = self.children.iter().position(|c| c.segment == seg) {
                    return self.children[pos].insert(remaining, anonymous, method, data);
                }
                let mut child = RadixNode::new(Cow::Owned(seg.to_string()));
                let replaced = child.insert(remaining, anonymous, method, data);
                self.children.push(child);
                replaced
            }
        }
    }

    fn search(&self, segments: &[&str], method: &Method, params: &mut ParamVec) -> Option<Arc<T>> {
        let Some((&segment, remaining)) = segments.split_first() else {
            if let Some(route) = self.endpoints.get(method) {
                return Some(Arc::clone(route));
            }
            // `**` also matches zero remaining segments.
            return self.match_wildcard(segments, method, params);
        };

        for child in &self.children {
            if child.segment == segment {
                if let Some(route) = child.search(remaining, method, params) {
                    return Some(route);
                }
            }
        }

        for param_child in &self.param_children {
            if let Some(ref name) = param_child.param_name {
                params.push((Arc::clone(name), segment.to_string()));
                if let Some(route) = param_child.search(remaining, method, params) {
                    return Some(route);
                }
                // Backtrack
                params.pop();
            }
        }

        self.match_wildcard(segments, method, params)
    }

    fn match_wildcard(
        &self,
        segments: &[&str],
        method: &Method,
        params: &mut ParamVec,
    ) -> Option<Arc<T>> {
        for wildcard in &self.wildcard_children {
            if let (Some(name), Some(route)) =
                (&wildcard.param_name, wildcard.endpoints.get(method))
            {
                params.push((Arc::clone(name), segments.join("/")));
                return Some(Arc::clone(route));
            }
        }
        None
    }
}

fn find_or_push<'a, T>(nodes: &'a mut Vec<RadixNode<T>>, name: &str) -> &'a mut RadixNode<T> {
    let pos = match nodes
        .iter()
        .position(|n| n.param_name.as_deref() == Some(name))
    {
        Some(pos) => pos,
        None => {
            nodes.push(RadixNode::new_param(name));
            nodes.len() - 1
        }
    };
    &mut nodes[pos]
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Segment-tree router over arbitrary route data.
pub struct RadixRouter<T> {
    root: RadixNode<T>,
    len: usize,
}

impl<T> Default for RadixRouter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RadixRouter<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: RadixNode::new(Cow::Borrowed("")),
            len: 0,
        }
    }

    /// Register `data` for `method` (`None` = any method) at `pattern`.
    ///
    /// Returns the data previously stored under the same key, if any.
    pub fn add_route(&mut self, method: Option<Method>, pattern: &str, data: Arc<T>) -> Option<Arc<T>> {
        let segments = split_path(pattern);
        let mut anonymous = 0;
        let replaced = self.root.insert(&segments, &mut anonymous, method, data);
        if replaced.is_none() {
            self.len += 1;
        }
        replaced
    }

    /// Find the route for `method` and `path` (without query string).
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> Option<RouteMatch<T>> {
        let segments = split_path(path);
        let mut params = ParamVec::new();
        let data = self.root.search(&segments, method, &mut params)?;
        Some(RouteMatch { data, params })
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router(routes: &[(Option<Method>, &'static str)]) -> RadixRouter<&'static str> {
        let mut r = RadixRouter::new();
        for (m, p) in routes {
            r.add_route(m.clone(), p, Arc::new(*p));
        }
        r
    }

    #[test]
    fn named_param_is_captured() {
        let r = router(&[(Some(Method::GET), "/users/:id")]);
        let m = r.route(&Method::GET, "/users/42").unwrap();
        assert_eq!(m.get_param("id"), Some("42"));
        assert!(r.route(&Method::POST, "/users/42").is_none());
        assert!(r.route(&Method::GET, "/users/42/posts").is_none());
    }

    #[test]
    fn anonymous_wildcard_uses_reserved_key() {
        let r = router(&[(Some(Method::GET), "/files/**")]);
        let m = r.route(&Method::GET, "/files/a/b/c").unwrap();
        assert_eq!(m.get_param(WILDCARD_KEY), Some("a/b/c"));
    }

    #[test]
    fn named_wildcard_uses_its_name() {
        let r = router(&[(Some(Method::GET), "/files/**:rest")]);
        let m = r.route(&Method::GET, "/files/a/b/c").unwrap();
        assert_eq!(m.get_param("rest"), Some("a/b/c"));
    }

    #[test]
    fn wildcard_matches_zero_segments() {
        let r = router(&[(None, "/mounted/**")]);
        let m = r.route(&Method::GET, "/mounted").unwrap();
        assert_eq!(m.get_param(WILDCARD_KEY), Some(""));
    }

    #[test]
    fn static_beats_param_beats_wildcard() {
        let r = router(&[
            (Some(Method::GET), "/items/**"),
            (Some(Method::GET), "/items/:id"),
            (Some(Method::GET), "/items/new"),
        ]);
        assert_eq!(*r.route(&Method::GET, "/items/new").unwrap().data, "/items/new");
        assert_eq!(*r.route(&Method::GET, "/items/7").unwrap().data, "/items/:id");
        assert_eq!(*r.route(&Method::GET, "/items/7/x").unwrap().data, "/items/**");
    }

    #[test]
    fn backtracks_out_of_dead_ends() {
        let r = router(&[
            (Some(Method::GET), "/a/static/end"),
            (Some(Method::GET), "/a/:p/other"),
        ]);
        let m = r.route(&Method::GET, "/a/static/other").unwrap();
        assert_eq!(*m.data, "/a/:p/other");
        assert_eq!(m.get_param("p"), Some("static"));
    }

    #[test]
    fn exact_method_beats_any() {
        let mut r = router(&[(None, "/x"), (Some(Method::POST), "/x")]);
        r.add_route(Some(Method::POST), "/x", Arc::new("post"));
        assert_eq!(*r.route(&Method::POST, "/x").unwrap().data, "post");
        assert_eq!(*r.route(&Method::GET, "/x").unwrap().data, "/x");
    }

    #[test]
    fn star_captures_single_segment() {
        let r = router(&[(Some(Method::GET), "/a/*/b/*")]);
        let m = r.route(&Method::GET, "/a/one/b/two").unwrap();
        assert_eq!(m.get_param("_0"), Some("one"));
        assert_eq!(m.get_param("_1"), Some("two"));
    }

    #[test]
    fn trailing_slashes_and_root() {
        let r = router(&[(Some(Method::GET), "/"), (Some(Method::GET), "/users/")]);
        assert_eq!(*r.route(&Method::GET, "/").unwrap().data, "/");
        assert_eq!(*r.route(&Method::GET, "/users").unwrap().data, "/users/");
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn re_adding_replaces() {
        let mut r = RadixRouter::new();
        assert!(r.add_route(Some(Method::GET), "/a", Arc::new(1)).is_none());
        assert_eq!(r.add_route(Some(Method::GET), "/a", Arc::new(2)).as_deref(), Some(&1));
        assert_eq!(r.len(), 1);
        assert_eq!(*r.route(&Method::GET, "/a").unwrap().data, 2);
    }
}
