//! Cross-origin resource sharing.
//!
//! A preflight (`OPTIONS` carrying `Origin` and `Access-Control-Request-Method`) is
//! answered with 204 from the global-request stage and never reaches routing. Any
//! other request from an allowed origin continues with the CORS headers staged on
//! `ctx.set.headers`, so they land on the final response, error responses included.
//!
//! Requests without an `Origin` header, or from an origin that is not allowed, pass
//! through untouched. The browser enforces the missing headers.

use bytes::Bytes;
use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
    ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN,
    VARY,
};
use http::{HeaderMap, HeaderValue, Method, Response, StatusCode};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::app::App;
use crate::context::RequestContext;
use crate::hooks::HookOutcome;

/// CORS configuration error
///
/// Returned by [`cors`] when the options are invalid or violate the CORS rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsConfigError {
    /// Wildcard origin (`*`) cannot be used with credentials
    WildcardWithCredentials,
    /// The origin is not `scheme://host[:port]`
    InvalidOriginFormat {
        origin: String,
    },
    /// Credentials need at least one explicit origin
    EmptyOriginsWithCredentials,
    /// A configured header name or value cannot be sent on the wire
    InvalidHeader {
        value: String,
    },
}

impl fmt::Display for CorsConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorsConfigError::WildcardWithCredentials => write!(
                f,
                "CORS configuration error: Cannot use wildcard origin (*) with credentials. \
                When allow_credentials is true, you must specify exact origins."
            ),
            CorsConfigError::InvalidOriginFormat { origin } => write!(
                f,
                "CORS configuration error: Invalid origin format '{origin}'. \
                Expected format: scheme://host:port (e.g., https://example.com)"
            ),
            CorsConfigError::EmptyOriginsWithCredentials => write!(
                f,
                "CORS configuration error: Cannot use credentials with empty origins list. \
                When allow_credentials is true, at least one origin must be specified."
            ),
            CorsConfigError::InvalidHeader { value } => write!(
                f,
                "CORS configuration error: '{value}' is not a valid header name or value"
            ),
        }
    }
}

impl std::error::Error for CorsConfigError {}

/// Builder for the [`cors`] plugin.
///
/// Defaults are closed: no origins, `Content-Type` and `Authorization` headers,
/// `GET POST PUT DELETE OPTIONS`, no credentials, no preflight caching.
///
/// ```rust
/// use hookline::plugins::{cors, CorsOptions};
/// use http::Method;
///
/// let plugin = cors(
///     CorsOptions::new()
///         .allowed_origins(&["https://example.com", "https://api.example.com"])
///         .allowed_methods(&[Method::GET, Method::POST])
///         .allow_credentials(true)
///         .expose_headers(&["X-Total-Count"])
///         .max_age(3600),
/// );
/// assert!(plugin.is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct CorsOptions {
    allowed_origins: Vec<String>,
    allowed_headers: Vec<String>,
    allowed_methods: Vec<Method>,
    allow_credentials: bool,
    expose_headers: Vec<String>,
    max_age: Option<u32>,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl CorsOptions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_headers: vec!["Content-Type".into(), "Authorization".into()],
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ],
            allow_credentials: false,
            expose_headers: Vec::new(),
            max_age: None,
        }
    }

    /// Any origin, no credentials. Development only.
    #[must_use]
    pub fn permissive() -> Self {
        Self::new().allowed_origins(&["*"])
    }

    /// Exact origins, or `"*"` for any.
    #[must_use]
    pub fn allowed_origins(mut self, origins: &[&str]) -> Self {
        self.allowed_origins = origins.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Request headers a preflight may ask for; `"*"` allows all.
    #[must_use]
    pub fn allowed_headers(mut self, headers: &[&str]) -> Self {
        self.allowed_headers = headers.iter().map(|s| (*s).to_string()).collect();
        self
    }

    #[must_use]
    pub fn allowed_methods(mut self, methods: &[Method]) -> Self {
        self.allowed_methods = methods.to_vec();
        self
    }

    #[must_use]
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    #[must_use]
    pub fn expose_headers(mut self, headers: &[&str]) -> Self {
        self.expose_headers = headers.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Seconds a browser may cache the preflight answer.
    #[must_use]
    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = Some(seconds);
        self
    }

    fn compile(self) -> Result<Cors, CorsConfigError> {
        let wildcard = self.allowed_origins.iter().any(|o| o == "*");
        if self.allow_credentials {
            if wildcard {
                return Err(CorsConfigError::WildcardWithCredentials);
            }
            if self.allowed_origins.is_empty() {
                return Err(CorsConfigError::EmptyOriginsWithCredentials);
            }
        }

        let mut origins = Vec::with_capacity(self.allowed_origins.len());
        for origin in self.allowed_origins.iter().filter(|o| *o != "*") {
            origins.push(normalize_origin(origin)?);
        }

        let allow_all_headers = self.allowed_headers.iter().any(|h| h == "*");
        let methods = self
            .allowed_methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        Ok(Cors {
            wildcard,
            origins,
            allow_all_headers,
            allow_methods: header_value(&methods)?,
            allow_headers: header_value(&self.allowed_headers.join(", "))?,
            expose_headers: if self.expose_headers.is_empty() {
                None
            } else {
                Some(header_value(&self.expose_headers.join(", "))?)
            },
            max_age: self.max_age.map(HeaderValue::from),
            allowed_headers: self.allowed_headers,
            allowed_methods: self.allowed_methods,
            allow_credentials: self.allow_credentials,
        })
    }
}

/// Build the CORS plugin.
///
/// # Errors
///
/// Returns [`CorsConfigError`] when the options break the CORS rules.
pub fn cors(options: CorsOptions) -> Result<App, CorsConfigError> {
    let cors = Arc::new(options.compile()?);
    debug!(
        origins = cors.origins.len(),
        wildcard = cors.wildcard,
        credentials = cors.allow_credentials,
        "CORS plugin configured"
    );
    Ok(App::new()
        .on_global_request(move |ctx| {
            let outcome = cors.apply(ctx);
            Box::pin(async move { Ok(outcome) })
        })
        .export())
}

/// Validated options with the constant header values prebuilt.
#[derive(Debug)]
struct Cors {
    wildcard: bool,
    origins: Vec<String>,
    allowed_headers: Vec<String>,
    allow_all_headers: bool,
    allowed_methods: Vec<Method>,
    allow_credentials: bool,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    expose_headers: Option<HeaderValue>,
    max_age: Option<HeaderValue>,
}

impl Cors {
    fn apply(&self, ctx: &mut RequestContext) -> HookOutcome {
        let Some(origin) = ctx.request().headers().get(ORIGIN).cloned() else {
            return HookOutcome::Continue;
        };
        let preflight = *ctx.method() == Method::OPTIONS
            && ctx
                .request()
                .headers()
                .contains_key(ACCESS_CONTROL_REQUEST_METHOD);

        if !self.origin_allowed(&origin) {
            warn!(origin = ?origin, path = %ctx.path(), "CORS: origin not allowed");
            return if preflight {
                HookOutcome::Respond(empty_response(StatusCode::FORBIDDEN, HeaderMap::new()))
            } else {
                HookOutcome::Continue
            };
        }

        let mut headers = HeaderMap::new();
        self.origin_headers(origin, &mut headers);

        if preflight {
            return HookOutcome::Respond(self.preflight(ctx, headers));
        }

        if let Some(expose) = &self.expose_headers {
            headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, expose.clone());
        }
        ctx.set.headers.extend(headers);
        HookOutcome::Continue
    }

    fn preflight(&self, ctx: &RequestContext, mut headers: HeaderMap) -> Response<Bytes> {
        let request_headers = ctx.request().headers();
        let method_ok = request_headers
            .get(ACCESS_CONTROL_REQUEST_METHOD)
            .and_then(|v| v.to_str().ok())
            .and_then(|m| m.parse::<Method>().ok())
            .is_some_and(|m| self.allowed_methods.contains(&m));
        if !method_ok {
            warn!(path = %ctx.path(), "CORS preflight: method not allowed");
            return empty_response(StatusCode::FORBIDDEN, HeaderMap::new());
        }

        if let Some(requested) = request_headers
            .get(ACCESS_CONTROL_REQUEST_HEADERS)
            .and_then(|v| v.to_str().ok())
        {
            if !self.allow_all_headers {
                let denied = requested
                    .split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .find(|h| !self.allowed_headers.iter().any(|a| a.eq_ignore_ascii_case(h)));
                if let Some(header) = denied {
                    warn!(header = %header, "CORS preflight: header not allowed");
                    return empty_response(StatusCode::FORBIDDEN, HeaderMap::new());
                }
            }
        }

        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        if let Some(max_age) = &self.max_age {
            headers.insert(ACCESS_CONTROL_MAX_AGE, max_age.clone());
        }
        empty_response(StatusCode::NO_CONTENT, headers)
    }

    fn origin_allowed(&self, origin: &HeaderValue) -> bool {
        if self.wildcard {
            return true;
        }
        origin
            .to_str()
            .ok()
            .is_some_and(|o| self.origins.iter().any(|allowed| allowed == o))
    }

    fn origin_headers(&self, origin: HeaderValue, headers: &mut HeaderMap) {
        if self.wildcard {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
            return;
        }
        // One origin per response, echoed back.
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(VARY, HeaderValue::from_static("Origin"));
        if self.allow_credentials {
            headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
    }
}

fn empty_response(status: StatusCode, headers: HeaderMap) -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn header_value(value: &str) -> Result<HeaderValue, CorsConfigError> {
    HeaderValue::from_str(value).map_err(|_| CorsConfigError::InvalidHeader {
        value: value.to_string(),
    })
}

/// `scheme://host[:port]`, as a browser sends it.
fn normalize_origin(origin: &str) -> Result<String, CorsConfigError> {
    let invalid = || CorsConfigError::InvalidOriginFormat {
        origin: origin.to_string(),
    };
    let url = Url::parse(origin).map_err(|_| invalid())?;
    if url.host_str().is_none() || !matches!(url.path(), "" | "/") || url.query().is_some() {
        return Err(invalid());
    }
    let serialized = url.origin().ascii_serialization();
    if serialized == "null" {
        return Err(invalid());
    }
    Ok(serialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_with_credentials_is_rejected() {
        let err = CorsOptions::permissive()
            .allow_credentials(true)
            .compile()
            .unwrap_err();
        assert_eq!(err, CorsConfigError::WildcardWithCredentials);
        assert!(err.to_string().contains("wildcard"));
    }

    #[test]
    fn test_credentials_need_origins() {
        let err = CorsOptions::new().allow_credentials(true).compile().unwrap_err();
        assert_eq!(err, CorsConfigError::EmptyOriginsWithCredentials);
    }

    #[test]
    fn test_origin_format() {
        assert_eq!(
            normalize_origin("https://example.com/").unwrap(),
            "https://example.com"
        );
        assert_eq!(
            normalize_origin("http://localhost:3000").unwrap(),
            "http://localhost:3000"
        );
        assert!(matches!(
            normalize_origin("example.com"),
            Err(CorsConfigError::InvalidOriginFormat { .. })
        ));
        assert!(normalize_origin("https://example.com/app").is_err());
    }

    #[test]
    fn test_exact_origin_matching() {
        let cors = CorsOptions::new()
            .allowed_origins(&["https://example.com"])
            .compile()
            .unwrap();
        assert!(cors.origin_allowed(&HeaderValue::from_static("https://example.com")));
        assert!(!cors.origin_allowed(&HeaderValue::from_static("https://evil.com")));
        assert!(!cors.origin_allowed(&HeaderValue::from_static("https://example.com.evil.com")));
    }
}
