//! # Runtime Configuration Module
//!
//! Environment-driven settings that change how a built application behaves.
//!
//! ## Environment Variables
//!
//! ### `HOOKLINE_ENV`
//!
//! Runtime mode. `production` hides stack traces in error bodies; any other value
//! (or none) exposes them.
//!
//! ### `HOOKLINE_STRICT_ROUTES`
//!
//! `true` or `1` makes a duplicate `(method, path)` registration fail the build
//! instead of overwriting the earlier route with a warning.
//!
//! Default: off
//!
//! ### `HOOKLINE_ORIGIN`
//!
//! Origin used to compute the absolute request URL when the request URI is relative.
//!
//! Default: `http://localhost`
//!
//! ## Usage
//!
//! ```rust
//! use hookline::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Stack traces exposed: {}", config.expose_stack());
//! ```
//!
//! ## Example Configuration
//!
//! ```bash
//! export HOOKLINE_ENV=production
//! export HOOKLINE_STRICT_ROUTES=true
//! export HOOKLINE_ORIGIN=https://api.example.com
//!
//! cargo run --bin hookline-demo
//! ```

use std::env;

pub const DEFAULT_ORIGIN: &str = "http://localhost";

/// Runtime configuration loaded from environment variables.
///
/// Load this at startup using [`RuntimeConfig::from_env()`], or build one directly
/// and hand it to [`AppOptions`](crate::app::AppOptions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Production mode hides stack traces (default: false)
    pub production: bool,
    /// Reject duplicate route registrations (default: false)
    pub strict_routes: bool,
    /// Origin for URL computation (default: `http://localhost`)
    pub origin: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            production: false,
            strict_routes: false,
            origin: DEFAULT_ORIGIN.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let production = env::var("HOOKLINE_ENV")
            .map(|v| v.trim().eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        let strict_routes = env::var("HOOKLINE_STRICT_ROUTES")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        let origin = env::var("HOOKLINE_ORIGIN")
            .ok()
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_ORIGIN.to_string());
        RuntimeConfig {
            production,
            strict_routes,
            origin,
        }
    }

    /// Whether error bodies carry a `stack`.
    #[inline]
    #[must_use]
    pub fn expose_stack(&self) -> bool {
        !self.production
    }

    #[must_use]
    pub fn production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    #[must_use]
    pub fn strict_routes(mut self, strict: bool) -> Self {
        self.strict_routes = strict;
        self
    }

    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_expose_stack() {
        let config = RuntimeConfig::default();
        assert!(config.expose_stack());
        assert!(!config.strict_routes);
        assert_eq!(config.origin, DEFAULT_ORIGIN);
    }

    #[test]
    fn builders_override() {
        let config = RuntimeConfig::default()
            .production(true)
            .strict_routes(true)
            .origin("https://api.example.com");
        assert!(!config.expose_stack());
        assert!(config.strict_routes);
        assert_eq!(config.origin, "https://api.example.com");
    }

    #[test]
    fn flag_parsing() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag(" 1 "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("nope"));
    }
}
