//! # Plugins
//!
//! Reusable applications that only register global hooks. Compose them into a
//! parent with [`App::use_app`](crate::app::App::use_app):
//!
//! ```rust
//! use hookline::app::App;
//! use hookline::plugins::{cors, request_logger, CorsOptions};
//!
//! let cors = cors(CorsOptions::new().allowed_origins(&["https://example.com"]))
//!     .expect("valid CORS options");
//! let app = App::new().use_app(&cors).use_app(&request_logger());
//! ```
//!
//! | Plugin | Stages |
//! |--------|--------|
//! | [`cors`] | global request |
//! | [`request_logger`] | global request, global after response |

mod cors;
mod request_logger;

pub use cors::{cors, CorsConfigError, CorsOptions};
pub use request_logger::{request_logger, REQUEST_STARTED_AT_KEY};
