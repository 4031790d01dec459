//! Access logging.

use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, field, info};

use crate::app::App;
use crate::hooks::HookOutcome;

/// Context key holding the request start, in milliseconds since the Unix epoch.
pub const REQUEST_STARTED_AT_KEY: &str = "request_started_at";

/// Build the request logger plugin.
///
/// Emits one `info!` line per completed request with `method`, `path`, `route`,
/// `status`, `duration_ms` and `request_id`, after the response has been sent.
/// A failed request also carries its `error`; the failure itself is logged once, by the
/// dispatcher.
#[must_use]
pub fn request_logger() -> App {
    App::new()
        .on_global_request(|ctx| {
            let started_at = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default();
            debug!(
                request_id = %ctx.request_id(),
                method = %ctx.method(),
                path = %ctx.path(),
                "Request started"
            );
            Box::pin(async move { Ok(HookOutcome::patch(REQUEST_STARTED_AT_KEY, started_at)) })
        })
        .on_global_after_response(|ctx| {
            info!(
                request_id = %ctx.request_id(),
                method = %ctx.method(),
                path = %ctx.path(),
                route = ctx.route.as_deref().unwrap_or("-"),
                status = ctx.set.status.as_u16(),
                duration_ms = ctx.elapsed().as_millis() as u64,
                error = ctx.error.as_ref().map(field::display),
                "Request completed"
            );
            Box::pin(async { Ok(()) })
        })
        .export()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::Stage;

    #[test]
    fn test_registers_only_global_hooks() {
        let app = request_logger();
        assert!(app.is_exported());
        assert_eq!(app.hooks().len(Stage::GlobalRequest), 1);
        assert_eq!(app.hooks().len(Stage::GlobalError), 0);
        assert_eq!(app.hooks().len(Stage::GlobalAfterResponse), 1);
        assert_eq!(app.hooks().len(Stage::Transform), 0);
    }
}
