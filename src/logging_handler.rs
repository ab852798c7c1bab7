//! Logging implementation of [`RequestHandler`] backed by `tracing`.

use tracing::{debug, enabled, Level};

use crate::{RequestData, RequestHandler, ResponseData};

/// Logs request and response entries as `DEBUG` events.
///
/// Logging is active whenever the installed subscriber enables `DEBUG` for this crate,
/// e.g. `RUST_LOG=replay_log=debug`. When it is not, the interceptor skips capture
/// entirely.
///
/// Each call produces exactly two events sharing a `correlation_id` field:
///
/// - `Request`: `method`, `uri`, `body`, `headers`
/// - `Response`: `status`, `status_text`, `body`, `headers`, `duration_ms`
///
/// Fields that could not be captured are logged as `None`.
///
/// # Examples
///
/// ```rust
/// use replay_log::{Interceptor, LoggingHandler};
///
/// let interceptor = Interceptor::new(LoggingHandler);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LoggingHandler;

impl RequestHandler for LoggingHandler {
    fn is_enabled(&self) -> bool {
        enabled!(Level::DEBUG)
    }

    fn handle_request(&self, data: RequestData) {
        debug!(
            correlation_id = %data.correlation_id,
            method = %data.method,
            uri = %data.uri,
            body = ?data.body,
            headers = ?data.headers,
            "Request"
        );
    }

    fn handle_response(&self, data: ResponseData) {
        debug!(
            correlation_id = %data.correlation_id,
            status = ?data.status.map(|status| status.as_u16()),
            status_text = ?data.status_text,
            body = ?data.body,
            headers = ?data.headers,
            duration_ms = data.duration.as_millis() as u64,
            "Response"
        );
    }
}
