//! Data types for logged HTTP request and response information.
//!
//! These are the values handed to a [`RequestHandler`](crate::RequestHandler): one
//! [`RequestData`] before the transport is called and one [`ResponseData`] once the
//! response has been captured. Both carry the same correlation id.

use axum::http::{HeaderMap, Method, StatusCode, Uri};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Unique per-call identifier pairing a request log entry with its response log entry.
pub type CorrelationId = Uuid;

/// Header mapping as logged: lower-cased name to every value sent under it.
///
/// Values that are not visible ASCII are rendered lossily.
pub type LoggedHeaders = BTreeMap<String, Vec<String>>;

/// Data logged for an outgoing request.
#[derive(Debug, Clone)]
pub struct RequestData {
    /// Identifier shared with the matching [`ResponseData`]
    pub correlation_id: CorrelationId,
    /// When the request was logged
    pub timestamp: SystemTime,
    /// HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Target URI of the request
    pub uri: Uri,
    /// Request headers
    pub headers: LoggedHeaders,
    /// Request body decoded with its declared charset. `None` when the body is empty
    /// or cannot be decoded; never `Some("")`.
    pub body: Option<String>,
}

/// Data logged for a captured response.
///
/// Every field read from the response is optional: a field that could not be captured
/// is `None` while the others are still reported.
#[derive(Debug, Clone)]
pub struct ResponseData {
    /// Identifier shared with the matching [`RequestData`]
    pub correlation_id: CorrelationId,
    /// When the response was logged
    pub timestamp: SystemTime,
    /// Time from logging the request until the transport returned
    pub duration: Duration,
    pub status: Option<StatusCode>,
    pub status_text: Option<String>,
    pub headers: Option<LoggedHeaders>,
    /// Response body decoded with its declared charset
    pub body: Option<String>,
}

/// Convert a [`HeaderMap`] into its logged form
pub(crate) fn convert_headers(headers: &HeaderMap) -> LoggedHeaders {
    let mut result = LoggedHeaders::new();
    for (name, value) in headers {
        result
            .entry(name.as_str().to_owned())
            .or_insert_with(Vec::new)
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    result
}
