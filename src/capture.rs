//! Safe capture of a one-shot response.
//!
//! [`capture`] drains the response body into memory and reads status, status text and
//! headers. Each field is extracted independently: a failure on one of them leaves that
//! field absent and never prevents the others from being captured.

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};
use http_body_util::BodyExt;

use crate::{
    charset::{decode, resolve_charset},
    error::ResponseError,
    response::ClientResponse,
};

/// Snapshot of a response taken after its body was drained.
///
/// Every field is optional on its own; see the module documentation.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    /// Charset used to decode the body, resolved from the response headers
    pub charset: &'static Encoding,
    /// Raw body bytes, absent if the body stream could not be read
    pub body: Option<Bytes>,
    /// Body decoded with `charset`, absent if reading or decoding failed
    pub body_text: Option<String>,
    pub status: Option<StatusCode>,
    pub status_text: Option<String>,
    pub headers: Option<HeaderMap>,
}

/// Captures `response`, leaving its body stream exhausted.
///
/// Capture never fails as a whole; see [`CapturedResponse`].
pub async fn capture<R: ClientResponse>(response: &mut R) -> CapturedResponse {
    let charset = response
        .headers()
        .map(resolve_charset)
        .unwrap_or(UTF_8);

    let body = read_body(response).await;
    let body_text = body
        .as_ref()
        .ok()
        .and_then(|bytes| decode(bytes, charset).ok());

    CapturedResponse {
        charset,
        body: body.ok(),
        body_text,
        status: response.status().ok(),
        status_text: response.status_text().ok(),
        headers: response.headers().ok().cloned(),
    }
}

/// Drains the body stream. The stream is owned here, so it is dropped (and the
/// connection released) on every path out, including a failure halfway through.
async fn read_body<R: ClientResponse>(response: &mut R) -> Result<Bytes, ResponseError> {
    let body = response.take_body()?;
    let collected = body
        .collect()
        .await
        .map_err(|e| ResponseError::Stream(e.to_string()))?;
    Ok(collected.to_bytes())
}
