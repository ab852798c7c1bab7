//! Replay of a captured response.

use axum::{
    body::Body,
    http::{HeaderMap, StatusCode},
};
use bytes::Bytes;
use encoding_rs::Encoding;

use crate::{capture::CapturedResponse, error::ResponseError, response::ClientResponse};

/// A response whose body has been captured into memory and can be read any number of
/// times.
///
/// Status, status text and headers are read from the original response on every call.
/// The body is served from the captured bytes: each call to [`body`](Self::body) returns
/// a new stream positioned at the start. Closing delegates to the original response.
#[derive(Debug)]
pub struct ReplayableResponse<R> {
    original: R,
    body: Option<Bytes>,
    body_text: Option<String>,
    charset: &'static Encoding,
}

impl<R: ClientResponse> ReplayableResponse<R> {
    /// Wraps `original`, whose body has already been drained into `captured`.
    pub fn new(original: R, captured: CapturedResponse) -> Self {
        Self {
            original,
            body: captured.body,
            body_text: captured.body_text,
            charset: captured.charset,
        }
    }

    /// A fresh stream over the captured body.
    ///
    /// Fails with [`ResponseError::BodyNotCaptured`] when the original body could not be
    /// read, so that a lost body is never mistaken for an empty one.
    pub fn body(&self) -> Result<Body, ResponseError> {
        self.bytes().map(Body::from)
    }

    /// The captured body bytes.
    pub fn bytes(&self) -> Result<Bytes, ResponseError> {
        self.body.clone().ok_or(ResponseError::BodyNotCaptured)
    }

    /// The captured body decoded with [`charset`](Self::charset), if it could be decoded.
    pub fn text(&self) -> Option<&str> {
        self.body_text.as_deref()
    }

    /// The charset the body was decoded with.
    pub fn charset(&self) -> &'static Encoding {
        self.charset
    }

    pub fn original(&self) -> &R {
        &self.original
    }
}

impl<R: ClientResponse> ClientResponse for ReplayableResponse<R> {
    fn status(&self) -> Result<StatusCode, ResponseError> {
        self.original.status()
    }

    fn status_text(&self) -> Result<String, ResponseError> {
        self.original.status_text()
    }

    fn headers(&self) -> Result<&HeaderMap, ResponseError> {
        self.original.headers()
    }

    fn take_body(&mut self) -> Result<Body, ResponseError> {
        self.body()
    }

    fn close(&mut self) {
        self.original.close();
    }
}
