//! The response access surface shared by transport responses and replayed responses.

use axum::{
    body::Body,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use hyper::ext::ReasonPhrase;

use crate::{error::ResponseError, replay::ReplayableResponse};

/// Access to an HTTP response returned by the transport.
///
/// Every accessor is fallible so that transports which can only produce some of the
/// response lazily (or not at all) can report it. Status, status text and headers are
/// expected to be repeatable; the body is a one-shot stream.
///
/// Implemented for [`Response<Body>`], which is what axum and hyper based transports
/// hand back.
pub trait ClientResponse: Send + 'static {
    /// The response status.
    fn status(&self) -> Result<StatusCode, ResponseError>;

    /// The status text (reason phrase) of the response.
    ///
    /// This is the phrase the server sent when the transport kept it, otherwise the
    /// canonical phrase for the status.
    fn status_text(&self) -> Result<String, ResponseError>;

    /// The response headers.
    fn headers(&self) -> Result<&HeaderMap, ResponseError>;

    /// Takes the response body stream.
    ///
    /// A transport response yields its stream only once; later calls may return an
    /// empty body. A [`ReplayableResponse`] yields a fresh stream on every call.
    fn take_body(&mut self) -> Result<Body, ResponseError>;

    /// Releases the resources held by the response.
    fn close(&mut self);
}

impl ClientResponse for Response<Body> {
    fn status(&self) -> Result<StatusCode, ResponseError> {
        Ok(Response::status(self))
    }

    fn status_text(&self) -> Result<String, ResponseError> {
        // hyper only records the phrase when it differs from the canonical one
        if let Some(reason) = self.extensions().get::<ReasonPhrase>() {
            return Ok(String::from_utf8_lossy(reason.as_bytes()).into_owned());
        }
        Ok(Response::status(self)
            .canonical_reason()
            .unwrap_or_default()
            .to_owned())
    }

    fn headers(&self) -> Result<&HeaderMap, ResponseError> {
        Ok(Response::headers(self))
    }

    fn take_body(&mut self) -> Result<Body, ResponseError> {
        Ok(std::mem::replace(self.body_mut(), Body::empty()))
    }

    fn close(&mut self) {
        // Dropping the stream hands the connection back to the transport.
        drop(std::mem::replace(self.body_mut(), Body::empty()));
    }
}

/// The response produced by the interceptor.
///
/// When logging is inactive the transport response is handed back untouched; otherwise
/// it has been captured and wrapped for replay.
#[derive(Debug)]
pub enum InterceptedResponse<R> {
    /// Logging was inactive; this is exactly what the transport returned.
    Passthrough(R),
    /// Logging was active; the body was captured and can be read repeatedly.
    Replayable(ReplayableResponse<R>),
}

impl<R: ClientResponse> InterceptedResponse<R> {
    pub fn is_replayable(&self) -> bool {
        matches!(self, Self::Replayable(_))
    }

    pub fn as_replayable(&self) -> Option<&ReplayableResponse<R>> {
        match self {
            Self::Passthrough(_) => None,
            Self::Replayable(replayable) => Some(replayable),
        }
    }

    /// Returns the transport response if no replay wrapper was applied.
    pub fn into_passthrough(self) -> Option<R> {
        match self {
            Self::Passthrough(response) => Some(response),
            Self::Replayable(_) => None,
        }
    }

    /// Converts into a plain [`Response<Body>`] for downstream code.
    ///
    /// Status and headers are read from the transport response; a failure to read either
    /// is reported rather than guessed.
    pub fn into_response(mut self) -> Result<Response<Body>, ResponseError> {
        let status = self.status()?;
        let headers = self.headers()?.clone();
        let body = self.take_body()?;

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

impl<R: ClientResponse> ClientResponse for InterceptedResponse<R> {
    fn status(&self) -> Result<StatusCode, ResponseError> {
        match self {
            Self::Passthrough(response) => response.status(),
            Self::Replayable(response) => response.status(),
        }
    }

    fn status_text(&self) -> Result<String, ResponseError> {
        match self {
            Self::Passthrough(response) => response.status_text(),
            Self::Replayable(response) => response.status_text(),
        }
    }

    fn headers(&self) -> Result<&HeaderMap, ResponseError> {
        match self {
            Self::Passthrough(response) => response.headers(),
            Self::Replayable(response) => response.headers(),
        }
    }

    fn take_body(&mut self) -> Result<Body, ResponseError> {
        match self {
            Self::Passthrough(response) => response.take_body(),
            Self::Replayable(response) => response.take_body(),
        }
    }

    fn close(&mut self) {
        match self {
            Self::Passthrough(response) => response.close(),
            Self::Replayable(response) => response.close(),
        }
    }
}
