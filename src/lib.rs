//! # Replay Log
//!
//! An HTTP client middleware that logs every outgoing request and its response while
//! leaving the response body readable for the caller.
//!
//! A response body is a stream that can be read only once. When logging is active, the
//! interceptor drains the body into memory, logs it, and hands back a
//! [`ReplayableResponse`] that serves the captured body as many times as it is asked
//! for. When logging is inactive, the transport's response is returned untouched and no
//! capture takes place.
//!
//! ## Features
//!
//! - **Correlated entries**: the request and response entries of a call share a
//!   freshly generated correlation id
//! - **Charset aware**: bodies are decoded with the charset declared by `Content-Type`,
//!   defaulting to UTF-8
//! - **Tolerant capture**: a failure reading one response field never prevents logging
//!   the others, and never fails the call
//! - **Transport agnostic**: works as a `tower` layer around any client service, or as a
//!   plain function around a closure
//!
//! ## Quick Start
//!
//! ```rust
//! use axum::{body::Body, http::Request, response::Response};
//! use bytes::Bytes;
//! use http_body_util::BodyExt;
//! use replay_log::{ClientResponse, LoggingLayer};
//! use std::convert::Infallible;
//! use tower::{service_fn, ServiceBuilder, ServiceExt};
//!
//! # #[tokio::main]
//! # async fn main() {
//! // Any service from `Request<Bytes>` to `Response<Body>` can act as the transport.
//! let transport = service_fn(|_request: Request<Bytes>| async {
//!     Ok::<_, Infallible>(Response::new(Body::from("ok")))
//! });
//!
//! let client = ServiceBuilder::new()
//!     .layer(LoggingLayer::default())
//!     .service(transport);
//!
//! let request = Request::post("https://api.example.com/items")
//!     .header("content-type", "application/json")
//!     .body(Bytes::from(r#"{"a":1}"#))
//!     .unwrap();
//!
//! let mut response = client.oneshot(request).await.unwrap();
//! let body = response.take_body().unwrap().collect().await.unwrap().to_bytes();
//! assert_eq!(body, "ok");
//! # }
//! ```
//!
//! ## Custom Handlers
//!
//! Implement the [`RequestHandler`] trait to send the entries somewhere other than
//! `tracing`:
//!
//! ```rust
//! use replay_log::{RequestData, RequestHandler, ResponseData};
//!
//! #[derive(Debug)]
//! struct PrintHandler;
//!
//! impl RequestHandler for PrintHandler {
//!     fn handle_request(&self, data: RequestData) {
//!         println!("[{}] {} {}", data.correlation_id, data.method, data.uri);
//!     }
//!
//!     fn handle_response(&self, data: ResponseData) {
//!         println!("[{}] {:?} {:?}", data.correlation_id, data.status, data.body);
//!     }
//! }
//! ```

use axum::http::Request;
use bytes::Bytes;
use futures::future::BoxFuture;
use std::{
    future::Future,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};

pub mod capture;
pub mod charset;
pub mod error;
pub use error::ResponseError;

pub mod execution;
use execution::Execution;

pub mod replay;
pub use replay::ReplayableResponse;

pub mod response;
pub use response::{ClientResponse, InterceptedResponse};

pub mod types;
pub use types::{CorrelationId, LoggedHeaders, RequestData, ResponseData};

pub mod logging_handler;
pub use logging_handler::LoggingHandler;

/// Trait for receiving logged request and response entries.
///
/// For every intercepted call, [`handle_request`](Self::handle_request) is called before
/// the transport runs and [`handle_response`](Self::handle_response) is called before the
/// response is handed back; both receive the same correlation id. Handlers are shared
/// between concurrent calls and must not rely on being called from a single task.
///
/// Handlers are called inline, so they should be quick. Any failure while building an
/// entry has already been turned into an absent field by the time a handler sees it.
pub trait RequestHandler: Send + Sync + 'static {
    /// Whether logging is active.
    ///
    /// Checked once per call. When it returns `false` the request goes straight to the
    /// transport: no correlation id, no capture, no replay wrapper.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Handle the entry of an outgoing request.
    fn handle_request(&self, data: RequestData);

    /// Handle the entry of a captured response.
    fn handle_response(&self, data: ResponseData);
}

/// Entry point invoked once per outgoing request.
///
/// The interceptor holds nothing but its handler, so a single instance can be cloned
/// and shared by any number of concurrent calls; every call gets its own
/// [`Execution`].
///
/// # Examples
///
/// ```rust
/// use axum::{body::Body, http::Request, response::Response};
/// use bytes::Bytes;
/// use replay_log::{Interceptor, LoggingHandler};
/// use std::convert::Infallible;
///
/// # #[tokio::main]
/// # async fn main() {
/// let interceptor = Interceptor::new(LoggingHandler);
/// let request = Request::get("https://api.example.com/health")
///     .body(Bytes::new())
///     .unwrap();
///
/// let response = interceptor
///     .intercept(request, |request| async move {
///         // send `request` over the wire
///         Ok::<_, Infallible>(Response::new(Body::from("up")))
///     })
///     .await
///     .unwrap();
/// # }
/// ```
pub struct Interceptor<H> {
    handler: Arc<H>,
}

impl<H: RequestHandler> Interceptor<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Sends `request` through `next`, logging both sides when the handler is enabled.
    ///
    /// `next` is called exactly once with the request unchanged, and its error is
    /// returned as is. Logging never fails the call.
    pub async fn intercept<N, Fut, R, E>(
        &self,
        request: Request<Bytes>,
        next: N,
    ) -> Result<InterceptedResponse<R>, E>
    where
        N: FnOnce(Request<Bytes>) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        R: ClientResponse,
    {
        if !self.handler.is_enabled() {
            return next(request).await.map(InterceptedResponse::Passthrough);
        }

        let handler = self.handler.as_ref();
        let response = Execution::new(request)
            .log_request(handler)
            .execute(next)
            .await?
            .log_response(handler)
            .await;

        Ok(InterceptedResponse::Replayable(response))
    }
}

impl<H> Clone for Interceptor<H> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
        }
    }
}

impl Default for Interceptor<LoggingHandler> {
    fn default() -> Self {
        Self::new(LoggingHandler)
    }
}

/// Tower layer for the logging middleware.
///
/// Wraps a client service (the transport) in a [`LoggingService`].
///
/// # Examples
///
/// ```rust
/// use replay_log::{LoggingHandler, LoggingLayer};
/// use tower::ServiceBuilder;
///
/// let layer = LoggingLayer::new(LoggingHandler);
/// let builder = ServiceBuilder::new().layer(layer);
/// ```
pub struct LoggingLayer<H> {
    interceptor: Interceptor<H>,
}

impl<H: RequestHandler> LoggingLayer<H> {
    pub fn new(handler: H) -> Self {
        Self {
            interceptor: Interceptor::new(handler),
        }
    }
}

impl<H> Clone for LoggingLayer<H> {
    fn clone(&self) -> Self {
        Self {
            interceptor: self.interceptor.clone(),
        }
    }
}

impl Default for LoggingLayer<LoggingHandler> {
    fn default() -> Self {
        Self::new(LoggingHandler)
    }
}

impl<S, H> Layer<S> for LoggingLayer<H> {
    type Service = LoggingService<S, H>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingService {
            inner,
            interceptor: self.interceptor.clone(),
        }
    }
}

/// Tower service implementation for the logging middleware.
///
/// Users typically don't interact with this type directly - it's created by
/// [`LoggingLayer`].
pub struct LoggingService<S, H> {
    inner: S,
    interceptor: Interceptor<H>,
}

impl<S: Clone, H> Clone for LoggingService<S, H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            interceptor: self.interceptor.clone(),
        }
    }
}

impl<S, H, R> Service<Request<Bytes>> for LoggingService<S, H>
where
    S: Service<Request<Bytes>, Response = R> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    R: ClientResponse,
    H: RequestHandler,
{
    type Response = InterceptedResponse<R>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        // Drive the instance that was polled ready, leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let interceptor = self.interceptor.clone();

        Box::pin(async move {
            interceptor
                .intercept(request, move |request| inner.call(request))
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, response::Response};
    use std::convert::Infallible;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    /// Handler that records entries and can be switched off
    #[derive(Default)]
    struct RecordingHandler {
        disabled: bool,
        requests: Mutex<Vec<RequestData>>,
        responses: Mutex<Vec<ResponseData>>,
    }

    impl RequestHandler for RecordingHandler {
        fn is_enabled(&self) -> bool {
            !self.disabled
        }

        fn handle_request(&self, data: RequestData) {
            self.requests.lock().unwrap().push(data);
        }

        fn handle_response(&self, data: ResponseData) {
            self.responses.lock().unwrap().push(data);
        }
    }

    fn get(uri: &str) -> Request<Bytes> {
        Request::get(uri).body(Bytes::new()).unwrap()
    }

    #[tokio::test]
    async fn test_disabled_handler_passes_through() {
        let interceptor = Interceptor::new(RecordingHandler {
            disabled: true,
            ..Default::default()
        });

        let response = interceptor
            .intercept(get("/health"), |_| async {
                Ok::<_, Infallible>(Response::new(Body::from("up")))
            })
            .await
            .unwrap();

        assert!(!response.is_replayable());
        assert!(interceptor.handler().requests.lock().unwrap().is_empty());
        assert!(interceptor.handler().responses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enabled_handler_wraps_response() {
        let interceptor = Interceptor::new(RecordingHandler::default());

        let response = interceptor
            .intercept(get("/health"), |_| async {
                Ok::<_, Infallible>(Response::new(Body::from("up")))
            })
            .await
            .unwrap();

        assert!(response.is_replayable());
        assert_eq!(interceptor.handler().requests.lock().unwrap().len(), 1);
        assert_eq!(interceptor.handler().responses.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_next_called_exactly_once() {
        let calls = AtomicUsize::new(0);
        let interceptor = Interceptor::new(RecordingHandler::default());

        interceptor
            .intercept(get("/once"), |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(Response::new(Body::empty()))
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_error_propagates_unchanged() {
        #[derive(Debug, PartialEq)]
        struct Timeout(&'static str);

        let interceptor = Interceptor::new(RecordingHandler::default());

        let result = interceptor
            .intercept(get("/slow"), |_| async {
                Err::<Response<Body>, _>(Timeout("read timed out"))
            })
            .await;

        match result {
            Err(e) => assert_eq!(e, Timeout("read timed out")),
            Ok(_) => panic!("transport error was swallowed"),
        }
        // The request was logged before the transport ran; no response entry follows.
        assert_eq!(interceptor.handler().requests.lock().unwrap().len(), 1);
        assert!(interceptor.handler().responses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_request_logged_before_transport_runs() {
        let interceptor = Interceptor::new(RecordingHandler::default());
        let handler = interceptor.handler();

        interceptor
            .intercept(get("/ordered"), |_| async {
                assert_eq!(handler.requests.lock().unwrap().len(), 1);
                assert!(handler.responses.lock().unwrap().is_empty());
                Ok::<_, Infallible>(Response::new(Body::empty()))
            })
            .await
            .unwrap();
    }
}
