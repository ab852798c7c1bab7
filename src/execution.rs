//! Per-call coordination of request logging, transport execution and response capture.
//!
//! An [`Execution`] lives for exactly one intercepted call. Its steps are encoded in the
//! types so they can only run in order:
//!
//! ```text
//! Execution::new(request)
//!     .log_request(handler)      // request entry, before the transport is called
//!     .execute(next).await?      // -> Executed<R>
//!     .log_response(handler)     // response entry, before the caller sees the response
//!     .await                     // -> ReplayableResponse<R>
//! ```

use axum::http::Request;
use bytes::Bytes;
use std::future::Future;
use std::time::{Instant, SystemTime};
use uuid::Uuid;

use crate::{
    capture::capture,
    charset::{decode, resolve_charset},
    replay::ReplayableResponse,
    response::ClientResponse,
    types::{convert_headers, CorrelationId, RequestData, ResponseData},
    RequestHandler,
};

/// A call whose request has not been sent yet.
#[derive(Debug)]
pub struct Execution {
    correlation_id: CorrelationId,
    request: Request<Bytes>,
    started: Instant,
}

/// A call whose transport returned a response that has not been captured yet.
#[derive(Debug)]
pub struct Executed<R> {
    correlation_id: CorrelationId,
    started: Instant,
    response: R,
}

impl Execution {
    /// Starts a call with a freshly generated correlation id.
    pub fn new(request: Request<Bytes>) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            request,
            started: Instant::now(),
        }
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    /// Hands the request entry to `handler`. The request itself is not modified.
    pub fn log_request<H: RequestHandler + ?Sized>(self, handler: &H) -> Self {
        handler.handle_request(self.request_data());
        self
    }

    fn request_data(&self) -> RequestData {
        let headers = self.request.headers();
        let bytes = self.request.body();

        let body = if bytes.is_empty() {
            None
        } else {
            let charset = resolve_charset(headers);
            decode(bytes, charset).ok()
        };

        RequestData {
            correlation_id: self.correlation_id,
            timestamp: SystemTime::now(),
            method: self.request.method().clone(),
            uri: self.request.uri().clone(),
            headers: convert_headers(headers),
            body,
        }
    }

    /// Sends the request through `next`, exactly once.
    ///
    /// The request is passed on unchanged and an error from `next` is returned as is.
    pub async fn execute<N, Fut, R, E>(self, next: N) -> Result<Executed<R>, E>
    where
        N: FnOnce(Request<Bytes>) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let Self {
            correlation_id,
            request,
            started,
        } = self;

        let response = next(request).await?;

        Ok(Executed {
            correlation_id,
            started,
            response,
        })
    }
}

impl<R: ClientResponse> Executed<R> {
    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    /// Captures the response, hands the response entry to `handler` and returns a
    /// response that replays the captured body.
    pub async fn log_response<H: RequestHandler + ?Sized>(
        self,
        handler: &H,
    ) -> ReplayableResponse<R> {
        let duration = self.started.elapsed();
        let Self {
            correlation_id,
            mut response,
            ..
        } = self;

        let captured = capture(&mut response).await;

        handler.handle_response(ResponseData {
            correlation_id,
            timestamp: SystemTime::now(),
            duration,
            status: captured.status,
            status_text: captured.status_text.clone(),
            headers: captured.headers.as_ref().map(convert_headers),
            body: captured.body_text.clone(),
        });

        ReplayableResponse::new(response, captured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResponseError;
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Method, StatusCode},
        response::Response,
    };
    use encoding_rs::SHIFT_JIS;
    use http_body_util::BodyExt;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHandler {
        requests: Mutex<Vec<RequestData>>,
        responses: Mutex<Vec<ResponseData>>,
    }

    impl RequestHandler for RecordingHandler {
        fn is_enabled(&self) -> bool {
            true
        }

        fn handle_request(&self, data: RequestData) {
            self.requests.lock().unwrap().push(data);
        }

        fn handle_response(&self, data: ResponseData) {
            self.responses.lock().unwrap().push(data);
        }
    }

    fn request(content_type: Option<&str>, body: impl Into<Bytes>) -> Request<Bytes> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("https://api.example.com/items?page=2");
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        builder.body(body.into()).unwrap()
    }

    #[test]
    fn test_request_entry_decodes_body() {
        let handler = RecordingHandler::default();

        let execution =
            Execution::new(request(Some("application/json"), r#"{"a":1}"#)).log_request(&handler);

        let requests = handler.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let data = &requests[0];
        assert_eq!(data.correlation_id, execution.correlation_id());
        assert_eq!(data.method, Method::POST);
        assert_eq!(data.uri, "https://api.example.com/items?page=2");
        assert_eq!(data.body.as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(data.headers["content-type"], vec!["application/json"]);
    }

    #[test]
    fn test_request_entry_uses_declared_charset() {
        let handler = RecordingHandler::default();
        let (bytes, _, _) = SHIFT_JIS.encode("テスト");

        Execution::new(request(
            Some("text/plain; charset=Shift_JIS"),
            bytes.into_owned(),
        ))
        .log_request(&handler);

        let requests = handler.requests.lock().unwrap();
        assert_eq!(requests[0].body.as_deref(), Some("テスト"));
    }

    #[test]
    fn test_empty_request_body_is_absent() {
        let handler = RecordingHandler::default();

        Execution::new(request(None, Bytes::new())).log_request(&handler);

        let requests = handler.requests.lock().unwrap();
        assert!(requests[0].body.is_none());
    }

    #[test]
    fn test_undecodable_request_body_is_absent() {
        let handler = RecordingHandler::default();

        Execution::new(request(None, Bytes::from_static(b"\xc3\x28"))).log_request(&handler);

        let requests = handler.requests.lock().unwrap();
        assert!(requests[0].body.is_none());
    }

    #[tokio::test]
    async fn test_execute_passes_request_unchanged() {
        let original = request(Some("application/json"), r#"{"a":1}"#);
        let expected_headers = original.headers().clone();

        let executed = Execution::new(original)
            .execute(|sent: Request<Bytes>| async move {
                assert_eq!(sent.method(), Method::POST);
                assert_eq!(sent.uri(), "https://api.example.com/items?page=2");
                assert_eq!(sent.headers(), &expected_headers);
                assert_eq!(sent.body(), r#"{"a":1}"#);
                Ok::<_, ResponseError>(Response::new(Body::from("ok")))
            })
            .await;

        assert!(executed.is_ok());
    }

    #[tokio::test]
    async fn test_execute_propagates_transport_error() {
        #[derive(Debug, PartialEq)]
        struct ConnectError;

        let result = Execution::new(request(None, Bytes::new()))
            .execute(|_| async { Err::<Response<Body>, _>(ConnectError) })
            .await;

        assert!(matches!(result, Err(ConnectError)));
    }

    #[tokio::test]
    async fn test_response_entry_shares_correlation_id() {
        let handler = RecordingHandler::default();

        let replayable = Execution::new(request(Some("application/json"), r#"{"a":1}"#))
            .log_request(&handler)
            .execute(|_| async {
                Ok::<_, ResponseError>(
                    Response::builder()
                        .status(StatusCode::OK)
                        .header(CONTENT_TYPE, "text/plain")
                        .body(Body::from("ok"))
                        .unwrap(),
                )
            })
            .await
            .unwrap()
            .log_response(&handler)
            .await;

        let requests = handler.requests.lock().unwrap();
        let responses = handler.responses.lock().unwrap();
        assert_eq!(responses.len(), 1);
        let data = &responses[0];
        assert_eq!(data.correlation_id, requests[0].correlation_id);
        assert_eq!(data.status, Some(StatusCode::OK));
        assert_eq!(data.status_text.as_deref(), Some("OK"));
        assert_eq!(data.body.as_deref(), Some("ok"));
        assert_eq!(
            data.headers.as_ref().unwrap()["content-type"],
            vec!["text/plain"]
        );

        let body = replayable.body().unwrap().collect().await.unwrap().to_bytes();
        assert_eq!(body, "ok");
    }
}
