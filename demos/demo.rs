use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, Response},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::{client::legacy::Client, rt::TokioExecutor};
use replay_log::{ClientResponse, LoggingLayer};
use std::time::Duration;
use tokio::{net::TcpListener, time::sleep};
use tower::{ServiceBuilder, ServiceExt};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// Handlers for the upstream server the demo client talks to
async fn hello_handler() -> impl IntoResponse {
    sleep(Duration::from_millis(50)).await; // Simulate some work
    "Hello, World!"
}

async fn echo_handler(body: Bytes) -> impl IntoResponse {
    ([(CONTENT_TYPE, "application/json")], body)
}

async fn latin1_handler() -> impl IntoResponse {
    // "café" in ISO-8859-1
    (
        [(CONTENT_TYPE, "text/plain; charset=ISO-8859-1")],
        Bytes::from_static(b"caf\xe9"),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG=replay_log=info turns request/response logging (and capture) off
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("replay_log=debug,demo=info")),
        )
        .init();

    let upstream = Router::new()
        .route("/hello", get(hello_handler))
        .route("/echo", post(echo_handler))
        .route("/latin1", get(latin1_handler))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    info!("Upstream server listening on http://{addr}");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, upstream).await {
            error!(error = %e, "Upstream server failed");
        }
    });

    let transport = Client::builder(TokioExecutor::new()).build_http::<Full<Bytes>>();
    let client = ServiceBuilder::new()
        .layer(LoggingLayer::default())
        .map_request(|request: Request<Bytes>| request.map(Full::new))
        .map_response(|response: Response<Incoming>| response.map(Body::new))
        .service(transport);

    let requests = vec![
        Request::get(format!("http://{addr}/hello")).body(Bytes::new())?,
        Request::post(format!("http://{addr}/echo"))
            .header(CONTENT_TYPE, "application/json")
            .body(Bytes::from(r#"{"greeting":"hello"}"#))?,
        Request::get(format!("http://{addr}/latin1")).body(Bytes::new())?,
    ];

    for request in requests {
        let uri = request.uri().clone();
        let mut response = client.clone().oneshot(request).await?;

        // A replayed body can be read again; a passthrough body is empty the second time.
        let first = response.take_body()?.collect().await?.to_bytes();
        let second = response.take_body()?.collect().await?.to_bytes();
        let status = response.status()?;

        info!(
            %uri,
            %status,
            replayable = response.is_replayable(),
            first_read = ?first,
            second_read = ?second,
            "Caller received response"
        );
        response.close();
    }

    Ok(())
}
