//!
//! HTTP transport for the engine, built on axum.
//!
//! Every request is collected into a [`Request`] view, dispatched on Tokio's
//! blocking pool (filters and handlers are ordinary synchronous calls that
//! may block), and the resulting [`Response`] view is written back.
//!
//! ```rust,no_run
//! use dispatch_engine::{Config, Engine, Server, handler_fn};
//!
//! # async fn example() -> dispatch_engine::Result<()> {
//! let config = Config::from_env_or_default();
//! config.setup_tracing();
//!
//! let engine = Engine::builder(config)
//!     .route("/", handler_fn(|_req, res| res.write_str("hello")))
//!     .build()?;
//! Server::new(engine).start().await
//! # }
//! ```

mod shutdown;

use {
    crate::{Engine, Error, Request, Response, Result, utils::RequestIdGenerator},
    axum::{
        Router,
        body::Body,
        extract::ConnectInfo,
        response::{IntoResponse, Response as AxumResponse},
    },
    http::{HeaderName, StatusCode},
    shutdown::shutdown_signal,
    std::net::{IpAddr, SocketAddr},
    tokio_util::sync::CancellationToken,
    tower::ServiceBuilder,
    tower_http::{
        request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
        trace::TraceLayer,
    },
};

const X_REQUEST_ID: &str = "x-request-id";

/// Serves an [`Engine`] over HTTP.
#[derive(Debug, Clone)]
pub struct Server {
    engine: Engine,
    shutdown: CancellationToken,
}

impl Server {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Token cancelled when the server begins shutting down. Cancelling it
    /// also stops the server.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// The axum router that hands every request to the engine. Routing is the
    /// engine's job, so everything goes through the fallback.
    pub fn router(&self) -> Router {
        let x_request_id = HeaderName::from_static(X_REQUEST_ID);
        let engine = self.engine.clone();

        Router::new()
            .fallback(move |request: axum::extract::Request| {
                let engine = engine.clone();
                async move { serve_one(engine, request).await }
            })
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(
                        x_request_id.clone(),
                        RequestIdGenerator,
                    ))
                    .layer(
                        TraceLayer::new_for_http().make_span_with(
                            |request: &http::Request<Body>| {
                                let request_id = request
                                    .headers()
                                    .get(X_REQUEST_ID)
                                    .and_then(|v| v.to_str().ok())
                                    .unwrap_or("unknown");
                                tracing::info_span!(
                                    "http_request",
                                    method = %request.method(),
                                    uri = %request.uri(),
                                    request_id = %request_id,
                                )
                            },
                        ),
                    )
                    .layer(PropagateRequestIdLayer::new(x_request_id)),
            )
    }

    /// Binds the configured address and serves until Ctrl+C, SIGTERM or the
    /// cancellation token. In-flight requests get `shutdown_timeout` to
    /// finish; the session reaper runs for as long as the server does.
    pub async fn start(self) -> Result<()> {
        let http = &self.engine.config().http;
        let bind_addr = http.full_bind_addr();
        let shutdown_timeout = http.shutdown_timeout;
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        tracing::info!("Bound to {}", &bind_addr);
        tracing::info!("Waiting for connections");

        let _reaper = self.engine.spawn_reaper(self.shutdown.clone());
        let service = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        let token = self.shutdown.clone();
        let serve_future = axum::serve(listener, service)
            .with_graceful_shutdown(shutdown_signal(shutdown_timeout, token.clone()));

        // The timeout starts once shutdown begins, not at startup.
        tokio::select! {
            result = serve_future => {
                tracing::info!("Graceful shutdown completed");
                result?;
            }
            _ = async {
                token.cancelled().await;
                tokio::time::sleep(shutdown_timeout).await;
            } => {
                tracing::warn!("Graceful shutdown timeout expired, forcing shutdown");
            }
        }

        self.shutdown.cancel();
        Ok(())
    }
}

async fn serve_one(engine: Engine, request: axum::extract::Request) -> AxumResponse {
    let limit = engine.config().http.max_payload_size();
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let http = &engine.config().http;
    let local_addr = http
        .bind_addr
        .parse::<IpAddr>()
        .ok()
        .map(|ip| SocketAddr::new(ip, http.bind_port));

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(limit, error = %err, "Request body rejected");
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Error::invalid_input(format!("request body exceeds {limit} bytes")),
            )
                .into_response();
        }
    };

    let mut view = Request::from_parts(parts, body);
    if let Some(addr) = remote_addr {
        view = view.with_remote_addr(addr);
    }
    if let Some(addr) = local_addr {
        view = view.with_local_addr(addr);
    }

    let dispatched = tokio::task::spawn_blocking(move || {
        let mut response = Response::new();
        engine.dispatch(&mut view, &mut response);
        response
    })
    .await;

    match dispatched {
        Ok(response) => into_axum(response),
        Err(err) => {
            tracing::error!(error = %err, "Dispatch worker failed");
            Error::internal(format!("dispatch worker failed: {err}")).into_response()
        }
    }
}

fn into_axum(response: Response) -> AxumResponse {
    let (status, headers, body) = response.into_parts();
    let mut out = AxumResponse::new(Body::from(body));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    out
}
