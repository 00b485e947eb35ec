//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Bind one listener per configured port
//! - Wire up middleware (tracing, timeout, request ID)
//! - Enforce the body size limit while buffering the request
//! - Convert axum requests to `HttpRequest` and dispatch to the route table
//! - Drain in-flight requests on shutdown

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router as AxumRouter,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::BidderConfig;
use crate::http::{HttpRequest, UuidRequestId, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::receiver::ReceiverContext;
use crate::routing::Router;

/// Per-listener handler state.
#[derive(Clone)]
struct ListenerState {
    router: Arc<Router>,
    /// Port the route table knows this listener by.
    port: u16,
    max_body_bytes: usize,
}

struct BoundListener {
    name: String,
    port: u16,
    listener: TcpListener,
}

/// HTTP server for the bidder: one axum service per listening port.
pub struct HttpServer {
    router: Arc<Router>,
    listeners: Vec<BoundListener>,
    request_timeout: Duration,
    max_body_bytes: usize,
}

impl HttpServer {
    /// Bind every configured listener.
    pub async fn bind(router: Arc<Router>, config: &BidderConfig) -> std::io::Result<Self> {
        let mut listeners = Vec::with_capacity(config.listeners.len());
        for listener_config in &config.listeners {
            let addr: SocketAddr = listener_config.bind_address.parse().map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
            })?;
            let listener = TcpListener::bind(addr).await?;
            tracing::info!(
                listener = %listener_config.name,
                address = %listener.local_addr()?,
                features = ?listener_config.features,
                "Listener bound"
            );
            listeners.push(BoundListener {
                name: listener_config.name.clone(),
                port: addr.port(),
                listener,
            });
        }

        Ok(Self {
            router,
            listeners,
            request_timeout: config.timeouts.request(),
            max_body_bytes: config.limits.max_body_bytes,
        })
    }

    /// Addresses actually bound, in configuration order.
    pub fn local_addrs(&self) -> std::io::Result<Vec<SocketAddr>> {
        self.listeners.iter().map(|l| l.listener.local_addr()).collect()
    }

    /// Build the axum app for one listener with all middleware layers.
    #[allow(deprecated)]
    fn build_app(&self, port: u16) -> AxumRouter {
        let state = ListenerState {
            router: Arc::clone(&self.router),
            port,
            max_body_bytes: self.max_body_bytes,
        };

        AxumRouter::new().fallback(dispatch).with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(X_REQUEST_ID)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(self.request_timeout)),
        )
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, shutdown: Shutdown) -> std::io::Result<()> {
        let mut tasks = JoinSet::new();
        let apps: Vec<AxumRouter> = self.listeners.iter().map(|l| self.build_app(l.port)).collect();

        for (app, bound) in apps.into_iter().zip(self.listeners) {
            let signal = shutdown.signalled();
            tasks.spawn(async move {
                tracing::info!(listener = %bound.name, port = bound.port, "HTTP server starting");
                let result = axum::serve(
                    bound.listener,
                    app.into_make_service_with_connect_info::<SocketAddr>(),
                )
                .with_graceful_shutdown(signal)
                .await;
                tracing::info!(listener = %bound.name, "HTTP server stopped");
                result
            });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined.unwrap_or_else(|e| Err(std::io::Error::other(e)));
            if let Err(e) = result {
                tracing::error!(error = %e, "Listener failed");
                // one listener down takes the others with it
                shutdown.trigger();
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Fallback handler for every path: the route table decides.
async fn dispatch(
    State(state): State<ListenerState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let ListenerState {
        router,
        port,
        max_body_bytes,
    } = state;

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request body");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let request = HttpRequest::new(parts.method, parts.uri)
        .with_headers(parts.headers)
        .with_body(body)
        .with_remote_addr(remote);

    // Interceptors run synchronously; keep them off the async workers.
    let handled = tokio::task::spawn_blocking(move || {
        let mut ctx = ReceiverContext::new(request);
        router.receive(port, &mut ctx);
        ctx.into_response()
    })
    .await;

    match handled {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Request handler did not complete");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
