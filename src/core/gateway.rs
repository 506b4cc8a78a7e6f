use std::net::{IpAddr, SocketAddr, TcpListener};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use hyper::body::HttpBody;
use hyper::StatusCode;

use crate::config::ServerConfig;
use crate::core::pipeline::GatewayPipeline;
use crate::core::request::GatewayRequest;
use crate::core::response::GatewayResponse;
use crate::error::GatewayError;

/// Core API Gateway trait that defines the main functionality
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Process an incoming request and return a response
    async fn process_request(
        &self,
        request: GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError>;

    /// Start the gateway server
    async fn start(&self) -> Result<(), GatewayError>;

    /// Stop the gateway server
    async fn stop(&self) -> Result<(), GatewayError>;

    /// Check if the gateway is healthy
    async fn health_check(&self) -> bool;
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Client address: first `x-forwarded-for` hop, else the peer address
fn client_ip(request: &Request<Body>, peer: SocketAddr) -> IpAddr {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or_else(|| peer.ip())
}

/// Buffer a request body, giving up as soon as it exceeds `limit` bytes
async fn read_body(mut body: Body, limit: usize) -> Result<Bytes, GatewayError> {
    let mut buffer = BytesMut::new();

    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|e| {
            GatewayError::InvalidRequest(format!("Failed to read request body: {}", e))
        })?;
        if buffer.len() + chunk.len() > limit {
            return Err(GatewayError::PayloadTooLarge(limit));
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(buffer.freeze())
}

async fn into_gateway_request(
    request: Request<Body>,
    peer: SocketAddr,
    body_limit: usize,
) -> Result<GatewayRequest, GatewayError> {
    let declared_length = request
        .headers()
        .get(hyper::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_length.map_or(false, |len| len > body_limit) {
        return Err(GatewayError::PayloadTooLarge(body_limit));
    }

    let client_ip = client_ip(&request, peer);
    let (parts, body) = request.into_parts();
    let body = read_body(body, body_limit).await?;

    Ok(GatewayRequest::new(
        parts.method,
        parts.uri,
        parts.headers,
        body,
        Some(client_ip),
    ))
}

/// Server state that can be mutated
#[derive(Default)]
struct ServerState {
    /// Server handle for graceful shutdown
    server_handle: Option<tokio::task::JoinHandle<()>>,
    /// Shutdown signal sender
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    /// Address the listener is bound to
    local_addr: Option<SocketAddr>,
}

/// Path answered by the gateway itself; it takes precedence over any route
pub const HEALTH_PATH: &str = "/health";

/// HTTP front of the gateway.
///
/// Serves [`HEALTH_PATH`] itself and hands every other request to the
/// pipeline. Request bodies larger than `max_body_size` get a 413.
#[derive(Clone)]
pub struct ApiGateway {
    pipeline: Arc<GatewayPipeline>,
    config: ServerConfig,
    server_state: Arc<tokio::sync::Mutex<ServerState>>,
}

impl ApiGateway {
    /// Create a new API Gateway around a pipeline
    pub fn new(pipeline: Arc<GatewayPipeline>, config: ServerConfig) -> Self {
        Self {
            pipeline,
            config,
            server_state: Arc::new(tokio::sync::Mutex::new(ServerState::default())),
        }
    }

    /// Address the server is listening on, once started
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.server_state.lock().await.local_addr
    }

    fn app(&self) -> axum::Router {
        let pipeline = self.pipeline.clone();
        let body_limit = self.config.max_body_size;

        axum::Router::new()
            .route(HEALTH_PATH, axum::routing::get(|| async { "OK" }))
            .fallback(
                move |ConnectInfo(peer): ConnectInfo<SocketAddr>, request: Request<Body>| {
                    let pipeline = pipeline.clone();
                    async move {
                        let request = match into_gateway_request(request, peer, body_limit).await {
                            Ok(request) => request,
                            Err(e) => {
                                tracing::warn!(error = %e, "Rejecting unreadable request");
                                return e.into_response();
                            }
                        };

                        match pipeline.process(request).await {
                            Ok(response) => response.into_response(),
                            Err(e) => {
                                tracing::error!(error = %e, status = e.status_code(), "Request failed");
                                e.into_response()
                            }
                        }
                    }
                },
            )
            .layer(tower_http::trace::TraceLayer::new_for_http())
    }
}

#[async_trait]
impl Gateway for ApiGateway {
    async fn process_request(
        &self,
        request: GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        self.pipeline.process(request).await
    }

    async fn start(&self) -> Result<(), GatewayError> {
        let mut server_state = self.server_state.lock().await;
        if server_state.server_handle.is_some() {
            return Err(GatewayError::InternalError(
                "Server is already running".to_string(),
            ));
        }

        if let Ok(route) = self.pipeline.routes().resolve(HEALTH_PATH) {
            tracing::warn!(
                route_id = %route.id(),
                path = HEALTH_PATH,
                "Route is shadowed by the built-in health endpoint"
            );
        }

        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let server = axum::Server::from_tcp(listener)
            .map_err(|e| GatewayError::InternalError(format!("Failed to start server: {}", e)))?
            .serve(self.app().into_make_service_with_connect_info::<SocketAddr>());

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let server_handle = tokio::spawn(async move {
            let graceful = server.with_graceful_shutdown(async {
                shutdown_rx.await.ok();
                tracing::info!("Shutdown signal received, starting graceful shutdown");
            });

            if let Err(e) = graceful.await {
                tracing::error!("Server error: {}", e);
            }

            tracing::info!(%addr, "Server has been shut down");
        });

        server_state.server_handle = Some(server_handle);
        server_state.shutdown_tx = Some(shutdown_tx);
        server_state.local_addr = Some(addr);

        tracing::info!(%addr, routes = self.pipeline.routes().len(), "API Gateway listening");
        Ok(())
    }

    async fn stop(&self) -> Result<(), GatewayError> {
        let mut server_state = self.server_state.lock().await;

        let handle = server_state.server_handle.take().ok_or_else(|| {
            GatewayError::InternalError("Server is not running".to_string())
        })?;

        if let Some(tx) = server_state.shutdown_tx.take() {
            // The receiver is gone if the server already exited
            let _ = tx.send(());
        }
        server_state.local_addr = None;

        handle.await.map_err(|e| {
            GatewayError::InternalError(format!("Error while shutting down server: {}", e))
        })?;

        tracing::info!("Server has been shut down gracefully");
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.server_state.lock().await.server_handle.is_some()
    }
}
